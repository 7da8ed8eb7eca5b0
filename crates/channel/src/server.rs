use crate::channel::MethodChannelClient;
use crate::message::MethodCall;
use crate::value::EncodableValue;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone, Default)]
pub struct AppState {
    channels: Arc<HashMap<String, MethodChannelClient>>,
}

impl AppState {
    pub fn new(clients: impl IntoIterator<Item = MethodChannelClient>) -> Self {
        let channels = clients
            .into_iter()
            .map(|client| (client.name().to_string(), client))
            .collect();
        Self {
            channels: Arc::new(channels),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub channel: String,
    pub method: String,
    #[serde(default)]
    pub arguments: EncodableValue,
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/invoke", post(invoke))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind_addr: &str, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("HTTP edge listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP edge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

async fn health() -> &'static str {
    "ok"
}

async fn invoke(State(state): State<AppState>, Json(request): Json<InvokeRequest>) -> Response {
    let Some(client) = state.channels.get(&request.channel) else {
        tracing::warn!(channel = %request.channel, "Call for unknown channel");
        return (
            StatusCode::NOT_FOUND,
            format!("Unknown channel `{}`", request.channel),
        )
            .into_response();
    };

    match client
        .invoke(MethodCall::new(request.method, request.arguments))
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Method channel unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
