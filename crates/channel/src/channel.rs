use crate::message::{ErrorCode, MethodCall, MethodResponse};
use crate::value::EncodableValue;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

/// Default number of calls that can wait for the dispatcher.
pub const DEFAULT_BUFFER: usize = 64;

/// Serves the methods of one channel.
pub trait MethodCallHandler: Send + Sync + 'static {
    fn handle(&self, call: MethodCall) -> impl Future<Output = MethodResponse> + Send;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel `{0}` is closed")]
    Closed(String),

    #[error("Channel `{0}` dropped the call before responding")]
    Dropped(String),
}

struct Envelope {
    call: MethodCall,
    reply: oneshot::Sender<MethodResponse>,
}

/// Named request/response channel between the application shell and a
/// [`MethodCallHandler`].
pub struct MethodChannel;

impl MethodChannel {
    /// Starts the dispatcher on the current runtime and returns its client.
    ///
    /// Every call runs on its own task, so a slow call never holds up the
    /// ones behind it. The dispatcher stops once all clients are dropped.
    pub fn spawn<H: MethodCallHandler>(
        name: impl Into<String>,
        handler: H,
        buffer: usize,
    ) -> MethodChannelClient {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, rx) = mpsc::channel(buffer.max(1));

        tokio::spawn(dispatch(Arc::clone(&name), rx, Arc::new(handler)));
        tracing::info!(channel = %name, "Method channel ready");

        MethodChannelClient { name, tx }
    }
}

async fn dispatch<H: MethodCallHandler>(
    name: Arc<str>,
    mut rx: mpsc::Receiver<Envelope>,
    handler: Arc<H>,
) {
    while let Some(Envelope { call, reply }) = rx.recv().await {
        let handler = Arc::clone(&handler);
        let span = tracing::info_span!("method_call", channel = %name, method = %call.method);

        tokio::spawn(
            async move {
                let method = call.method.clone();
                let response = match tokio::spawn(async move { handler.handle(call).await }).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(error = %e, "Method handler did not complete");
                        MethodResponse::error(
                            ErrorCode::Internal,
                            format!("Handler for `{method}` failed"),
                        )
                    }
                };

                tracing::debug!(status = response.status(), "Method call completed");
                if reply.send(response).is_err() {
                    tracing::debug!("Caller went away before the response");
                }
            }
            .instrument(span),
        );
    }

    tracing::info!(channel = %name, "Method channel closed");
}

/// Cheap, cloneable handle for invoking methods on a channel.
#[derive(Clone)]
pub struct MethodChannelClient {
    name: Arc<str>,
    tx: mpsc::Sender<Envelope>,
}

impl MethodChannelClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends `call` and waits for its single response.
    pub async fn invoke(&self, call: MethodCall) -> Result<MethodResponse, ChannelError> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(Envelope { call, reply })
            .await
            .map_err(|_| ChannelError::Closed(self.name.to_string()))?;

        response
            .await
            .map_err(|_| ChannelError::Dropped(self.name.to_string()))
    }

    pub async fn invoke_method(
        &self,
        method: &str,
        arguments: EncodableValue,
    ) -> Result<MethodResponse, ChannelError> {
        self.invoke(MethodCall::new(method, arguments)).await
    }
}
