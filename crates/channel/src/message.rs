use crate::value::EncodableValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named method invocation with its encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: EncodableValue,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: EncodableValue) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    InvalidImage,
    /// The handler itself failed before producing a response.
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::InvalidImage => "INVALID_IMAGE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct MethodError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: Option<EncodableValue>,
}

impl MethodError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<EncodableValue>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Exactly one of these completes every method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { result: EncodableValue },
    Error(MethodError),
    NotImplemented,
}

impl MethodResponse {
    pub fn success(result: EncodableValue) -> Self {
        MethodResponse::Success { result }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        MethodResponse::Error(MethodError::new(code, message))
    }

    pub fn result(&self) -> Option<&EncodableValue> {
        match self {
            MethodResponse::Success { result } => Some(result),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            MethodResponse::Success { .. } => "success",
            MethodResponse::Error(_) => "error",
            MethodResponse::NotImplemented => "not_implemented",
        }
    }
}

impl From<MethodError> for MethodResponse {
    fn from(err: MethodError) -> Self {
        MethodResponse::Error(err)
    }
}
