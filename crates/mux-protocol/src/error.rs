//! JSON-RPC 2.0 error codes and the error object every handler returns.

use serde::{Deserialize, Serialize};

/// Standard JSON-RPC 2.0 error codes plus the LSP lifecycle codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxErrorCode {
    // JSON-RPC 2.0 standard errors
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,

    // Server errors
    ServerError,
    ServerNotInitialized,
    RequestCancelled,

    // Custom code
    Custom(i32),
}

impl MuxErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::ServerNotInitialized => -32002,
            Self::RequestCancelled => -32800,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            -32002 => Self::ServerNotInitialized,
            -32800 => Self::RequestCancelled,
            c => Self::Custom(c),
        }
    }
}

/// JSON-RPC 2.0 error object.
///
/// Feature handlers return this verbatim; the router never rewraps an
/// adapter's error, so the client sees exactly what the feature produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl MuxError {
    pub fn new(code: MuxErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(MuxErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(MuxErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(MuxErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    /// No registered feature declares the command.
    pub fn command_not_owned(command: &str) -> Self {
        Self::new(
            MuxErrorCode::MethodNotFound,
            format!("No feature server handles command: {command}"),
        )
        .with_data(serde_json::json!({ "command": command }))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(MuxErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(MuxErrorCode::InternalError, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(MuxErrorCode::ServerError, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(MuxErrorCode::ServerNotInitialized, "Server is not initialized")
    }

    pub fn already_initialized() -> Self {
        Self::invalid_request("Server has already been initialized")
    }

    pub fn cancelled() -> Self {
        Self::new(MuxErrorCode::RequestCancelled, "Request cancelled")
    }

    pub fn error_code(&self) -> MuxErrorCode {
        MuxErrorCode::from_code(self.code)
    }
}

impl std::fmt::Display for MuxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC Error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for MuxError {}
