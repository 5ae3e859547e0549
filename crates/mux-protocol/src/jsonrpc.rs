//! JSON-RPC 2.0 base types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MuxError;

/// JSON-RPC 2.0 request ID, either a string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

/// JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    pub error: MuxError,
}

/// JSON-RPC 2.0 response (success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

/// JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Result from a request handler.
pub type HandlerResult = Result<Value, MuxError>;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

impl JsonRpcRequest {
    /// Validate that this is a well-formed JSON-RPC 2.0 request.
    pub fn is_valid(&self) -> bool {
        self.jsonrpc == "2.0" && !self.method.is_empty()
    }
}

impl SuccessResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result,
        }
    }
}

impl ErrorResponse {
    pub fn new(id: Option<RequestId>, error: MuxError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            error,
        }
    }
}

impl JsonRpcNotification {
    pub fn is_valid(&self) -> bool {
        self.jsonrpc == "2.0" && !self.method.is_empty()
    }
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Success(SuccessResponse::new(id, result))
    }

    pub fn error(id: Option<RequestId>, error: MuxError) -> Self {
        Self::Error(ErrorResponse::new(id, error))
    }

    /// Build a response from a handler result.
    pub fn from_result(id: RequestId, result: HandlerResult) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(err) => Self::error(Some(id), err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Incoming messages
// ─────────────────────────────────────────────────────────────────────────────

/// One decoded line from the client.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A response to a server-initiated request; carries its id, if any.
    Response(Option<RequestId>),
}

impl IncomingMessage {
    /// Classify a decoded JSON value.
    ///
    /// A message with a usable `id` is a request, one without is a
    /// notification. On failure the error carries the id, when one could be
    /// read, so the invalid-request answer can be correlated.
    pub fn from_value(value: Value) -> Result<Self, Option<RequestId>> {
        let id: Option<RequestId> = value
            .get("id")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        if value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some())
        {
            return Ok(Self::Response(id));
        }

        let message = if id.is_some() {
            serde_json::from_value::<JsonRpcRequest>(value)
                .ok()
                .filter(JsonRpcRequest::is_valid)
                .map(Self::Request)
        } else {
            serde_json::from_value::<JsonRpcNotification>(value)
                .ok()
                .filter(JsonRpcNotification::is_valid)
                .map(Self::Notification)
        };
        message.ok_or(id)
    }
}
