//! lsp-mux protocol types
//!
//! JSON-RPC 2.0 base types plus the small slice of the language-server
//! protocol the multiplexer itself understands: initialize, execute-command,
//! and the credential bootstrap record read before serving begins.

pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod lifecycle;
pub mod encryption;

pub use error::{MuxError, MuxErrorCode};
pub use jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, SuccessResponse, ErrorResponse,
    JsonRpcNotification, IncomingMessage, RequestId, HandlerResult,
};
pub use methods::{Methods, is_implementation_dependent};
pub use lifecycle::{
    Capabilities, ClientInfo, CommandOutcome, ExecuteCommandParams,
    InitializeParams, InitializeResult, ServerInfo, WorkspaceFolder,
};
pub use encryption::{EncryptionInitialization, EncryptionMode, HandshakeError};
