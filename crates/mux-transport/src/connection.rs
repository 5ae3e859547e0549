//! Connection handler table.
//!
//! A [`Connection`] is what the transport serves: it decodes the typed
//! params for the methods the multiplexer understands and forwards them to
//! whichever handlers were bound with `on_initialize`, `on_execute_command`
//! and `on_notification`. Binding happens once at startup, before serving.

use std::future::Future;

use mux_protocol::{
    ExecuteCommandParams, HandlerResult, InitializeParams, InitializeResult, Methods, MuxError,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::BoxFuture;
use crate::cancel::CancellationToken;
use crate::server::RequestHandler;

type InitializeHandler = Box<
    dyn Fn(InitializeParams, CancellationToken) -> BoxFuture<Result<InitializeResult, MuxError>>
        + Send
        + Sync,
>;
type ExecuteCommandHandler =
    Box<dyn Fn(ExecuteCommandParams, CancellationToken) -> BoxFuture<HandlerResult> + Send + Sync>;
type NotificationHandler = Box<dyn Fn(String, Option<Value>) -> BoxFuture<()> + Send + Sync>;

/// Handler table for one client connection.
#[derive(Default)]
pub struct Connection {
    initialize: Option<InitializeHandler>,
    execute_command: Option<ExecuteCommandHandler>,
    notification: Option<NotificationHandler>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the `initialize` request. Replaces any earlier binding.
    pub fn on_initialize<F, Fut>(&mut self, handler: F)
    where
        F: Fn(InitializeParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InitializeResult, MuxError>> + Send + 'static,
    {
        self.initialize = Some(Box::new(move |params, token| Box::pin(handler(params, token))));
    }

    /// Bind the `workspace/executeCommand` request. Replaces any earlier binding.
    pub fn on_execute_command<F, Fut>(&mut self, handler: F)
    where
        F: Fn(ExecuteCommandParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.execute_command = Some(Box::new(move |params, token| Box::pin(handler(params, token))));
    }

    /// Bind a catch-all for client notifications other than `exit` and
    /// `$/cancelRequest`, which the transport consumes itself.
    pub fn on_notification<F, Fut>(&mut self, handler: F)
    where
        F: Fn(String, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notification = Some(Box::new(move |method, params| Box::pin(handler(method, params))));
    }
}

impl RequestHandler for Connection {
    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        token: CancellationToken,
    ) -> HandlerResult {
        match method {
            Methods::INITIALIZE => {
                let Some(handler) = &self.initialize else {
                    return Err(MuxError::method_not_found(method));
                };
                let params: InitializeParams = parse_params(method, params)?;
                let result = handler(params, token).await?;
                serde_json::to_value(result)
                    .map_err(|e| MuxError::internal(format!("Failed to encode initialize result: {e}")))
            }
            Methods::EXECUTE_COMMAND => {
                let Some(handler) = &self.execute_command else {
                    return Err(MuxError::method_not_found(method));
                };
                let params: ExecuteCommandParams = parse_params(method, params)?;
                handler(params, token).await
            }
            Methods::SHUTDOWN => Ok(Value::Null),
            _ => Err(MuxError::method_not_found(method)),
        }
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) {
        match &self.notification {
            Some(handler) => handler(method.to_string(), params).await,
            None => debug!("Dropping notification without handler: {method}"),
        }
    }
}

/// Decode request params; absent params decode from an empty object.
fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, MuxError> {
    let params = params.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(params)
        .map_err(|e| MuxError::invalid_params(format!("Invalid params for {method}: {e}")))
}
