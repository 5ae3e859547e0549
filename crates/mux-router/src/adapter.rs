//! Feature server adapter — local proxy for one feature's handlers.
//!
//! A feature wires its handlers in once at construction time. After
//! `initialize` resolves, the adapter remembers the capabilities the
//! feature declared so the router can ask which commands it owns.

use std::collections::HashMap;
use std::future::Future;

use mux_protocol::lifecycle::declared_commands;
use mux_protocol::{
    Capabilities, CommandOutcome, ExecuteCommandParams, HandlerResult, InitializeParams,
    InitializeResult, MuxError,
};
use mux_transport::{BoxFuture, CancellationToken};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

type InitializeHandler = Box<
    dyn Fn(InitializeParams, CancellationToken) -> BoxFuture<Result<InitializeResult, MuxError>>
        + Send
        + Sync,
>;
type ExecuteCommandHandler =
    Box<dyn Fn(ExecuteCommandParams, CancellationToken) -> BoxFuture<HandlerResult> + Send + Sync>;
type NotificationHandler = Box<dyn Fn(Option<Value>) -> BoxFuture<()> + Send + Sync>;

/// Handlers and resolved capability state for one feature.
pub struct FeatureServerAdapter {
    name: String,
    initialize_handler: Option<InitializeHandler>,
    execute_command_handler: Option<ExecuteCommandHandler>,
    notification_handlers: HashMap<String, NotificationHandler>,
    /// Capabilities from the last successful initialize.
    capabilities: RwLock<Option<Capabilities>>,
}

impl FeatureServerAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialize_handler: None,
            execute_command_handler: None,
            notification_handlers: HashMap::new(),
            capabilities: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the initialize handler. A second call replaces the first.
    pub fn add_initialize_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(InitializeParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<InitializeResult, MuxError>> + Send + 'static,
    {
        self.initialize_handler = Some(Box::new(move |params, token| Box::pin(handler(params, token))));
    }

    /// Register the execute-command handler. A second call replaces the first.
    pub fn add_execute_command_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(ExecuteCommandParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.execute_command_handler =
            Some(Box::new(move |params, token| Box::pin(handler(params, token))));
    }

    /// Register a handler for one notification method. A second call for
    /// the same method replaces the first.
    pub fn add_notification_handler<F, Fut>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notification_handlers
            .insert(method.into(), Box::new(move |params| Box::pin(handler(params))));
    }

    /// Run the feature's initialize handler and remember what it declared.
    ///
    /// Returns `Ok(None)` when no handler is registered; that feature
    /// simply contributes no capabilities.
    pub async fn initialize(
        &self,
        params: InitializeParams,
        token: CancellationToken,
    ) -> Result<Option<InitializeResult>, MuxError> {
        let Some(handler) = &self.initialize_handler else {
            debug!("Feature {} has no initialize handler", self.name);
            return Ok(None);
        };

        let result = handler(params, token).await?;
        *self.capabilities.write() = Some(result.capabilities.clone());
        Ok(Some(result))
    }

    /// Whether the last resolved capabilities list `command`.
    /// Always false before initialize has resolved.
    pub fn owns_command(&self, command: &str) -> bool {
        self.capabilities
            .read()
            .as_ref()
            .is_some_and(|caps| declared_commands(caps).any(|c| c == command))
    }

    /// Run the command if this feature owns it and can execute commands.
    pub async fn try_execute_command(
        &self,
        params: ExecuteCommandParams,
        token: CancellationToken,
    ) -> Result<CommandOutcome, MuxError> {
        if !self.owns_command(&params.command) {
            return Ok(CommandOutcome::NotOwned);
        }
        let Some(handler) = &self.execute_command_handler else {
            debug!(
                "Feature {} declares {} but has no execute-command handler",
                self.name, params.command
            );
            return Ok(CommandOutcome::NotOwned);
        };

        handler(params, token).await.map(CommandOutcome::Owned)
    }

    /// Deliver a notification. Returns whether a handler ran.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> bool {
        match self.notification_handlers.get(method) {
            Some(handler) => {
                handler(params).await;
                true
            }
            None => false,
        }
    }

    /// Capabilities from the last successful initialize, if any.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities.read().clone()
    }
}

impl std::fmt::Debug for FeatureServerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureServerAdapter")
            .field("name", &self.name)
            .field("initialize_handler", &self.initialize_handler.is_some())
            .field("execute_command_handler", &self.execute_command_handler.is_some())
            .field("notifications", &self.notification_handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
