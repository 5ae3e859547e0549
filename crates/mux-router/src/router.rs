//! Feature Router — aggregates initialize and dispatches execute-command.

use std::sync::Arc;

use futures_util::future::join_all;
use mux_protocol::{
    CommandOutcome, ExecuteCommandParams, InitializeParams, InitializeResult, MuxError, ServerInfo,
};
use mux_transport::{CancellationToken, Connection, catch_panic};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapter::FeatureServerAdapter;
use crate::merge::{default_capabilities, merge_capabilities};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Name reported in `serverInfo`
    pub name: String,
    /// Version reported in `serverInfo`
    pub version: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "lsp-mux".into(),
            version: Some(env!("CARGO_PKG_VERSION").into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Returns the router to `Uninitialized` unless initialize completed,
/// including when the initialize future is dropped part way.
struct InitializingGuard<'a> {
    state: &'a Mutex<RouterState>,
    completed: bool,
}

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            *self.state.lock() = RouterState::Uninitialized;
        }
    }
}

/// Owns feature adapters in registration order.
///
/// Adapters are registered through `&mut self` before serving; once the
/// router is shared (usually via [`FeatureRouter::bind`]) the registry is
/// read-only.
pub struct FeatureRouter {
    config: RouterConfig,
    /// Registered adapters, in registration order
    adapters: Vec<FeatureServerAdapter>,
    /// Lifecycle state
    state: Mutex<RouterState>,
    /// Client parameters from the successful initialize
    client_params: RwLock<Option<Arc<InitializeParams>>>,
}

impl FeatureRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            adapters: Vec::new(),
            state: Mutex::new(RouterState::Uninitialized),
            client_params: RwLock::new(None),
        }
    }

    /// Register a feature adapter. Registration order decides merge
    /// precedence and dispatch order.
    pub fn register(&mut self, adapter: FeatureServerAdapter) {
        info!("Registering feature server: {}", adapter.name());
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[FeatureServerAdapter] {
        &self.adapters
    }

    pub fn is_ready(&self) -> bool {
        *self.state.lock() == RouterState::Ready
    }

    /// Client parameters recorded by the successful initialize.
    pub fn client_params(&self) -> Option<Arc<InitializeParams>> {
        self.client_params.read().clone()
    }

    /// Initialize every feature concurrently and merge their capabilities.
    ///
    /// If any feature fails, the first failure in registration order is
    /// returned as-is and nothing is merged. A feature that panics fails
    /// with an internal error. A failed or abandoned initialize leaves the
    /// router uninitialized.
    pub async fn initialize(
        &self,
        params: InitializeParams,
        token: CancellationToken,
    ) -> Result<InitializeResult, MuxError> {
        let mut guard = {
            let mut state = self.state.lock();
            if *state != RouterState::Uninitialized {
                warn!("Rejecting initialize in state {:?}", *state);
                return Err(MuxError::already_initialized());
            }
            *state = RouterState::Initializing;
            InitializingGuard {
                state: &self.state,
                completed: false,
            }
        };

        info!("Initializing {} feature servers", self.adapters.len());

        let results = join_all(self.adapters.iter().map(|adapter| {
            let initialize = adapter.initialize(params.clone(), token.clone());
            async move {
                catch_panic(initialize).await.unwrap_or_else(|panic| {
                    error!("Feature {} panicked during initialize: {panic}", adapter.name());
                    Err(MuxError::internal(format!(
                        "Feature {} panicked during initialize",
                        adapter.name()
                    )))
                })
            }
        }))
        .await;

        let mut declared = Vec::with_capacity(results.len());
        for (adapter, result) in self.adapters.iter().zip(results) {
            match result {
                Ok(Some(result)) => declared.push(result.capabilities),
                Ok(None) => {}
                Err(err) => {
                    warn!("Feature {} failed to initialize: {err}", adapter.name());
                    return Err(err);
                }
            }
        }

        let mut capabilities = default_capabilities();
        for incoming in &declared {
            merge_capabilities(&mut capabilities, incoming);
        }

        *self.client_params.write() = Some(Arc::new(params));
        *self.state.lock() = RouterState::Ready;
        guard.completed = true;
        info!("Router ready ({} feature servers)", self.adapters.len());

        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
            }),
        })
    }

    /// Dispatch a command to the first feature, in registration order,
    /// that declares it and can execute it. At most one feature runs.
    pub async fn execute_command(
        &self,
        params: ExecuteCommandParams,
        token: CancellationToken,
    ) -> Result<CommandOutcome, MuxError> {
        let state = *self.state.lock();
        if state != RouterState::Ready {
            error!(
                "executeCommand {} received before initialize completed ({state:?})",
                params.command
            );
            return Err(MuxError::not_initialized());
        }

        for adapter in &self.adapters {
            if !adapter.owns_command(&params.command) {
                continue;
            }
            debug!("Dispatching {} to {}", params.command, adapter.name());
            match adapter.try_execute_command(params.clone(), token.clone()).await? {
                CommandOutcome::Owned(value) => return Ok(CommandOutcome::Owned(value)),
                CommandOutcome::NotOwned => continue,
            }
        }

        debug!("No feature server owns {}", params.command);
        Ok(CommandOutcome::NotOwned)
    }

    /// Forward a client notification to every feature with a handler for
    /// it, in registration order.
    pub async fn notify(&self, method: &str, params: Option<Value>) {
        let mut delivered = 0;
        for adapter in &self.adapters {
            if adapter.notify(method, params.clone()).await {
                delivered += 1;
            }
        }
        debug!("Notification {method} delivered to {delivered} feature servers");
    }

    /// Bind the router's entry points on a transport connection.
    pub fn bind(self: &Arc<Self>, connection: &mut Connection) {
        let router = Arc::clone(self);
        connection.on_initialize(move |params, token| {
            let router = Arc::clone(&router);
            async move { router.initialize(params, token).await }
        });

        let router = Arc::clone(self);
        connection.on_execute_command(move |params, token| {
            let router = Arc::clone(&router);
            async move {
                let command = params.command.clone();
                match router.execute_command(params, token).await? {
                    CommandOutcome::Owned(value) => Ok(value),
                    CommandOutcome::NotOwned => Err(MuxError::command_not_owned(&command)),
                }
            }
        });

        let router = Arc::clone(self);
        connection.on_notification(move |method, params| {
            let router = Arc::clone(&router);
            async move { router.notify(&method, params).await }
        });
    }
}
