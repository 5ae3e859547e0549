//! lsp-mux Feature Servers
//!
//! Each feature implements the `FeatureServer` trait and owns a set of
//! commands. Features are wrapped in a `FeatureServerAdapter` and
//! registered with the router, which merges their capabilities and
//! dispatches commands to them.

pub mod credentials;
pub mod echo;

use std::future::Future;
use std::sync::Arc;

use mux_protocol::{ExecuteCommandParams, HandlerResult, InitializeParams, InitializeResult, MuxError};
use mux_router::FeatureServerAdapter;
use mux_transport::CancellationToken;
use serde_json::Value;

pub use credentials::CredentialsFeature;
pub use echo::EchoFeature;

/// Trait implemented by all feature servers.
pub trait FeatureServer: Send + Sync + 'static {
    /// Name used in logs and adapter debugging output.
    fn name(&self) -> &str;

    /// Declare this feature's capabilities.
    fn initialize(
        &self,
        params: InitializeParams,
        token: CancellationToken,
    ) -> impl Future<Output = Result<InitializeResult, MuxError>> + Send;

    /// Run one of the commands this feature declared.
    fn execute_command(
        &self,
        params: ExecuteCommandParams,
        token: CancellationToken,
    ) -> impl Future<Output = HandlerResult> + Send;

    /// Notification methods this feature wants delivered to `on_notification`.
    fn notifications(&self) -> &'static [&'static str] {
        &[]
    }

    fn on_notification(
        &self,
        _method: &str,
        _params: Option<Value>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Wire this feature's handlers into a router adapter.
    fn into_adapter(self: Arc<Self>) -> FeatureServerAdapter
    where
        Self: Sized,
    {
        let mut adapter = FeatureServerAdapter::new(self.name());

        let feature = Arc::clone(&self);
        adapter.add_initialize_handler(move |params, token| {
            let feature = Arc::clone(&feature);
            async move { feature.initialize(params, token).await }
        });

        let feature = Arc::clone(&self);
        adapter.add_execute_command_handler(move |params, token| {
            let feature = Arc::clone(&feature);
            async move { feature.execute_command(params, token).await }
        });

        for &method in self.notifications() {
            let feature = Arc::clone(&self);
            adapter.add_notification_handler(method, move |params| {
                let feature = Arc::clone(&feature);
                async move { feature.on_notification(method, params).await }
            });
        }

        adapter
    }
}
