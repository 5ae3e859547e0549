//! lsp-mux — the multiplexer wired together
//!
//! `run` is what the binary does once its command line is parsed: read the
//! optional credential record, register the built-in features with a router
//! and serve JSON-RPC on the same stream.

use std::sync::Arc;

use mux_features::{CredentialsFeature, EchoFeature, FeatureServer};
use mux_protocol::{EncryptionInitialization, HandshakeError};
use mux_router::{FeatureRouter, RouterConfig};
use mux_transport::bootstrap::{BootstrapConfig, read_encryption_initialization};
use mux_transport::{Connection, serve};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::info;

/// How a multiplexer instance is set up.
#[derive(Debug, Clone, Default)]
pub struct MuxOptions {
    /// Reported in `serverInfo`
    pub router: RouterConfig,
    /// Read an encryption record before serving
    pub bootstrap: Option<BootstrapConfig>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("Transport failed: {0}")]
    Transport(#[from] std::io::Error),
}

/// Build the router with the built-in features.
pub fn build_router(
    config: RouterConfig,
    encryption: Option<Arc<EncryptionInitialization>>,
) -> FeatureRouter {
    let mut router = FeatureRouter::new(config);
    router.register(Arc::new(EchoFeature::new()).into_adapter());
    router.register(Arc::new(CredentialsFeature::new(encryption)).into_adapter());
    router
}

/// Run one multiplexer session over `input` and `output` until the client
/// exits or the input closes.
pub async fn run<R, W>(mut input: R, output: W, options: &MuxOptions) -> Result<(), RunError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let encryption = match &options.bootstrap {
        Some(config) => Some(Arc::new(read_encryption_initialization(&mut input, config).await?)),
        None => None,
    };

    let router = Arc::new(build_router(options.router.clone(), encryption));
    let mut connection = Connection::new();
    router.bind(&mut connection);

    info!(
        "{} serving {} feature servers",
        options.router.name,
        router.adapters().len()
    );

    serve(input, output, Arc::new(connection)).await?;
    Ok(())
}
