//! Credentials feature — reports on the bootstrap encryption key.
//!
//! The key itself never leaves this module; status only says whether one
//! was delivered, its mode and version, and how many bytes it decodes to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use mux_protocol::{
    EncryptionInitialization, ExecuteCommandParams, HandlerResult, InitializeParams,
    InitializeResult, Methods, MuxError,
};
use mux_transport::CancellationToken;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::FeatureServer;

pub const STATUS_COMMAND: &str = "mux.credentials.status";

struct Received {
    encryption: Arc<EncryptionInitialization>,
    at: DateTime<Utc>,
}

pub struct CredentialsFeature {
    received: Option<Received>,
    client_initialized: AtomicBool,
}

impl CredentialsFeature {
    /// `encryption` is the record from the bootstrap handshake, if one ran.
    pub fn new(encryption: Option<Arc<EncryptionInitialization>>) -> Self {
        Self {
            received: encryption.map(|encryption| Received {
                encryption,
                at: Utc::now(),
            }),
            client_initialized: AtomicBool::new(false),
        }
    }

    pub fn has_key(&self) -> bool {
        self.received.is_some()
    }

    fn status(&self) -> Value {
        let client_initialized = self.client_initialized.load(Ordering::Acquire);
        let Some(received) = &self.received else {
            return json!({
                "present": false,
                "clientInitialized": client_initialized,
            });
        };

        let encryption = &received.encryption;
        let key_length = match encryption.key_bytes() {
            Ok(bytes) => Some(bytes.len()),
            Err(e) => {
                warn!("Bootstrap key is not valid base64: {e}");
                None
            }
        };

        json!({
            "present": true,
            "version": encryption.version,
            "mode": encryption.mode.as_str(),
            "keyLength": key_length,
            "receivedAt": received.at.to_rfc3339(),
            "clientInitialized": client_initialized,
        })
    }
}

impl std::fmt::Debug for CredentialsFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsFeature")
            .field("has_key", &self.has_key())
            .finish()
    }
}

impl FeatureServer for CredentialsFeature {
    fn name(&self) -> &str {
        "credentials"
    }

    async fn initialize(
        &self,
        _params: InitializeParams,
        _token: CancellationToken,
    ) -> Result<InitializeResult, MuxError> {
        Ok(InitializeResult::with_commands([STATUS_COMMAND]))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
        _token: CancellationToken,
    ) -> HandlerResult {
        match params.command.as_str() {
            STATUS_COMMAND => Ok(self.status()),
            other => Err(MuxError::command_not_owned(other)),
        }
    }

    fn notifications(&self) -> &'static [&'static str] {
        &[Methods::INITIALIZED]
    }

    async fn on_notification(&self, method: &str, _params: Option<Value>) {
        if method == Methods::INITIALIZED {
            debug!("Client finished initialization");
            self.client_initialized.store(true, Ordering::Release);
        }
    }
}
