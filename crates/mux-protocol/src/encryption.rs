//! Credential bootstrap record.
//!
//! When launched with `--set-credentials-encryption-key`, the host writes a
//! single line of JSON to stdin before any protocol traffic:
//!
//! ```text
//! {"version":"1.0","mode":"JWT","key":"<base64 key>"}\n
//! ```
//!
//! The key is later used to decode credential update payloads. This module
//! only parses and validates the record; reading it from the stream lives
//! in `mux-transport::bootstrap`.

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;

/// The only record version this build accepts.
pub const SUPPORTED_VERSION: &str = "1.0";

/// Default window for the host to deliver the record.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Largest record accepted, not counting the trailing newline.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024;

/// How credential payloads are encoded with the bootstrap key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    Jwt,
}

impl EncryptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jwt => "JWT",
        }
    }

    pub fn from_wire(mode: &str) -> Option<Self> {
        match mode {
            "JWT" => Some(Self::Jwt),
            _ => None,
        }
    }
}

/// A validated encryption initialization record.
#[derive(Debug)]
pub struct EncryptionInitialization {
    pub version: String,
    pub mode: EncryptionMode,
    pub key: SecretString,
}

/// Why the bootstrap handshake failed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Encryption details followed by new line must be sent during first {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Encryption details are not valid JSON")]
    Parse(#[source] serde_json::Error),

    #[error("Unsupported initialization version: {0}")]
    UnsupportedVersion(String),

    #[error("Encryption key is missing")]
    MissingKey,

    #[error("Unsupported encoding mode: {0}")]
    UnsupportedMode(String),

    #[error("Encryption details exceed {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read encryption details: {0}")]
    Io(#[from] std::io::Error),
}

impl EncryptionInitialization {
    /// Parse and validate one line of handshake payload (without the
    /// trailing newline). Invalid UTF-8 is reported as a parse error.
    ///
    /// Checks run in order and stop at the first failure: version, key, mode.
    pub fn from_payload(payload: impl AsRef<[u8]>) -> Result<Self, HandshakeError> {
        let record: Value =
            serde_json::from_slice(payload.as_ref()).map_err(HandshakeError::Parse)?;

        let version = record.get("version");
        if version.and_then(Value::as_str) != Some(SUPPORTED_VERSION) {
            return Err(HandshakeError::UnsupportedVersion(render(version)));
        }

        let key = match record.get("key").and_then(Value::as_str) {
            Some(key) if !key.is_empty() => key,
            _ => return Err(HandshakeError::MissingKey),
        };

        let mode_value = record.get("mode");
        let mode = mode_value
            .and_then(Value::as_str)
            .and_then(EncryptionMode::from_wire)
            .ok_or_else(|| HandshakeError::UnsupportedMode(render(mode_value)))?;

        Ok(Self {
            version: SUPPORTED_VERSION.to_string(),
            mode,
            key: SecretString::from(key.to_string()),
        })
    }

    /// Decode the base64 key material.
    pub fn key_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.key.expose_secret())
    }
}

/// Render an offending field for an error message; absent fields read
/// as `undefined`.
fn render(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
