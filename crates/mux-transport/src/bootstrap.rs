//! Credential bootstrap — reads the encryption initialization record from
//! the raw input stream before the protocol transport takes it over.
//!
//! The read races the input against a timer. Whichever completes first
//! decides the outcome; the loser is dropped, so a late line is never
//! consumed and an early line disarms the timer. Only bytes up to and
//! including the first `\n` are taken from the reader; anything the host
//! wrote after it stays buffered for [`crate::serve`].

use std::time::Duration;

use mux_protocol::encryption::{DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_MAX_RECORD_BYTES};
use mux_protocol::{EncryptionInitialization, HandshakeError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{debug, info};

/// Bootstrap configuration.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Window for the host to deliver the record, in ms (default: 5000)
    pub timeout_ms: u64,
    /// Longest record accepted before the newline (default: 64 KiB)
    pub max_record_bytes: usize,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// Read and validate the next encryption initialization record from
/// `reader` within `config.timeout_ms`.
pub async fn read_encryption_initialization<R>(
    reader: &mut R,
    config: &BootstrapConfig,
) -> Result<EncryptionInitialization, HandshakeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let limit = config.max_record_bytes;

    let read_line = async {
        // One byte of headroom for the delimiter itself.
        let mut bounded = (&mut *reader).take((limit as u64).saturating_add(1));
        bounded.read_until(b'\n', &mut line).await?;
        if line.last() != Some(&b'\n') {
            if line.len() > limit {
                return Err(HandshakeError::TooLarge { limit });
            }
            // End of input without a delimiter: nothing more can arrive,
            // so the timer decides.
            debug!("Input closed before encryption details were delimited");
            std::future::pending::<()>().await;
        }
        Ok::<(), HandshakeError>(())
    };

    let outcome = tokio::time::timeout(Duration::from_millis(config.timeout_ms), read_line).await;
    match outcome {
        Ok(read) => read?,
        Err(_) => {
            return Err(HandshakeError::Timeout {
                timeout_ms: config.timeout_ms,
            });
        }
    }

    let payload = strip_delimiter(&line);
    let init = EncryptionInitialization::from_payload(payload)?;
    info!(
        "Encryption details received (version {}, mode {})",
        init.version,
        init.mode.as_str()
    );
    Ok(init)
}

fn strip_delimiter(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
