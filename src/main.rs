//! lsp-mux — language-server multiplexer over stdio
//!
//! Presents a set of in-process feature servers to an editor as a single
//! language server. JSON-RPC 2.0 messages are exchanged one per line on
//! stdin/stdout; logs go to stderr or a file.
//!
//! Usage:
//!   lsp-mux                                        # Serve immediately
//!   lsp-mux --set-credentials-encryption-key       # Read a key record from stdin first
//!   lsp-mux --verbose --log-file                   # Debug logs to ~/.lsp-mux/logs/lsp-mux.log

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lsp_mux::{MuxOptions, RunError, run};
use mux_protocol::encryption::DEFAULT_HANDSHAKE_TIMEOUT_MS;
use mux_router::RouterConfig;
use mux_transport::bootstrap::BootstrapConfig;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lsp-mux", about = "lsp-mux: one language server in front of many features")]
struct Cli {
    /// Read an encryption initialization record from stdin before serving
    #[arg(long)]
    set_credentials_encryption_key: bool,

    /// How long to wait for the encryption record, in milliseconds
    #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_MS)]
    handshake_timeout_ms: u64,

    /// Server name reported to the client
    #[arg(long, default_value = "lsp-mux")]
    name: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.lsp-mux/logs/lsp-mux.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".lsp-mux/logs/lsp-mux.log")
}

/// Install the tracing subscriber. Never writes to stdout.
fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if let Some(ref log_file_arg) = cli.log_file {
        let log_path = if log_file_arg == "DEFAULT" {
            default_log_path()
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let options = MuxOptions {
        router: RouterConfig {
            name: cli.name.clone(),
            ..RouterConfig::default()
        },
        bootstrap: cli.set_credentials_encryption_key.then(|| BootstrapConfig {
            timeout_ms: cli.handshake_timeout_ms,
            ..BootstrapConfig::default()
        }),
    };

    info!("lsp-mux {} starting on stdio", env!("CARGO_PKG_VERSION"));

    let stdin = BufReader::new(tokio::io::stdin());
    match run(stdin, tokio::io::stdout(), &options).await {
        Ok(()) => {}
        Err(RunError::Handshake(e)) => {
            error!("Credential bootstrap failed: {e}");
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("stdio transport failed"),
    }

    info!("lsp-mux exiting");
    Ok(())
}
