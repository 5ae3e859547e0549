//! Echo feature. Returns the arguments it was given.

use mux_protocol::{
    ExecuteCommandParams, HandlerResult, InitializeParams, InitializeResult, MuxError,
};
use mux_transport::CancellationToken;
use serde_json::Value;
use tracing::debug;

use crate::FeatureServer;

pub const ECHO_COMMAND: &str = "mux.echo";

#[derive(Debug, Default)]
pub struct EchoFeature;

impl EchoFeature {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureServer for EchoFeature {
    fn name(&self) -> &str {
        "echo"
    }

    async fn initialize(
        &self,
        _params: InitializeParams,
        _token: CancellationToken,
    ) -> Result<InitializeResult, MuxError> {
        Ok(InitializeResult::with_commands([ECHO_COMMAND]))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
        _token: CancellationToken,
    ) -> HandlerResult {
        match params.command.as_str() {
            ECHO_COMMAND => {
                let arguments = params.arguments.unwrap_or_default();
                debug!("echo: {} argument(s)", arguments.len());
                Ok(Value::Array(arguments))
            }
            other => Err(MuxError::command_not_owned(other)),
        }
    }
}
