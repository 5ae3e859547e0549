//! Initialize and execute-command payloads.
//!
//! Only the fields the multiplexer reads are typed; everything a feature
//! server declares about itself travels as an untyped capability map so
//! that features can negotiate protocol extensions the router knows
//! nothing about.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability declaration: capability name → arbitrarily shaped value.
pub type Capabilities = serde_json::Map<String, Value>;

/// Key under which command-style capabilities are declared.
pub const EXECUTE_COMMAND_PROVIDER: &str = "executeCommandProvider";

// ─────────────────────────────────────────────────────────────────────────────
// Initialize
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub uri: String,
    pub name: String,
}

/// Parameters of the client's `initialize` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folders: Option<Vec<WorkspaceFolder>>,
    /// Client capabilities, passed through to features untouched.
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization_options: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Result of `initialize`, from a single feature or aggregated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
}

impl InitializeResult {
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            server_info: None,
        }
    }

    /// Build a result declaring only the given commands.
    pub fn with_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands: Vec<Value> = commands
            .into_iter()
            .map(|c| Value::String(c.into()))
            .collect();
        let mut capabilities = Capabilities::new();
        capabilities.insert(
            EXECUTE_COMMAND_PROVIDER.into(),
            serde_json::json!({ "commands": commands }),
        );
        Self::with_capabilities(capabilities)
    }
}

/// Commands listed under `executeCommandProvider.commands`.
///
/// Non-string entries are skipped.
pub fn declared_commands(capabilities: &Capabilities) -> impl Iterator<Item = &str> {
    capabilities
        .get(EXECUTE_COMMAND_PROVIDER)
        .and_then(|provider| provider.get("commands"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

// ─────────────────────────────────────────────────────────────────────────────
// Execute command
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters of `workspace/executeCommand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteCommandParams {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Value>>,
}

impl ExecuteCommandParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

/// Outcome of offering a command to a feature (or to the whole router).
///
/// `Owned(Value::Null)` means a feature ran the command and returned
/// nothing; `NotOwned` means nobody claimed it.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Owned(Value),
    NotOwned,
}

impl CommandOutcome {
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}
