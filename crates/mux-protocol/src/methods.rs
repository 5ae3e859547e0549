//! Method name constants — the exact strings sent as the `method` field.

/// Method names the multiplexer dispatches itself.
pub struct Methods;

impl Methods {
    // ── Lifecycle ───────────────────────────────────────────────────────
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";

    // ── Workspace ───────────────────────────────────────────────────────
    pub const EXECUTE_COMMAND: &str = "workspace/executeCommand";

    // ── Protocol ────────────────────────────────────────────────────────
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";
}

/// Returns true for `$/`-prefixed methods, which a server may ignore
/// when it has no handler for them.
pub fn is_implementation_dependent(method: &str) -> bool {
    method.starts_with("$/")
}
