//! Deterministic tools and their registry.
//!
//! Every tool shares one contract: `call(args, dry_run) -> output`. In
//! dry-run a tool must not mutate anything and instead reports
//! `expected_effects`; in commit mode it performs the action and returns
//! structured result data. Argument validation against the tool's
//! `args_schema` is the executor's job, but tools still defend against
//! missing fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod app;
pub mod bootstrap;
pub mod fs;
pub mod net;
pub mod notify;
pub mod registry;

pub use bootstrap::build_tool_registry;
pub use registry::{RegistryError, ToolRegistry};

/// Side-effect class a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffects {
    Filesystem,
    Notification,
    App,
    Network,
}

/// Static metadata describing a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub tool_id: String,
    pub version: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub side_effects: SideEffects,
    pub destructive: bool,
    pub requires_explicit_allow: bool,
    pub supports_dry_run: bool,
    /// JSON Schema the executor validates step args against.
    pub args_schema: Value,
}

/// Tool invocation failures.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required argument is missing or has the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A referenced path or tool does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The destination already exists and the strategy forbids replacing it.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The operation is declared but has no commit-mode implementation.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Underlying filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(String),
}

/// A deterministic tool callable by the executor.
///
/// Output depends only on the arguments and the host state the tool
/// explicitly reads, never on hidden context.
pub trait Tool: Send + Sync {
    fn call(&self, args: &Value, dry_run: bool) -> Result<Value, ToolError>;
}

impl<F> Tool for F
where
    F: Fn(&Value, bool) -> Result<Value, ToolError> + Send + Sync,
{
    fn call(&self, args: &Value, dry_run: bool) -> Result<Value, ToolError> {
        self(args, dry_run)
    }
}

/// Extract a required non-empty string argument.
pub(crate) fn require_str<'a>(args: &'a Value, tool: &str, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidInput(format!("{tool}: '{key}' must be a non-empty string")))
}

/// Extract an optional boolean argument with a default.
pub(crate) fn optional_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}
