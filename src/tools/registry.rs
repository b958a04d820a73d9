//! Tool registry: metadata, compiled args validators, and implementations.
//!
//! The registry is populated once at startup and read-only afterwards.

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{Tool, ToolDef, ToolError};

/// Registration failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The tool's `args_schema` is not a valid JSON Schema.
    #[error("args schema for {tool_id} failed to compile: {message}")]
    InvalidArgsSchema { tool_id: String, message: String },
}

struct RegisteredTool {
    def: ToolDef,
    args_validator: Validator,
    imp: Box<dyn Tool>,
}

/// Map from `tool_id` to a tool's metadata and implementation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its args schema.
    ///
    /// Re-registering a `tool_id` replaces the previous entry.
    pub fn register(&mut self, def: ToolDef, imp: Box<dyn Tool>) -> Result<(), RegistryError> {
        let args_validator =
            jsonschema::validator_for(&def.args_schema).map_err(|e| RegistryError::InvalidArgsSchema {
                tool_id: def.tool_id.clone(),
                message: e.to_string(),
            })?;
        debug!(tool_id = %def.tool_id, "tool registered");
        self.tools.insert(
            def.tool_id.clone(),
            RegisteredTool {
                def,
                args_validator,
                imp,
            },
        );
        Ok(())
    }

    /// Look up a tool's metadata.
    pub fn get(&self, tool_id: &str) -> Option<&ToolDef> {
        self.tools.get(tool_id).map(|t| &t.def)
    }

    /// Compiled validator for a tool's `args_schema`.
    pub fn args_validator(&self, tool_id: &str) -> Option<&Validator> {
        self.tools.get(tool_id).map(|t| &t.args_validator)
    }

    /// Invoke a tool implementation.
    pub fn call(&self, tool_id: &str, args: &Value, dry_run: bool) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| ToolError::NotFound(format!("unknown tool: {tool_id}")))?;
        tool.imp.call(args, dry_run)
    }

    /// All tool definitions, sorted by `tool_id` for stable output.
    pub fn list_tools(&self) -> Vec<&ToolDef> {
        let mut defs: Vec<&ToolDef> = self.tools.values().map(|t| &t.def).collect();
        defs.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        defs
    }
}
