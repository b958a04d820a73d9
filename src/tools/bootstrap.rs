//! Registration of the built-in deterministic tool set.

use serde_json::{json, Value};

use super::registry::{RegistryError, ToolRegistry};
use super::{app, fs, net, notify, SideEffects, Tool, ToolDef};

fn tool_def(
    tool_id: &str,
    title: &str,
    side_effects: SideEffects,
    supports_dry_run: bool,
    args_schema: Value,
) -> ToolDef {
    ToolDef {
        tool_id: tool_id.to_owned(),
        version: "0.1.0".to_owned(),
        title: title.to_owned(),
        description: String::new(),
        side_effects,
        destructive: false,
        requires_explicit_allow: false,
        supports_dry_run,
        args_schema,
    }
}

/// Build a registry holding the framework's built-in tools.
pub fn build_tool_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    let mut register = |def: ToolDef, imp: Box<dyn Tool>| registry.register(def, imp);

    register(
        tool_def(
            "fs.list",
            "List directory entries",
            SideEffects::Filesystem,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        ),
        Box::new(fs::list),
    )?;

    register(
        tool_def(
            "fs.stat",
            "Stat a path",
            SideEffects::Filesystem,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        ),
        Box::new(fs::stat),
    )?;

    register(
        tool_def(
            "fs.mkdir",
            "Create a directory",
            SideEffects::Filesystem,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "path": {"type": "string"},
                    "parents": {"type": "boolean"},
                    "exist_ok": {"type": "boolean"}
                },
                "required": ["path"]
            }),
        ),
        Box::new(fs::mkdir),
    )?;

    register(
        tool_def(
            "fs.move",
            "Move/rename a path",
            SideEffects::Filesystem,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "from": {"type": "string"},
                    "to": {"type": "string"},
                    "on_conflict": {
                        "enum": ["error", "overwrite", "skip", "suffix_increment"]
                    },
                    "overwrite": {"type": "boolean"}
                },
                "required": ["from", "to"]
            }),
        ),
        Box::new(fs::mv),
    )?;

    register(
        tool_def(
            "fs.walk",
            "Recursively list entries",
            SideEffects::Filesystem,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "path": {"type": "string"},
                    "max_depth": {"type": "integer", "minimum": 0},
                    "include_dirs": {"type": "boolean"}
                },
                "required": ["path"]
            }),
        ),
        Box::new(fs::walk),
    )?;

    register(
        tool_def(
            "notify.send",
            "Send a notification",
            SideEffects::Notification,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
        ),
        Box::new(notify::send),
    )?;

    register(
        tool_def(
            "net.http",
            "Issue an HTTP request",
            SideEffects::Network,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "method": {
                        "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]
                    },
                    "url": {"type": "string"},
                    "headers": {
                        "type": "object",
                        "additionalProperties": {"type": "string"}
                    },
                    "json": {},
                    "body": {"type": "string"},
                    "timeout_s": {"type": "number", "exclusiveMinimum": 0}
                },
                "required": ["url"]
            }),
        ),
        Box::new(net::http),
    )?;

    register(
        tool_def(
            "app.open",
            "Open app/file (contract only)",
            SideEffects::App,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {"target": {"type": "string"}},
                "required": ["target"]
            }),
        ),
        Box::new(app::open),
    )?;

    register(
        tool_def(
            "app.quit",
            "Quit app (contract only)",
            SideEffects::App,
            true,
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {"app_id": {"type": "string"}},
                "required": ["app_id"]
            }),
        ),
        Box::new(app::quit),
    )?;

    Ok(registry)
}
