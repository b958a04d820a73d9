//! `app.open` / `app.quit`: contract-only application control.
//!
//! Real app control is environment-specific; these tools exist primarily as
//! I/O contracts. Dry-run always succeeds and describes the intended
//! effect; commit mode is not implemented in the framework sandbox.

use serde_json::{json, Value};

use super::{require_str, ToolError};

/// Open an application or file (contract only).
pub fn open(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let target = require_str(args, "app.open", "target")?;

    if dry_run {
        return Ok(json!({
            "dry_run": true,
            "expected_effects": [{
                "kind": "app",
                "summary": format!("Open: {target}"),
                "resources": [target],
            }],
        }));
    }

    Err(ToolError::Unsupported(
        "app.open is not implemented in the framework sandbox".to_owned(),
    ))
}

/// Quit an application (contract only).
pub fn quit(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let app_id = require_str(args, "app.quit", "app_id")?;

    if dry_run {
        return Ok(json!({
            "dry_run": true,
            "expected_effects": [{
                "kind": "app",
                "summary": format!("Quit: {app_id}"),
                "resources": [app_id],
            }],
        }));
    }

    Err(ToolError::Unsupported(
        "app.quit is not implemented in the framework sandbox".to_owned(),
    ))
}
