//! `notify.send`: one human-readable line on the operational stream.

use serde_json::{json, Value};

use super::{require_str, ToolError};

/// Send a notification.
///
/// The commit-mode side effect is a single line on stderr, keeping stdout
/// stable for hosts that print structured output there.
pub fn send(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let message = require_str(args, "notify.send", "message")?;

    if dry_run {
        return Ok(json!({
            "dry_run": true,
            "expected_effects": [{
                "kind": "notify",
                "summary": format!("Notify: {message}"),
                "resources": [],
            }],
        }));
    }

    eprintln!("{message}");
    Ok(json!({"dry_run": false, "sent": true}))
}
