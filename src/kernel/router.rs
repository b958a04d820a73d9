//! Intent routing by plugin namespace.
//!
//! Resolves identifiers only; it never loads plugin implementations. The
//! convention is that the first dotted segment of an `intent_id` names the
//! plugin namespace (`desktop.tidy.run` -> `desktop`).

use crate::kernel::planner::PlanError;
use crate::types::Intent;

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub plugin_id: String,
    pub intent_id: String,
}

/// Minimal prefix-based intent router.
#[derive(Debug, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    /// Extract the plugin namespace from an intent id.
    pub fn route(&self, intent: &Intent) -> Result<Route, PlanError> {
        let intent_id = intent.intent_id.as_str();
        if intent_id.is_empty() {
            return Err(PlanError::IntentInvalid {
                message: "Missing or invalid intent_id".to_owned(),
            });
        }
        let plugin_id = intent_id
            .split_once('.')
            .map(|(prefix, _)| prefix)
            .unwrap_or(intent_id);
        Ok(Route {
            plugin_id: plugin_id.to_owned(),
            intent_id: intent_id.to_owned(),
        })
    }
}
