//! Planner interface, the static planner, and the planner registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::types::{Intent, Plan};

/// Planning failures, each carrying a stable code.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The intent is malformed for this planner.
    #[error("invalid intent: {message}")]
    IntentInvalid { message: String },
    /// No planner handles this intent id.
    #[error("unknown intent_id: {intent_id}")]
    IntentUnknown { intent_id: String },
    /// The intent lacks an authorization scope.
    #[error("missing scope: {message}")]
    ScopeMissing { message: String },
    /// The declared scope does not cover what the planner needs.
    #[error("invalid scope: {message}")]
    ScopeInvalid {
        message: String,
        data: Option<Value>,
    },
    /// The referenced config file does not exist.
    #[error("config not found: {path}")]
    ConfigNotFound { path: String },
    /// The config file is not parseable YAML/JSON.
    #[error("failed to parse config: {message}")]
    ConfigInvalidYaml { message: String },
    /// The config parsed but violates a semantic rule.
    #[error("invalid config: {message}")]
    ConfigInvalid {
        message: String,
        data: Option<Value>,
    },
    /// The config does not match its schema.
    #[error("config does not match schema")]
    ConfigSchemaInvalid { errors: Vec<String> },
}

impl PlanError {
    /// The stable dotted code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IntentInvalid { .. } => "intent.invalid",
            Self::IntentUnknown { .. } => "intent.unknown",
            Self::ScopeMissing { .. } => "scope.missing",
            Self::ScopeInvalid { .. } => "scope.invalid",
            Self::ConfigNotFound { .. } => "config.not_found",
            Self::ConfigInvalidYaml { .. } => "config.invalid_yaml",
            Self::ConfigInvalid { .. } => "config.invalid",
            Self::ConfigSchemaInvalid { .. } => "config.schema_invalid",
        }
    }
}

/// Turns an intent into an executable plan.
pub trait Planner: Send + Sync {
    fn plan(&self, intent: &Intent) -> Result<Plan, PlanError>;
}

/// Returns a fixed plan template, substituting the incoming intent by value.
pub struct StaticPlanner {
    template: Plan,
}

impl StaticPlanner {
    pub fn new(template: Plan) -> Self {
        Self { template }
    }
}

impl Planner for StaticPlanner {
    fn plan(&self, intent: &Intent) -> Result<Plan, PlanError> {
        let mut plan = self.template.clone();
        plan.intent = intent.clone();
        Ok(plan)
    }
}

/// Maps `intent_id` to the planner the host chose to expose.
///
/// Hosts link the planners they want; there is no plugin-side reflection.
#[derive(Default)]
pub struct PlannerRegistry {
    by_intent: HashMap<String, Arc<dyn Planner>>,
}

impl PlannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a planner for one intent id.
    pub fn register(&mut self, intent_id: impl Into<String>, planner: Arc<dyn Planner>) {
        self.by_intent.insert(intent_id.into(), planner);
    }

    /// Planner registered for an intent id, if any.
    pub fn resolve(&self, intent_id: &str) -> Option<Arc<dyn Planner>> {
        self.by_intent.get(intent_id).cloned()
    }

    /// Registered intent ids, sorted.
    pub fn list_intents(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_intent.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Plan via the registered planner for the intent's id.
    pub fn plan(&self, intent: &Intent) -> Result<Plan, PlanError> {
        let planner = self
            .resolve(&intent.intent_id)
            .ok_or_else(|| PlanError::IntentUnknown {
                intent_id: intent.intent_id.clone(),
            })?;
        planner.plan(intent)
    }
}
