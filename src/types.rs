//! Core contract types shared across the kernel.
//!
//! These mirror the shipped JSON Schemas (`contracts/core/schemas/`). Open
//! objects (`params`, `context`, tool `args`, tool outputs) stay as raw
//! [`serde_json::Value`]s; everything else is typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The authorization envelope a caller grants to a run.
///
/// The scope is set by whoever constructs the [`Intent`]; no downstream
/// component may widen it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// Filesystem roots the run may touch. Empty means no authorization.
    pub fs_roots: Vec<String>,
    /// Whether network-side-effect tools may run at all.
    #[serde(default)]
    pub allow_network: bool,
    /// Host patterns admitted when the network is enabled: `"*"`,
    /// `"*.domain.tld"` (suffix match) or an exact host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_hosts_allowlist: Option<Vec<String>>,
}

/// A contract-shaped request naming an action and its authorization scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub intent_id: String,
    #[serde(default = "empty_object")]
    pub params: Value,
    pub scope: Scope,
    #[serde(default = "empty_object")]
    pub context: Value,
}

/// Risk classification attached to a plan by its planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Planner-declared risk with human-readable reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

/// A step's role within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Read-only preflight.
    Staging,
    /// Intended mutation.
    Commit,
    /// Declared compensation; executed only by an external compensation pass.
    Rollback,
}

/// The tool invocation a step performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_id: String,
    pub args: Value,
    /// `Some(false)` marks a step as incompatible with dry-run execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run_ok: Option<bool>,
}

/// Pre-declared description of an effect a tool would perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSummary {
    pub kind: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

/// One ordered step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub title: String,
    pub phase: Phase,
    pub tool: ToolCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_effects: Option<Vec<EffectSummary>>,
    /// Step this one compensates, for rollback phases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensates_step_id: Option<String>,
}

/// A totally ordered list of tool steps; the only executable unit.
///
/// A plan carries its originating intent by value, so downstream modules
/// read the scope from the plan's own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Risk>,
    pub steps: Vec<Step>,
}

/// Result of one executed step, kept intact for replay and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub tool_id: String,
    pub output: Value,
}

/// What a completed run returns to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub plan_id: String,
    pub results: Vec<StepResult>,
}
