//! Kernel orchestration: Intent -> Plan -> Policy -> Execute -> Trace.
//!
//! Hard rules:
//! - plan-first gating: execution always happens from a validated Plan.
//! - deterministic tools only (no arbitrary shell).
//! - trace every transition; denials and schema failures are terminal
//!   trace events.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

pub mod context;
pub mod executor;
pub mod planner;
pub mod policy;
pub mod router;

pub use context::RuntimeContext;
pub use executor::Executor;
pub use planner::{PlanError, Planner, PlannerRegistry, StaticPlanner};
pub use policy::{Decision, PolicyDecision, PolicyEngine, ReasonCode};
pub use router::{IntentRouter, Route};

use crate::contracts::{ContractError, ContractStore};
use crate::tools::{ToolError, ToolRegistry};
use crate::trace::{EventFields, EventType, TraceEmitter, TraceError, TraceSink};
use crate::types::{Intent, Plan, RunOutput};

/// Kernel-level failures, each carrying a stable code.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The plan does not validate against `plan.schema.json`.
    #[error("plan does not validate against plan.schema.json")]
    PlanSchemaInvalid { errors: Vec<String> },
    /// The policy engine denied the plan.
    #[error("denied by policy: {summary}")]
    PolicyDenied {
        summary: String,
        reasons: Vec<String>,
    },
    /// The plan is structurally unusable (empty ids, duplicate steps).
    #[error("invalid plan: {message}")]
    PlanInvalid { message: String },
    /// A step names a tool the registry does not know.
    #[error("unknown tool: {tool_id}")]
    ToolUnknown { tool_id: String },
    /// Step args failed the tool's own schema.
    #[error("tool args validation failed: {tool_id}")]
    ToolArgsInvalid {
        tool_id: String,
        errors: Vec<String>,
    },
    /// The tool implementation failed.
    #[error("tool execution error: {tool_id}")]
    ToolExecution {
        tool_id: String,
        #[source]
        source: ToolError,
    },
    /// Planning failed before any execution.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// Contract store failure.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// Trace sink failure.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// Plan (de)serialization failure.
    #[error("plan serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KernelError {
    /// The stable dotted code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PlanSchemaInvalid { .. } => "plan.schema_invalid",
            Self::PolicyDenied { .. } => "policy.denied",
            Self::PlanInvalid { .. } => "plan.invalid",
            Self::ToolUnknown { .. } => "tool.unknown",
            Self::ToolArgsInvalid { .. } => "tool.args_invalid",
            Self::ToolExecution { .. } => "tool.error",
            Self::Plan(e) => e.code(),
            Self::Contract(_) => "contract.error",
            Self::Trace(_) => "trace.error",
            Self::Serialization(_) => "plan.invalid",
        }
    }

    /// Structured payload carried alongside the code, when any.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::PlanSchemaInvalid { errors } => Some(json!({"errors": errors})),
            Self::PolicyDenied { reasons, .. } => Some(json!({"reasons": reasons})),
            Self::ToolUnknown { tool_id } => Some(json!({"tool_id": tool_id})),
            Self::ToolArgsInvalid { tool_id, errors } => {
                Some(json!({"tool_id": tool_id, "errors": errors}))
            }
            Self::ToolExecution { tool_id, .. } => Some(json!({"tool_id": tool_id})),
            _ => None,
        }
    }
}

/// The orchestrator. Owns nothing mutable; per-run state lives in the
/// [`RuntimeContext`] and the trace sink opened for that run.
pub struct Kernel {
    tools: Arc<ToolRegistry>,
    contracts: Arc<ContractStore>,
}

impl Kernel {
    /// Build a kernel over a shared tool registry and contract store.
    pub fn new(tools: Arc<ToolRegistry>, contracts: Arc<ContractStore>) -> Self {
        Self { tools, contracts }
    }

    /// Plan the intent with the given planner, then run the plan.
    pub fn run_intent(
        &self,
        ctx: &RuntimeContext,
        intent: &Intent,
        planner: &dyn Planner,
    ) -> Result<RunOutput, KernelError> {
        let plan = planner.plan(intent)?;
        self.run_plan(ctx, &plan)
    }

    /// Validate and run a typed plan.
    pub fn run_plan(&self, ctx: &RuntimeContext, plan: &Plan) -> Result<RunOutput, KernelError> {
        let plan_value = serde_json::to_value(plan)?;
        self.run(ctx, &plan_value)
    }

    /// Validate and run a plan in its canonical JSON form.
    pub fn run_plan_value(
        &self,
        ctx: &RuntimeContext,
        plan_value: &Value,
    ) -> Result<RunOutput, KernelError> {
        self.run(ctx, plan_value)
    }

    fn run(&self, ctx: &RuntimeContext, plan_value: &Value) -> Result<RunOutput, KernelError> {
        let sink = TraceSink::open(&ctx.trace_path)?;
        let trace = TraceEmitter::new(sink, ctx.run_id.clone());

        let intent_value = plan_value.get("intent").cloned().unwrap_or(Value::Null);
        let intent_id = intent_value
            .get("intent_id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let plan_id = plan_value
            .get("plan_id")
            .and_then(Value::as_str)
            .map(str::to_owned);

        trace.emit(
            EventType::IntentReceived,
            EventFields {
                intent_id: intent_id.clone(),
                plan_id: plan_id.clone(),
                message: Some("Intent received".to_owned()),
                data: Some(json!({"intent": intent_value})),
                ..EventFields::default()
            },
        )?;

        // Contract gate: the plan must validate before policy or execution.
        let schema_errors = self.contracts.validate("plan.schema.json", plan_value)?;
        if !schema_errors.is_empty() {
            trace.emit(
                EventType::Error,
                EventFields {
                    intent_id,
                    plan_id,
                    message: Some("Plan schema validation failed".to_owned()),
                    data: Some(json!({
                        "schema": "plan.schema.json",
                        "errors": schema_errors,
                    })),
                    ..EventFields::default()
                },
            )?;
            return Err(KernelError::PlanSchemaInvalid {
                errors: schema_errors,
            });
        }

        let plan: Plan = match serde_json::from_value(plan_value.clone()) {
            Ok(plan) => plan,
            Err(e) => {
                trace.emit(
                    EventType::Error,
                    EventFields {
                        intent_id,
                        plan_id,
                        message: Some("Plan schema validation failed".to_owned()),
                        data: Some(json!({
                            "schema": "plan.schema.json",
                            "errors": [e.to_string()],
                        })),
                        ..EventFields::default()
                    },
                )?;
                return Err(KernelError::PlanSchemaInvalid {
                    errors: vec![e.to_string()],
                });
            }
        };

        trace.emit(
            EventType::PlanGenerated,
            EventFields {
                intent_id: intent_id.clone(),
                plan_id: plan_id.clone(),
                message: Some("Plan validated".to_owned()),
                ..EventFields::default()
            },
        )?;

        let decision = PolicyEngine::new(&self.tools).evaluate(ctx, &plan);
        let policy_payload = serde_json::to_value(&decision)?;
        trace.emit(
            EventType::PolicyDecision,
            EventFields {
                intent_id: intent_id.clone(),
                plan_id: plan_id.clone(),
                policy: Some(policy_payload.clone()),
                ..EventFields::default()
            },
        )?;

        if !decision.is_allow() {
            let summary = decision
                .summary
                .clone()
                .unwrap_or_else(|| "Denied by policy".to_owned());
            trace.emit(
                EventType::StepDenied,
                EventFields {
                    intent_id,
                    plan_id,
                    message: Some(summary.clone()),
                    policy: Some(policy_payload),
                    ..EventFields::default()
                },
            )?;
            return Err(KernelError::PolicyDenied {
                summary,
                reasons: decision.reason_strings(),
            });
        }

        info!(
            run_id = %ctx.run_id,
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            dry_run = ctx.dry_run,
            "plan admitted"
        );

        Executor::new(&self.tools, &trace).execute(ctx, &plan)
    }
}
