//! Executor: runs a validated plan step by step via deterministic tools.
//!
//! Steps execute in declared order, never reordered, parallelized, or
//! batched. Every lifecycle transition is emitted to the trace. Rollback
//! steps are treated as ordinary steps; compensation passes are driven by
//! the caller.

use std::collections::HashSet;

use serde_json::json;
use tracing::debug;

use crate::kernel::context::RuntimeContext;
use crate::kernel::KernelError;
use crate::tools::ToolRegistry;
use crate::trace::{EventFields, EventType, TraceEmitter};
use crate::types::{Plan, RunOutput, StepResult};

/// Per-step validator and invoker bound to one run's trace.
pub struct Executor<'a> {
    tools: &'a ToolRegistry,
    trace: &'a TraceEmitter,
}

impl<'a> Executor<'a> {
    pub fn new(tools: &'a ToolRegistry, trace: &'a TraceEmitter) -> Self {
        Self { tools, trace }
    }

    /// Execute every step in order; emits `run_finished` on success.
    pub fn execute(&self, ctx: &RuntimeContext, plan: &Plan) -> Result<RunOutput, KernelError> {
        if plan.plan_id.is_empty() {
            return Err(KernelError::PlanInvalid {
                message: "plan_id must be a non-empty string".to_owned(),
            });
        }
        if plan.steps.is_empty() {
            return Err(KernelError::PlanInvalid {
                message: "Plan.steps must be a non-empty array".to_owned(),
            });
        }
        let mut seen_ids = HashSet::new();
        for step in &plan.steps {
            if step.step_id.is_empty() {
                return Err(KernelError::PlanInvalid {
                    message: "step_id is required".to_owned(),
                });
            }
            if !seen_ids.insert(step.step_id.as_str()) {
                return Err(KernelError::PlanInvalid {
                    message: format!("duplicate step_id: {}", step.step_id),
                });
            }
        }

        let intent_id = Some(plan.intent.intent_id.clone());
        let plan_id = Some(plan.plan_id.clone());
        let mut results = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let tool_id = step.tool.tool_id.as_str();
            let step_fields = || EventFields {
                intent_id: intent_id.clone(),
                plan_id: plan_id.clone(),
                step_id: Some(step.step_id.clone()),
                ..EventFields::default()
            };

            let Some(_tool_def) = self.tools.get(tool_id) else {
                self.trace.emit(
                    EventType::StepDenied,
                    EventFields {
                        message: Some("Unknown tool".to_owned()),
                        data: Some(json!({"tool_id": tool_id})),
                        ..step_fields()
                    },
                )?;
                return Err(KernelError::ToolUnknown {
                    tool_id: tool_id.to_owned(),
                });
            };

            // Re-validate args against the tool's own schema for stable,
            // per-tool error reporting.
            let validator = self
                .tools
                .args_validator(tool_id)
                .ok_or_else(|| KernelError::ToolUnknown {
                    tool_id: tool_id.to_owned(),
                })?;
            let arg_errors: Vec<String> = validator
                .iter_errors(&step.tool.args)
                .map(|e| e.to_string())
                .collect();
            if !arg_errors.is_empty() {
                self.trace.emit(
                    EventType::StepDenied,
                    EventFields {
                        message: Some("Tool args validation failed".to_owned()),
                        data: Some(json!({"tool_id": tool_id, "errors": arg_errors})),
                        ..step_fields()
                    },
                )?;
                return Err(KernelError::ToolArgsInvalid {
                    tool_id: tool_id.to_owned(),
                    errors: arg_errors,
                });
            }

            self.trace.emit(
                EventType::StepStarted,
                EventFields {
                    message: Some("Step started".to_owned()),
                    data: Some(json!({"tool_id": tool_id, "dry_run": ctx.dry_run})),
                    ..step_fields()
                },
            )?;
            debug!(step_id = %step.step_id, tool_id, dry_run = ctx.dry_run, "executing step");

            match self.tools.call(tool_id, &step.tool.args, ctx.dry_run) {
                Ok(output) => {
                    self.trace.emit(
                        EventType::StepFinished,
                        EventFields {
                            message: Some("Step finished".to_owned()),
                            data: Some(json!({
                                "tool_id": tool_id,
                                "ok": true,
                                "output": output.clone(),
                            })),
                            ..step_fields()
                        },
                    )?;
                    results.push(StepResult {
                        step_id: step.step_id.clone(),
                        tool_id: tool_id.to_owned(),
                        output,
                    });
                }
                Err(e) => {
                    self.trace.emit(
                        EventType::Error,
                        EventFields {
                            message: Some("Tool execution error".to_owned()),
                            data: Some(json!({"tool_id": tool_id, "error": e.to_string()})),
                            ..step_fields()
                        },
                    )?;
                    return Err(KernelError::ToolExecution {
                        tool_id: tool_id.to_owned(),
                        source: e,
                    });
                }
            }
        }

        self.trace.emit(
            EventType::RunFinished,
            EventFields {
                intent_id,
                plan_id: plan_id.clone(),
                message: Some("Run finished".to_owned()),
                data: Some(json!({"ok": true})),
                ..EventFields::default()
            },
        )?;

        Ok(RunOutput {
            plan_id: plan.plan_id.clone(),
            results,
        })
    }
}
