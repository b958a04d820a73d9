//! Policy engine: deny-by-default authorization over a validated plan.
//!
//! [`PolicyEngine::evaluate`] is a pure function of the runtime context and
//! the plan; it never mutates state. Rules are applied in order and the
//! first denial wins. Denials carry stable, enumerated reason codes that
//! downstream consumers (traces, hosts) can match on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::kernel::context::RuntimeContext;
use crate::paths::{is_within_any_root, normalize_roots};
use crate::tools::{SideEffects, ToolRegistry};
use crate::types::Plan;

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// The closed vocabulary of policy reason codes.
///
/// Kept complete even where typed plan construction makes a code
/// unreachable from the kernel path, so traces stay a stable wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    #[serde(rename = "scope.missing")]
    ScopeMissing,
    #[serde(rename = "scope.invalid")]
    ScopeInvalid,
    #[serde(rename = "scope.out_of_bounds")]
    ScopeOutOfBounds,
    #[serde(rename = "scope.network_denied")]
    ScopeNetworkDenied,
    #[serde(rename = "scope.network_allowlist_missing")]
    ScopeNetworkAllowlistMissing,
    #[serde(rename = "scope.network_host_denied")]
    ScopeNetworkHostDenied,
    #[serde(rename = "scope.network_missing_url")]
    ScopeNetworkMissingUrl,
    #[serde(rename = "scope.network_invalid_url")]
    ScopeNetworkInvalidUrl,
    #[serde(rename = "plan.intent_missing")]
    PlanIntentMissing,
    #[serde(rename = "plan.steps_missing")]
    PlanStepsMissing,
    #[serde(rename = "plan.step_invalid")]
    PlanStepInvalid,
    #[serde(rename = "plan.tool_missing")]
    PlanToolMissing,
    #[serde(rename = "plan.tool_id_invalid")]
    PlanToolIdInvalid,
    #[serde(rename = "plan.args_invalid")]
    PlanArgsInvalid,
    #[serde(rename = "tool.unknown")]
    ToolUnknown,
    #[serde(rename = "tool.destructive_denied")]
    ToolDestructiveDenied,
    #[serde(rename = "dry_run.not_supported")]
    DryRunNotSupported,
    #[serde(rename = "dry_run.step_not_marked_ok")]
    DryRunStepNotMarkedOk,
    #[serde(rename = "scope.ok")]
    ScopeOk,
    #[serde(rename = "tools.ok")]
    ToolsOk,
}

impl ReasonCode {
    /// The stable dotted code string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScopeMissing => "scope.missing",
            Self::ScopeInvalid => "scope.invalid",
            Self::ScopeOutOfBounds => "scope.out_of_bounds",
            Self::ScopeNetworkDenied => "scope.network_denied",
            Self::ScopeNetworkAllowlistMissing => "scope.network_allowlist_missing",
            Self::ScopeNetworkHostDenied => "scope.network_host_denied",
            Self::ScopeNetworkMissingUrl => "scope.network_missing_url",
            Self::ScopeNetworkInvalidUrl => "scope.network_invalid_url",
            Self::PlanIntentMissing => "plan.intent_missing",
            Self::PlanStepsMissing => "plan.steps_missing",
            Self::PlanStepInvalid => "plan.step_invalid",
            Self::PlanToolMissing => "plan.tool_missing",
            Self::PlanToolIdInvalid => "plan.tool_id_invalid",
            Self::PlanArgsInvalid => "plan.args_invalid",
            Self::ToolUnknown => "tool.unknown",
            Self::ToolDestructiveDenied => "tool.destructive_denied",
            Self::DryRunNotSupported => "dry_run.not_supported",
            Self::DryRunStepNotMarkedOk => "dry_run.step_not_marked_ok",
            Self::ScopeOk => "scope.ok",
            Self::ToolsOk => "tools.ok",
        }
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub reason_codes: Vec<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl PolicyDecision {
    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }

    /// Reason codes as their stable strings.
    pub fn reason_strings(&self) -> Vec<String> {
        self.reason_codes
            .iter()
            .map(|c| c.as_str().to_owned())
            .collect()
    }

    fn deny(code: ReasonCode, summary: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason_codes: vec![code],
            summary: Some(summary.into()),
        }
    }
}

/// Does `host` match one of the allowlist patterns?
///
/// Patterns: `"*"` (any host), `"*.domain.tld"` (dot-anchored suffix), or
/// an exact host.
fn host_allowed(host: &str, allowlist: &[String]) -> bool {
    allowlist.iter().any(|pattern| {
        if pattern == "*" {
            return true;
        }
        if let Some(suffix) = pattern.strip_prefix('*') {
            if pattern.starts_with("*.") {
                return host.ends_with(suffix);
            }
        }
        host == pattern
    })
}

/// Deny-by-default policy over plans.
pub struct PolicyEngine<'a> {
    tools: &'a ToolRegistry,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(tools: &'a ToolRegistry) -> Self {
        Self { tools }
    }

    /// Evaluate a plan. First denial wins; allow carries `scope.ok, tools.ok`.
    pub fn evaluate(&self, ctx: &RuntimeContext, plan: &Plan) -> PolicyDecision {
        let scope = &plan.intent.scope;

        if scope.fs_roots.is_empty() {
            return PolicyDecision::deny(ReasonCode::ScopeMissing, "Explicit scope is required");
        }
        let roots = normalize_roots(&scope.fs_roots);
        if roots.is_empty() {
            return PolicyDecision::deny(
                ReasonCode::ScopeInvalid,
                "Scope fs_roots must be valid paths",
            );
        }

        let allowlist = scope.network_hosts_allowlist.as_deref().unwrap_or(&[]);
        if allowlist.iter().any(String::is_empty) {
            return PolicyDecision::deny(
                ReasonCode::ScopeInvalid,
                "Scope network_hosts_allowlist must be an array of non-empty strings when provided",
            );
        }

        if plan.steps.is_empty() {
            return PolicyDecision::deny(ReasonCode::PlanStepsMissing, "Plan must have steps");
        }

        for step in &plan.steps {
            let tool_id = step.tool.tool_id.as_str();
            if tool_id.is_empty() {
                return PolicyDecision::deny(ReasonCode::PlanToolIdInvalid, "tool_id is required");
            }
            let Some(tool_def) = self.tools.get(tool_id) else {
                return PolicyDecision::deny(
                    ReasonCode::ToolUnknown,
                    format!("Unknown tool: {tool_id}"),
                );
            };

            // Network safety: deny-by-default unless scope explicitly allows.
            if tool_def.side_effects == SideEffects::Network {
                if !scope.allow_network {
                    return PolicyDecision::deny(
                        ReasonCode::ScopeNetworkDenied,
                        format!("Network tool is denied by scope.allow_network=false: {tool_id}"),
                    );
                }
                if allowlist.is_empty() {
                    return PolicyDecision::deny(
                        ReasonCode::ScopeNetworkAllowlistMissing,
                        "Network is enabled but scope.network_hosts_allowlist is empty",
                    );
                }
                let Some(args) = step.tool.args.as_object() else {
                    return PolicyDecision::deny(
                        ReasonCode::PlanArgsInvalid,
                        "Step.tool.args must be an object",
                    );
                };
                let url = args
                    .get("url")
                    .or_else(|| args.get("endpoint"))
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty());
                let Some(url) = url else {
                    return PolicyDecision::deny(
                        ReasonCode::ScopeNetworkMissingUrl,
                        format!(
                            "Network tool requires args.url or args.endpoint to enforce allowlist: {tool_id}"
                        ),
                    );
                };
                let host = Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_owned));
                let Some(host) = host else {
                    return PolicyDecision::deny(
                        ReasonCode::ScopeNetworkInvalidUrl,
                        format!("Invalid URL for network tool allowlist enforcement: {tool_id}"),
                    );
                };
                if !host_allowed(&host, allowlist) {
                    return PolicyDecision::deny(
                        ReasonCode::ScopeNetworkHostDenied,
                        format!("Network host is not in allowlist: {host}"),
                    );
                }
            }

            // Scope enforcement for filesystem tools: every path-like arg
            // must land inside a declared root.
            if tool_id.starts_with("fs.") {
                let Some(args) = step.tool.args.as_object() else {
                    return PolicyDecision::deny(
                        ReasonCode::PlanArgsInvalid,
                        "Step.tool.args must be an object",
                    );
                };
                for key in ["path", "from", "to"] {
                    let Some(path) = args.get(key).and_then(Value::as_str).filter(|p| !p.is_empty())
                    else {
                        continue;
                    };
                    if !is_within_any_root(path, &roots) {
                        return PolicyDecision::deny(
                            ReasonCode::ScopeOutOfBounds,
                            format!("Tool path outside declared scope: {path}"),
                        );
                    }
                }
            }

            if tool_def.destructive && !ctx.allow_destructive {
                return PolicyDecision::deny(
                    ReasonCode::ToolDestructiveDenied,
                    format!("Destructive tool is denied by default: {tool_id}"),
                );
            }

            if ctx.dry_run && ctx.strict_dry_run && !tool_def.supports_dry_run {
                return PolicyDecision::deny(
                    ReasonCode::DryRunNotSupported,
                    format!("Tool does not support dry-run: {tool_id}"),
                );
            }

            if ctx.dry_run && step.tool.dry_run_ok == Some(false) {
                return PolicyDecision::deny(
                    ReasonCode::DryRunStepNotMarkedOk,
                    format!("Step not marked dry-run compatible: {tool_id}"),
                );
            }
        }

        PolicyDecision {
            decision: Decision::Allow,
            reason_codes: vec![ReasonCode::ScopeOk, ReasonCode::ToolsOk],
            summary: Some("Allowed by default policy".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::build_tool_registry;
    use crate::types::{Intent, Phase, Scope, Step, ToolCall};
    use serde_json::json;

    fn test_ctx() -> RuntimeContext {
        RuntimeContext::with_run_id("run_policy_test", "/tmp/trace.jsonl")
    }

    fn step(tool_id: &str, args: Value) -> Step {
        Step {
            step_id: format!("s_{}", tool_id.replace('.', "_")),
            title: tool_id.to_owned(),
            phase: Phase::Staging,
            tool: ToolCall {
                tool_id: tool_id.to_owned(),
                args,
                dry_run_ok: Some(true),
            },
            preconditions: None,
            expected_effects: None,
            compensates_step_id: None,
        }
    }

    fn plan_with(scope: Scope, steps: Vec<Step>) -> Plan {
        Plan {
            plan_id: "p_test".to_owned(),
            intent: Intent {
                intent_id: "test.intent".to_owned(),
                params: json!({}),
                scope,
                context: json!({}),
            },
            risk: None,
            steps,
        }
    }

    fn fs_scope(roots: &[&str]) -> Scope {
        Scope {
            fs_roots: roots.iter().map(|r| (*r).to_owned()).collect(),
            allow_network: false,
            network_hosts_allowlist: None,
        }
    }

    #[test]
    fn test_denies_empty_scope() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(fs_scope(&[]), vec![step("fs.list", json!({"path": "/tmp"}))]);

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert!(!decision.is_allow());
        assert_eq!(decision.reason_codes, vec![ReasonCode::ScopeMissing]);
    }

    #[test]
    fn test_denies_missing_steps() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(fs_scope(&["/tmp"]), vec![]);

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::PlanStepsMissing]);
    }

    #[test]
    fn test_denies_unknown_tool() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(fs_scope(&["/tmp"]), vec![step("fs.nope", json!({}))]);

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::ToolUnknown]);
    }

    #[test]
    fn test_denies_path_outside_scope() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(
            fs_scope(&["/tmp"]),
            vec![step("fs.stat", json!({"path": "/"}))],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::ScopeOutOfBounds]);
    }

    #[test]
    fn test_denies_substring_root_escape() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(
            fs_scope(&["/tmp/scope"]),
            vec![step("fs.list", json!({"path": "/tmp/scopeX"}))],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::ScopeOutOfBounds]);
    }

    #[test]
    fn test_checks_both_move_endpoints() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(
            fs_scope(&["/tmp"]),
            vec![step(
                "fs.move",
                json!({"from": "/tmp/a.txt", "to": "/etc/a.txt"}),
            )],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::ScopeOutOfBounds]);
    }

    #[test]
    fn test_allows_in_scope_read_only_plan() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(
            fs_scope(&["/tmp"]),
            vec![step("fs.list", json!({"path": "/tmp"}))],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert!(decision.is_allow());
        assert_eq!(
            decision.reason_codes,
            vec![ReasonCode::ScopeOk, ReasonCode::ToolsOk]
        );
    }

    #[test]
    fn test_network_denied_by_default() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let plan = plan_with(
            fs_scope(&["/tmp"]),
            vec![step(
                "net.http",
                json!({"url": "https://api.example.com/ping"}),
            )],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::ScopeNetworkDenied]);
    }

    #[test]
    fn test_network_requires_allowlist() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let mut scope = fs_scope(&["/tmp"]);
        scope.allow_network = true;
        let plan = plan_with(
            scope,
            vec![step(
                "net.http",
                json!({"url": "https://api.example.com/ping"}),
            )],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(
            decision.reason_codes,
            vec![ReasonCode::ScopeNetworkAllowlistMissing]
        );
    }

    #[test]
    fn test_network_host_allow_and_deny() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let mut scope = fs_scope(&["/tmp"]);
        scope.allow_network = true;
        scope.network_hosts_allowlist = Some(vec!["api.allowed.com".to_owned()]);

        let allowed = plan_with(
            scope.clone(),
            vec![step(
                "net.http",
                json!({"url": "https://api.allowed.com/ping"}),
            )],
        );
        assert!(engine.evaluate(&test_ctx(), &allowed).is_allow());

        let denied = plan_with(
            scope,
            vec![step(
                "net.http",
                json!({"url": "https://api.denied.com/ping"}),
            )],
        );
        assert_eq!(
            engine.evaluate(&test_ctx(), &denied).reason_codes,
            vec![ReasonCode::ScopeNetworkHostDenied]
        );
    }

    #[test]
    fn test_network_wildcard_suffix_patterns() {
        assert!(host_allowed("api.example.com", &["*".to_owned()]));
        assert!(host_allowed(
            "api.example.com",
            &["*.example.com".to_owned()]
        ));
        assert!(!host_allowed("example.com", &["*.example.com".to_owned()]));
        assert!(!host_allowed(
            "evil-example.com",
            &["*.example.com".to_owned()]
        ));
        assert!(host_allowed("example.com", &["example.com".to_owned()]));
    }

    #[test]
    fn test_network_missing_url_denied() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let mut scope = fs_scope(&["/tmp"]);
        scope.allow_network = true;
        scope.network_hosts_allowlist = Some(vec!["*".to_owned()]);
        let plan = plan_with(scope, vec![step("net.http", json!({"method": "GET"}))]);

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(
            decision.reason_codes,
            vec![ReasonCode::ScopeNetworkMissingUrl]
        );
    }

    #[test]
    fn test_network_unparseable_url_denied() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let mut scope = fs_scope(&["/tmp"]);
        scope.allow_network = true;
        scope.network_hosts_allowlist = Some(vec!["*".to_owned()]);
        let plan = plan_with(
            scope,
            vec![step("net.http", json!({"url": "not a url at all"}))],
        );

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(
            decision.reason_codes,
            vec![ReasonCode::ScopeNetworkInvalidUrl]
        );
    }

    #[test]
    fn test_empty_allowlist_entry_is_invalid_scope() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let mut scope = fs_scope(&["/tmp"]);
        scope.network_hosts_allowlist = Some(vec![String::new()]);
        let plan = plan_with(scope, vec![step("fs.list", json!({"path": "/tmp"}))]);

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(decision.reason_codes, vec![ReasonCode::ScopeInvalid]);
    }

    #[test]
    fn test_step_opting_out_of_dry_run_is_denied() {
        let registry = build_tool_registry().expect("registry");
        let engine = PolicyEngine::new(&registry);
        let mut s = step("fs.list", json!({"path": "/tmp"}));
        s.tool.dry_run_ok = Some(false);
        let plan = plan_with(fs_scope(&["/tmp"]), vec![s]);

        let decision = engine.evaluate(&test_ctx(), &plan);
        assert_eq!(
            decision.reason_codes,
            vec![ReasonCode::DryRunStepNotMarkedOk]
        );
    }

    #[test]
    fn test_reason_codes_serialize_as_dotted_strings() {
        let value = serde_json::to_value(ReasonCode::ScopeOutOfBounds).expect("serialize");
        assert_eq!(value, "scope.out_of_bounds");
        let value = serde_json::to_value(ReasonCode::DryRunNotSupported).expect("serialize");
        assert_eq!(value, "dry_run.not_supported");
    }
}
