//! Desktop tidy rules config: types, parsing, and validation.
//!
//! Users own a readable YAML (or JSON) file; the planner owns the
//! deterministic sorting engine built from it. The raw document is checked
//! against the plugin's rules schema before deserialization, then a
//! semantic pass enforces what the schema cannot express.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::kernel::planner::PlanError;
use crate::paths::expand_path;

/// The shipped rules schema for `builtin.desktop`.
pub const RULES_SCHEMA: &str = include_str!(
    "../../../contracts/plugins/builtin.desktop/schemas/desktop_rules.schema.json"
);

fn rules_validator() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let schema: Value =
            serde_json::from_str(RULES_SCHEMA).expect("embedded rules schema is valid JSON");
        jsonschema::validator_for(&schema).expect("embedded rules schema compiles")
    })
}

/// How the move operation reconciles an existing destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionStrategy {
    Error,
    Overwrite,
    Skip,
    #[default]
    SuffixIncrement,
}

impl CollisionStrategy {
    /// The wire string used in `fs.move` args.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Overwrite => "overwrite",
            Self::Skip => "skip",
            Self::SuffixIncrement => "suffix_increment",
        }
    }
}

/// The directory being tidied and where sorted entries land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    pub path: String,
    pub staging_dir: String,
}

/// One match atom. Exactly which field is set decides the check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchAtom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_within_days: Option<i64>,
}

/// A rule matches when its `any` list is empty or any atom matches, AND its
/// `all` list is empty or every atom matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<MatchAtom>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<MatchAtom>,
}

/// What to do with a matched entry.
///
/// `delete: true` never deletes anything; it routes the entry to the
/// `ToDelete/` quarantine subtree under the staging dir.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
}

/// One ordered sorting rule; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "match", default)]
    pub match_spec: MatchSpec,
    pub action: RuleAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedAction {
    pub move_to: String,
}

/// Fallback routing for entries no rule matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    pub unmatched_action: UnmatchedAction,
}

/// Safety knobs for the generated plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Safety {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_staging: Option<bool>,
    #[serde(default)]
    pub collision_strategy: CollisionStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_patterns: Vec<String>,
}

/// The full rules config for the `builtin.desktop` plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopRulesConfig {
    pub version: String,
    pub plugin: String,
    pub root: RootConfig,
    /// Folder key -> destination. A value starting with `/` or `~` is an
    /// expanded destination directory; anything else is a subpath under
    /// `root.staging_dir`.
    pub folders: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub defaults: Defaults,
    pub safety: Safety,
}

/// Load, schema-validate, and semantically validate a rules config.
pub fn load_rules_config(config_path: &str) -> Result<DesktopRulesConfig, PlanError> {
    let path = expand_path(config_path);
    if !path.exists() {
        return Err(PlanError::ConfigNotFound {
            path: config_path.to_owned(),
        });
    }
    let text = std::fs::read_to_string(&path).map_err(|e| PlanError::ConfigInvalidYaml {
        message: e.to_string(),
    })?;
    let raw: Value = serde_yaml::from_str(&text).map_err(|e| PlanError::ConfigInvalidYaml {
        message: e.to_string(),
    })?;
    if !raw.is_object() {
        return Err(PlanError::ConfigInvalid {
            message: "Config must be a mapping/object at top-level".to_owned(),
            data: None,
        });
    }

    let errors: Vec<String> = rules_validator()
        .iter_errors(&raw)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(PlanError::ConfigSchemaInvalid { errors });
    }

    let cfg: DesktopRulesConfig =
        serde_json::from_value(raw).map_err(|e| PlanError::ConfigInvalid {
            message: e.to_string(),
            data: None,
        })?;
    validate_semantics(&cfg)?;
    Ok(cfg)
}

/// Checks the schema cannot express: every `move_to` names a folders key.
fn validate_semantics(cfg: &DesktopRulesConfig) -> Result<(), PlanError> {
    for rule in &cfg.rules {
        if let Some(move_to) = &rule.action.move_to {
            if !cfg.folders.contains_key(move_to) {
                return Err(PlanError::ConfigInvalid {
                    message: format!(
                        "rule.action.move_to must reference a key in folders: {move_to}"
                    ),
                    data: Some(json!({"rule_id": rule.id, "move_to": move_to})),
                });
            }
        }
    }
    let unmatched = &cfg.defaults.unmatched_action.move_to;
    if !cfg.folders.contains_key(unmatched) {
        return Err(PlanError::ConfigInvalid {
            message: format!(
                "defaults.unmatched_action.move_to must reference a key in folders: {unmatched}"
            ),
            data: Some(json!({"move_to": unmatched})),
        });
    }
    Ok(())
}
