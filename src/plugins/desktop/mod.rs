//! Config-driven desktop tidy planner.
//!
//! Users own a readable config file; this module owns the deterministic
//! sorting engine that turns config + a directory snapshot into a Plan.
//! Execution always happens via deterministic tools from that Plan.
//!
//! Supported intents:
//! - `desktop.tidy.preview`: config + entries snapshot -> plan (dry-run friendly)
//! - `desktop.tidy.run`: same shape, meant for execution
//! - `desktop.tidy.restore`: config + staging walk snapshot -> plan moving
//!   files back to the root

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::kernel::planner::{PlanError, Planner, PlannerRegistry};
use crate::paths::{expand_path, normalize_roots};
use crate::types::{EffectSummary, Intent, Phase, Plan, Risk, RiskLevel, Step, ToolCall};

pub mod config;
pub mod rules;

use config::{load_rules_config, CollisionStrategy, DesktopRulesConfig};
use rules::{rule_matches, EntryParam, EntrySnapshot, SkipMatcher};

pub const INTENT_PREVIEW: &str = "desktop.tidy.preview";
pub const INTENT_RUN: &str = "desktop.tidy.run";
pub const INTENT_RESTORE: &str = "desktop.tidy.restore";

/// Subfolder receiving directories when `include_dirs` is set.
const FOLDERS_SUBDIR: &str = "Folders";

/// Quarantine subfolder for `delete: true` routes. Nothing is ever deleted.
const TO_DELETE_SUBDIR: &str = "ToDelete";

/// Typed view over `intent.params` for the tidy intents.
#[derive(Debug, Default, Deserialize)]
struct TidyParams {
    config_path: Option<String>,
    #[serde(default)]
    include_dirs: bool,
    #[serde(default)]
    exclude: Vec<String>,
    entries: Option<Vec<EntryParam>>,
    sorted_entries: Option<Vec<WalkEntry>>,
}

/// Shape of `fs.walk` output entries used by the restore intent.
#[derive(Debug, Clone, Deserialize)]
struct WalkEntry {
    path: String,
    #[serde(default)]
    is_file: bool,
}

/// The `builtin.desktop` planner.
#[derive(Debug, Default)]
pub struct DesktopTidyPlanner;

impl DesktopTidyPlanner {
    pub fn new() -> Self {
        Self
    }

    fn resolve_roots(
        &self,
        intent: &Intent,
        cfg: &DesktopRulesConfig,
    ) -> Result<(PathBuf, PathBuf, Vec<PathBuf>), PlanError> {
        let root_path = expand_path(&cfg.root.path);
        let staging_dir = expand_path(&cfg.root.staging_dir);
        let roots = normalize_roots(&intent.scope.fs_roots);
        if !roots.contains(&root_path) || !roots.contains(&staging_dir) {
            return Err(PlanError::ScopeInvalid {
                message: "scope.fs_roots must include both config.root.path and config.root.staging_dir"
                    .to_owned(),
                data: Some(json!({
                    "required": [
                        root_path.to_string_lossy(),
                        staging_dir.to_string_lossy(),
                    ],
                    "fs_roots": intent.scope.fs_roots,
                })),
            });
        }
        Ok((root_path, staging_dir, roots))
    }

    fn plan_tidy(
        &self,
        intent: &Intent,
        params: &TidyParams,
        preview: bool,
    ) -> Result<Plan, PlanError> {
        let config_path = required_config_path(params)?;
        let cfg = load_rules_config(config_path)?;
        let (root_path, staging_dir, roots) = self.resolve_roots(intent, &cfg)?;

        let mut steps = vec![
            Step {
                step_id: "staging_list_root".to_owned(),
                title: "List root directory (staging)".to_owned(),
                phase: Phase::Staging,
                tool: ToolCall {
                    tool_id: "fs.list".to_owned(),
                    args: json!({"path": root_path.to_string_lossy()}),
                    dry_run_ok: Some(true),
                },
                preconditions: Some(vec![format!("Scope includes {}", root_path.display())]),
                expected_effects: None,
                compensates_step_id: None,
            },
            mkdir_step(
                "commit_create_staging_dir".to_owned(),
                "Create staging_dir (commit)".to_owned(),
                &staging_dir,
            ),
        ];

        let (move_steps, dest_dirs) =
            self.build_moves(&cfg, params, &root_path, &staging_dir, &roots)?;

        for dir in &dest_dirs {
            let sanitized = dir.to_string_lossy().replace('/', "_");
            steps.push(mkdir_step(
                format!("commit_mkdir_{sanitized}"),
                format!("Create folder (commit): {}", dir.display()),
                dir,
            ));
        }

        let move_count = move_steps.len();
        steps.extend(move_steps);

        let summary = if move_count > 0 {
            format!(
                "Desktop tidy (config): {move_count} move step(s) planned into {}",
                staging_dir.display()
            )
        } else {
            "Desktop tidy (config): no entries provided".to_owned()
        };
        steps.push(notify_step("commit_notify".to_owned(), summary));

        debug!(
            intent_id = %intent.intent_id,
            moves = move_count,
            destinations = dest_dirs.len(),
            "desktop tidy plan built"
        );

        Ok(Plan {
            plan_id: if preview {
                "plan_desktop_tidy_preview_001".to_owned()
            } else {
                "plan_desktop_tidy_run_001".to_owned()
            },
            intent: intent.clone(),
            risk: Some(Risk {
                level: RiskLevel::Low,
                reasons: vec![
                    "Config-driven staging; no deletes; deterministic tools only.".to_owned(),
                ],
            }),
            steps,
        })
    }

    fn build_moves(
        &self,
        cfg: &DesktopRulesConfig,
        params: &TidyParams,
        root_path: &Path,
        staging_dir: &Path,
        roots: &[PathBuf],
    ) -> Result<(Vec<Step>, Vec<PathBuf>), PlanError> {
        let Some(entries) = &params.entries else {
            return Ok((Vec::new(), Vec::new()));
        };

        let skip = SkipMatcher::new(params.exclude.iter().chain(cfg.safety.ignore_patterns.iter()));
        let strategy = cfg.safety.collision_strategy;
        let now = Utc::now().timestamp();

        let mut move_steps = Vec::new();
        let mut dest_dirs = BTreeSet::new();

        // Step ordinals follow the snapshot positions, so a skipped entry
        // leaves a gap rather than renumbering everything after it.
        for (index, item) in entries.iter().enumerate() {
            let ordinal = index + 1;
            let entry = item.clone().into_snapshot();
            if entry.name.is_empty() || skip.should_skip(&entry.name) {
                continue;
            }
            if entry.is_dir && !params.include_dirs {
                continue;
            }
            if !entry.is_file && !entry.is_dir {
                continue;
            }

            let dest_dir = if entry.is_dir {
                staging_dir.join(FOLDERS_SUBDIR)
            } else {
                self.route_file(cfg, &entry, now, staging_dir, roots)?
            };
            dest_dirs.insert(dest_dir.clone());

            let src = root_path.join(&entry.name);
            let dst = dest_dir.join(&entry.name);
            let label = dest_label(&dest_dir, staging_dir);

            move_steps.push(Step {
                step_id: format!("commit_move_{ordinal:04}"),
                title: format!("Move: {} -> {label}", entry.name),
                phase: Phase::Commit,
                tool: ToolCall {
                    tool_id: "fs.move".to_owned(),
                    args: json!({
                        "from": src.to_string_lossy(),
                        "to": dst.to_string_lossy(),
                        "on_conflict": strategy.as_str(),
                    }),
                    dry_run_ok: Some(true),
                },
                preconditions: None,
                expected_effects: Some(vec![EffectSummary {
                    kind: "fs_move".to_owned(),
                    summary: format!(
                        "Move {} -> {label} (on_conflict={})",
                        entry.name,
                        strategy.as_str()
                    ),
                    resources: vec![
                        src.to_string_lossy().into_owned(),
                        dst.to_string_lossy().into_owned(),
                    ],
                }]),
                compensates_step_id: None,
            });
        }

        Ok((move_steps, dest_dirs.into_iter().collect()))
    }

    /// First matching rule decides; `delete` routes to quarantine, `move_to`
    /// through the folders map, otherwise the configured default applies.
    fn route_file(
        &self,
        cfg: &DesktopRulesConfig,
        entry: &EntrySnapshot,
        now: i64,
        staging_dir: &Path,
        roots: &[PathBuf],
    ) -> Result<PathBuf, PlanError> {
        for rule in &cfg.rules {
            if !rule_matches(rule, entry, now) {
                continue;
            }
            if rule.action.delete == Some(true) {
                return Ok(staging_dir.join(TO_DELETE_SUBDIR));
            }
            if let Some(key) = &rule.action.move_to {
                return resolve_folder(cfg, key, Some(&rule.id), staging_dir, roots);
            }
            break;
        }
        let key = &cfg.defaults.unmatched_action.move_to;
        resolve_folder(cfg, key, None, staging_dir, roots)
    }

    fn plan_restore(&self, intent: &Intent, params: &TidyParams) -> Result<Plan, PlanError> {
        let config_path = required_config_path(params)?;
        let cfg = load_rules_config(config_path)?;
        let (root_path, staging_dir, _roots) = self.resolve_roots(intent, &cfg)?;
        let strategy = cfg.safety.collision_strategy;

        let mut steps = vec![notify_step(
            "commit_notify_restore".to_owned(),
            format!("Desktop restore (config): root={}", root_path.display()),
        )];

        steps.extend(self.build_restore_moves(params, &root_path, &staging_dir, strategy));

        Ok(Plan {
            plan_id: "plan_desktop_tidy_restore_001".to_owned(),
            intent: intent.clone(),
            risk: Some(Risk {
                level: RiskLevel::Low,
                reasons: vec!["Config-driven restore (no deletes).".to_owned()],
            }),
            steps,
        })
    }

    fn build_restore_moves(
        &self,
        params: &TidyParams,
        root_path: &Path,
        staging_dir: &Path,
        strategy: CollisionStrategy,
    ) -> Vec<Step> {
        let Some(sorted_entries) = &params.sorted_entries else {
            return Vec::new();
        };
        let skip = SkipMatcher::new(params.exclude.iter());

        let mut files: Vec<&WalkEntry> = sorted_entries
            .iter()
            .filter(|e| e.is_file && !e.path.is_empty())
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut steps = Vec::new();
        for (index, entry) in files.iter().enumerate() {
            let ordinal = index + 1;
            let base = entry
                .path
                .rsplit('/')
                .next()
                .unwrap_or(entry.path.as_str());
            if skip.should_skip(base) {
                continue;
            }
            let src = staging_dir.join(&entry.path);
            let dst = root_path.join(base);
            steps.push(Step {
                step_id: format!("commit_restore_{ordinal:04}"),
                title: format!("Restore: {base}"),
                phase: Phase::Commit,
                tool: ToolCall {
                    tool_id: "fs.move".to_owned(),
                    args: json!({
                        "from": src.to_string_lossy(),
                        "to": dst.to_string_lossy(),
                        "on_conflict": strategy.as_str(),
                    }),
                    dry_run_ok: Some(true),
                },
                preconditions: None,
                expected_effects: Some(vec![EffectSummary {
                    kind: "fs_move".to_owned(),
                    summary: format!("Restore {base} (on_conflict={})", strategy.as_str()),
                    resources: vec![
                        src.to_string_lossy().into_owned(),
                        dst.to_string_lossy().into_owned(),
                    ],
                }]),
                compensates_step_id: None,
            });
        }
        steps
    }
}

impl Planner for DesktopTidyPlanner {
    fn plan(&self, intent: &Intent) -> Result<Plan, PlanError> {
        if intent.intent_id.is_empty() {
            return Err(PlanError::IntentInvalid {
                message: "Missing or invalid intent_id".to_owned(),
            });
        }
        if intent.scope.fs_roots.is_empty() {
            return Err(PlanError::ScopeMissing {
                message: "scope.fs_roots must be a non-empty array".to_owned(),
            });
        }
        let params: TidyParams =
            serde_json::from_value(intent.params.clone()).map_err(|e| PlanError::IntentInvalid {
                message: format!("invalid params: {e}"),
            })?;

        match intent.intent_id.as_str() {
            INTENT_PREVIEW => self.plan_tidy(intent, &params, true),
            INTENT_RUN => self.plan_tidy(intent, &params, false),
            INTENT_RESTORE => self.plan_restore(intent, &params),
            other => Err(PlanError::IntentUnknown {
                intent_id: other.to_owned(),
            }),
        }
    }
}

/// Register the desktop planner for every intent it serves.
pub fn register_planners(registry: &mut PlannerRegistry) {
    let planner: Arc<dyn Planner> = Arc::new(DesktopTidyPlanner::new());
    for intent_id in [INTENT_PREVIEW, INTENT_RUN, INTENT_RESTORE] {
        registry.register(intent_id, planner.clone());
    }
}

fn required_config_path(params: &TidyParams) -> Result<&str, PlanError> {
    params
        .config_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PlanError::IntentInvalid {
            message: "params.config_path is required".to_owned(),
        })
}

/// Folder destination: absolute and `~` values become expanded directories
/// (which must stay inside the declared scope); anything else is a subpath
/// under the staging dir.
fn resolve_folder(
    cfg: &DesktopRulesConfig,
    key: &str,
    rule_id: Option<&str>,
    staging_dir: &Path,
    roots: &[PathBuf],
) -> Result<PathBuf, PlanError> {
    let value = cfg
        .folders
        .get(key)
        .ok_or_else(|| PlanError::ConfigInvalid {
            message: format!("action.move_to must reference a key in folders: {key}"),
            data: Some(json!({"rule_id": rule_id, "move_to": key})),
        })?;

    if value.starts_with('/') || value.starts_with('~') {
        let dir = expand_path(value);
        if !roots.iter().any(|root| dir.starts_with(root)) {
            return Err(PlanError::ConfigInvalid {
                message: format!("folder destination is outside the declared scope: {value}"),
                data: Some(json!({
                    "rule_id": rule_id,
                    "folder": key,
                    "resolved": dir.to_string_lossy(),
                })),
            });
        }
        return Ok(dir);
    }

    let sub = validate_dest_subpath(value, rule_id)?;
    Ok(staging_dir.join(sub))
}

/// A relative destination must be a plain subpath: non-empty, not absolute,
/// no `.` or `..` segments.
fn validate_dest_subpath(dest_sub: &str, rule_id: Option<&str>) -> Result<String, PlanError> {
    let norm = dest_sub.replace('\\', "/");
    let parts: Vec<&str> = norm.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return Err(PlanError::ConfigInvalid {
            message: "folder value must resolve to a non-empty subpath under staging_dir"
                .to_owned(),
            data: Some(json!({"rule_id": rule_id, "value": dest_sub})),
        });
    }
    if norm.starts_with('/') || parts.iter().any(|p| *p == "." || *p == "..") {
        return Err(PlanError::ConfigInvalid {
            message: "folder value must not be absolute or contain '.'/'..' path segments"
                .to_owned(),
            data: Some(json!({"rule_id": rule_id, "value": dest_sub})),
        });
    }
    Ok(parts.join("/"))
}

fn mkdir_step(step_id: String, title: String, dir: &Path) -> Step {
    Step {
        step_id,
        title,
        phase: Phase::Commit,
        tool: ToolCall {
            tool_id: "fs.mkdir".to_owned(),
            args: json!({
                "path": dir.to_string_lossy(),
                "parents": true,
                "exist_ok": true,
            }),
            dry_run_ok: Some(true),
        },
        preconditions: None,
        expected_effects: Some(vec![EffectSummary {
            kind: "fs_mkdir".to_owned(),
            summary: format!("Create {} if missing", dir.display()),
            resources: vec![dir.to_string_lossy().into_owned()],
        }]),
        compensates_step_id: None,
    }
}

fn notify_step(step_id: String, message: String) -> Step {
    Step {
        step_id,
        title: "Notify summary (commit)".to_owned(),
        phase: Phase::Commit,
        tool: ToolCall {
            tool_id: "notify.send".to_owned(),
            args: json!({"message": message}),
            dry_run_ok: Some(true),
        },
        preconditions: None,
        expected_effects: None,
        compensates_step_id: None,
    }
}

/// Human-readable destination label: staging-relative when possible.
fn dest_label(dest_dir: &Path, staging_dir: &Path) -> String {
    dest_dir
        .strip_prefix(staging_dir)
        .map(|rel| rel.to_string_lossy().into_owned())
        .unwrap_or_else(|_| dest_dir.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scope;
    use serde_json::Value;
    use std::path::Path;

    fn write_config(dir: &Path, text: &str) -> String {
        let path = dir.join("desktop_rules.yml");
        std::fs::write(&path, text).expect("write config");
        path.to_string_lossy().into_owned()
    }

    fn relative_folders_config(root: &Path, staging: &Path) -> String {
        format!(
            concat!(
                "version: \"0.1\"\n",
                "plugin: \"builtin.desktop\"\n",
                "root:\n",
                "  path: \"{root}\"\n",
                "  staging_dir: \"{staging}\"\n",
                "folders:\n",
                "  images: \"Images\"\n",
                "  misc: \"Misc\"\n",
                "rules:\n",
                "  - id: \"r_images\"\n",
                "    match:\n",
                "      any:\n",
                "        - ext_in: [\"jpg\"]\n",
                "    action:\n",
                "      move_to: \"images\"\n",
                "  - id: \"r_tmp\"\n",
                "    match:\n",
                "      any:\n",
                "        - ext_in: [\"tmp\"]\n",
                "    action:\n",
                "      delete: true\n",
                "defaults:\n",
                "  unmatched_action:\n",
                "    move_to: \"misc\"\n",
                "safety:\n",
                "  collision_strategy: \"suffix_increment\"\n",
                "  ignore_patterns: [\".DS_Store\"]\n",
            ),
            root = root.display(),
            staging = staging.display(),
        )
    }

    fn intent(intent_id: &str, params: Value, roots: Vec<String>) -> Intent {
        Intent {
            intent_id: intent_id.to_owned(),
            params,
            scope: Scope {
                fs_roots: roots,
                allow_network: false,
                network_hosts_allowlist: None,
            },
            context: json!({"source": "test"}),
        }
    }

    fn move_steps(plan: &Plan) -> Vec<&Step> {
        plan.steps
            .iter()
            .filter(|s| s.tool.tool_id == "fs.move")
            .collect()
    }

    #[test]
    fn test_preview_routes_by_rules_and_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let now = Utc::now().timestamp();
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({
                    "config_path": cfg_path,
                    "entries": [
                        {"name": "pic.jpg", "is_file": true, "is_dir": false, "mtime": now},
                        {"name": "a.tmp", "is_file": true, "is_dir": false, "mtime": now},
                        {"name": "note.bin", "is_file": true, "is_dir": false, "mtime": now},
                    ],
                }),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        assert_eq!(plan.plan_id, "plan_desktop_tidy_preview_001");
        let moves = move_steps(&plan);
        assert_eq!(moves.len(), 3);

        // Moves keep snapshot order: rule route, quarantine route, default.
        let tos: Vec<&str> = moves
            .iter()
            .map(|s| s.tool.args["to"].as_str().expect("to"))
            .collect();
        assert_eq!(
            tos,
            vec![
                staging.join("Images").join("pic.jpg").to_string_lossy().into_owned(),
                staging.join("ToDelete").join("a.tmp").to_string_lossy().into_owned(),
                staging.join("Misc").join("note.bin").to_string_lossy().into_owned(),
            ]
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
        );

        for step in &moves {
            assert_eq!(step.tool.args["on_conflict"], "suffix_increment");
        }
    }

    #[test]
    fn test_absolute_folder_destinations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Staging");
        let pictures = dir.path().join("Pictures");
        let downloads = dir.path().join("Downloads");
        std::fs::create_dir_all(&root).expect("root");

        let cfg_text = format!(
            concat!(
                "version: \"0.1\"\n",
                "plugin: \"builtin.desktop\"\n",
                "root:\n",
                "  path: \"{root}\"\n",
                "  staging_dir: \"{staging}\"\n",
                "folders:\n",
                "  images: \"{pictures}\"\n",
                "  downloads: \"{downloads}\"\n",
                "rules:\n",
                "  - id: \"r_jpg\"\n",
                "    match:\n",
                "      any:\n",
                "        - ext_in: [\"jpg\"]\n",
                "    action:\n",
                "      move_to: \"images\"\n",
                "  - id: \"r_tmp\"\n",
                "    match:\n",
                "      any:\n",
                "        - ext_in: [\"tmp\"]\n",
                "    action:\n",
                "      delete: true\n",
                "defaults:\n",
                "  unmatched_action:\n",
                "    move_to: \"downloads\"\n",
                "safety:\n",
                "  collision_strategy: \"suffix_increment\"\n",
                "  ignore_patterns: []\n",
            ),
            root = root.display(),
            staging = staging.display(),
            pictures = pictures.display(),
            downloads = downloads.display(),
        );
        let cfg_path = write_config(dir.path(), &cfg_text);

        let planner = DesktopTidyPlanner::new();
        let err = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({
                    "config_path": cfg_path.clone(),
                    "entries": ["pic.jpg", "a.tmp", "note.bin"],
                }),
                vec![dir.path().to_string_lossy().into_owned()],
            ))
            .expect_err("scope must include root and staging");
        assert!(matches!(err, PlanError::ScopeInvalid { .. }));

        // With the scope declaring every destination, routing succeeds.
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({
                    "config_path": cfg_path,
                    "entries": ["pic.jpg", "a.tmp", "note.bin"],
                }),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                    pictures.to_string_lossy().into_owned(),
                    downloads.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        let tos: Vec<&str> = move_steps(&plan)
            .iter()
            .map(|s| s.tool.args["to"].as_str().expect("to"))
            .collect();
        assert_eq!(
            tos,
            vec![
                pictures.join("pic.jpg").to_string_lossy().into_owned(),
                staging.join("ToDelete").join("a.tmp").to_string_lossy().into_owned(),
                downloads.join("note.bin").to_string_lossy().into_owned(),
            ]
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_absolute_destination_outside_scope_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Staging");
        std::fs::create_dir_all(&root).expect("root");

        let cfg_text = format!(
            concat!(
                "version: \"0.1\"\n",
                "plugin: \"builtin.desktop\"\n",
                "root:\n",
                "  path: \"{root}\"\n",
                "  staging_dir: \"{staging}\"\n",
                "folders:\n",
                "  outside: \"/etc/landing\"\n",
                "defaults:\n",
                "  unmatched_action:\n",
                "    move_to: \"outside\"\n",
                "rules: []\n",
                "safety: {{}}\n",
            ),
            root = root.display(),
            staging = staging.display(),
        );
        let cfg_path = write_config(dir.path(), &cfg_text);

        let planner = DesktopTidyPlanner::new();
        let result = planner.plan(&intent(
            INTENT_PREVIEW,
            json!({"config_path": cfg_path, "entries": ["note.bin"]}),
            vec![
                root.to_string_lossy().into_owned(),
                staging.to_string_lossy().into_owned(),
            ],
        ));
        match result {
            Err(PlanError::ConfigInvalid { message, .. }) => {
                assert!(message.contains("outside the declared scope"));
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_skips_hidden_excluded_and_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({
                    "config_path": cfg_path,
                    "exclude": ["keepme.txt"],
                    "entries": [
                        {"name": ".DS_Store", "is_file": true, "is_dir": false},
                        {"name": ".hidden", "is_file": true, "is_dir": false},
                        {"name": "keepme.txt", "is_file": true, "is_dir": false},
                        {"name": "note.bin", "is_file": true, "is_dir": false},
                    ],
                }),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        let moves = move_steps(&plan);
        assert_eq!(moves.len(), 1);
        // Ordinals track snapshot positions, so the surviving fourth entry
        // keeps its position number.
        assert_eq!(moves[0].step_id, "commit_move_0004");
        assert!(moves[0].tool.args["from"]
            .as_str()
            .expect("from")
            .ends_with("note.bin"));
    }

    #[test]
    fn test_directories_route_to_folders_when_included() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let entries = json!([
            {"name": "projects", "is_file": false, "is_dir": true},
        ]);

        // Excluded by default.
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({"config_path": cfg_path.clone(), "entries": entries.clone()}),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");
        assert!(move_steps(&plan).is_empty());

        // Included: routed into the Folders subtree.
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({"config_path": cfg_path, "entries": entries, "include_dirs": true}),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");
        let moves = move_steps(&plan);
        assert_eq!(moves.len(), 1);
        assert_eq!(
            moves[0].tool.args["to"].as_str().expect("to"),
            staging.join("Folders").join("projects").to_string_lossy()
        );
    }

    #[test]
    fn test_mkdir_steps_cover_every_destination_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({
                    "config_path": cfg_path,
                    "entries": ["note.bin", "pic.jpg"],
                }),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        let mkdir_paths: Vec<&str> = plan
            .steps
            .iter()
            .filter(|s| s.tool.tool_id == "fs.mkdir")
            .map(|s| s.tool.args["path"].as_str().expect("path"))
            .collect();
        // Staging dir first, then unique destinations in sorted order.
        assert_eq!(mkdir_paths.len(), 3);
        assert_eq!(mkdir_paths[0], staging.to_string_lossy());
        let mut sorted = mkdir_paths[1..].to_vec();
        sorted.sort_unstable();
        assert_eq!(mkdir_paths[1..], sorted[..]);
    }

    #[test]
    fn test_plan_structure_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let plan = planner
            .plan(&intent(
                INTENT_RUN,
                json!({"config_path": cfg_path, "entries": ["pic.jpg"]}),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        assert_eq!(plan.plan_id, "plan_desktop_tidy_run_001");
        assert_eq!(plan.steps[0].step_id, "staging_list_root");
        assert_eq!(plan.steps[0].phase, Phase::Staging);
        assert_eq!(plan.steps[1].step_id, "commit_create_staging_dir");

        let last = plan.steps.last().expect("steps");
        assert_eq!(last.tool.tool_id, "notify.send");
        assert!(last.tool.args["message"]
            .as_str()
            .expect("message")
            .contains("1 move step(s)"));

        // The plan's intent carries the declared scope unchanged.
        assert_eq!(
            plan.intent.scope.fs_roots,
            vec![
                root.to_string_lossy().into_owned(),
                staging.to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn test_no_entries_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let plan = planner
            .plan(&intent(
                INTENT_PREVIEW,
                json!({"config_path": cfg_path}),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        let last = plan.steps.last().expect("steps");
        assert_eq!(
            last.tool.args["message"].as_str().expect("message"),
            "Desktop tidy (config): no entries provided"
        );
    }

    #[test]
    fn test_missing_config_path_is_invalid_intent() {
        let planner = DesktopTidyPlanner::new();
        let result = planner.plan(&intent(
            INTENT_PREVIEW,
            json!({}),
            vec!["/tmp".to_owned()],
        ));
        assert!(matches!(result, Err(PlanError::IntentInvalid { .. })));
    }

    #[test]
    fn test_unknown_intent_id() {
        let planner = DesktopTidyPlanner::new();
        let result = planner.plan(&intent(
            "desktop.tidy.shuffle",
            json!({"config_path": "/tmp/x.yml"}),
            vec!["/tmp".to_owned()],
        ));
        assert!(matches!(result, Err(PlanError::IntentUnknown { .. })));
    }

    #[test]
    fn test_restore_moves_files_back_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("Desktop");
        let staging = dir.path().join("Desktop_Staging");
        std::fs::create_dir_all(&root).expect("root");
        let cfg_path = write_config(dir.path(), &relative_folders_config(&root, &staging));

        let planner = DesktopTidyPlanner::new();
        let plan = planner
            .plan(&intent(
                INTENT_RESTORE,
                json!({
                    "config_path": cfg_path,
                    "sorted_entries": [
                        {"path": "Misc/note.bin", "is_file": true, "is_dir": false},
                        {"path": "Images/pic.jpg", "is_file": true, "is_dir": false},
                        {"path": "Images", "is_file": false, "is_dir": true},
                    ],
                }),
                vec![
                    root.to_string_lossy().into_owned(),
                    staging.to_string_lossy().into_owned(),
                ],
            ))
            .expect("plan");

        assert_eq!(plan.plan_id, "plan_desktop_tidy_restore_001");
        assert_eq!(plan.steps[0].tool.tool_id, "notify.send");

        let moves = move_steps(&plan);
        assert_eq!(moves.len(), 2);
        // Sorted by staging-relative path.
        assert_eq!(
            moves[0].tool.args["from"].as_str().expect("from"),
            staging.join("Images/pic.jpg").to_string_lossy()
        );
        assert_eq!(
            moves[0].tool.args["to"].as_str().expect("to"),
            root.join("pic.jpg").to_string_lossy()
        );
        assert_eq!(
            moves[1].tool.args["to"].as_str().expect("to"),
            root.join("note.bin").to_string_lossy()
        );
    }

    #[test]
    fn test_registered_planners_cover_all_intents() {
        let mut registry = PlannerRegistry::new();
        register_planners(&mut registry);
        assert_eq!(
            registry.list_intents(),
            vec![INTENT_PREVIEW, INTENT_RESTORE, INTENT_RUN]
        );
    }
}
