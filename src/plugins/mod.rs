//! Plugin registry: manifest loading and intent routing.
//!
//! Manifests live at `<plugins_dir>/<plugin>/manifest.json` and must
//! validate against the core `plugin_manifest.schema.json`. Both
//! `plugin_id` and every declared `intent_id` must be unique across the
//! loaded set.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::contracts::{ContractError, ContractStore};

pub mod desktop;

/// One intent declared by a plugin manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestIntent {
    pub intent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A validated plugin manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub plugin_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub intents: Vec<ManifestIntent>,
}

impl PluginManifest {
    /// Does this manifest declare the given intent?
    pub fn declares_intent(&self, intent_id: &str) -> bool {
        self.intents.iter().any(|i| i.intent_id == intent_id)
    }
}

/// Plugin loading and routing failures.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugins directory does not exist.
    #[error("plugins directory not found: {0}")]
    DirMissing(PathBuf),
    /// A manifest failed schema validation.
    #[error("plugin manifest validation failed: {path}")]
    ManifestInvalid { path: PathBuf, errors: Vec<String> },
    /// Two plugins share a `plugin_id`.
    #[error("duplicate plugin_id: {plugin_id}")]
    ManifestDuplicate { plugin_id: String },
    /// Two plugins declare the same `intent_id`.
    #[error("duplicate intent_id across plugins: {intent_id}")]
    IntentDuplicate { intent_id: String },
    /// No plugin declares this intent.
    #[error("unknown intent_id: {intent_id}")]
    IntentUnknown { intent_id: String },
    /// Filesystem failure while reading manifests.
    #[error("plugin i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A manifest is not valid JSON.
    #[error("plugin manifest json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Contract store failure during manifest validation.
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl PluginError {
    /// The stable dotted code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DirMissing(_) | Self::Io(_) => "plugin_manifest.invalid",
            Self::ManifestInvalid { .. } | Self::Json(_) => "plugin_manifest.invalid",
            Self::ManifestDuplicate { .. } => "plugin_manifest.duplicate",
            Self::IntentDuplicate { .. } => "intent.duplicate",
            Self::IntentUnknown { .. } => "intent.unknown",
            Self::Contract(_) => "plugin_manifest.invalid",
        }
    }
}

/// Loads `*/manifest.json` beneath a directory and indexes intent routing.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    manifests: BTreeMap<String, PluginManifest>,
    by_intent: HashMap<String, String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate every manifest under `plugins_dir`.
    pub fn load_from_dir(
        &mut self,
        plugins_dir: impl AsRef<Path>,
        contracts: &ContractStore,
    ) -> Result<(), PluginError> {
        let dir = plugins_dir.as_ref();
        if !dir.exists() {
            return Err(PluginError::DirMissing(dir.to_path_buf()));
        }

        let mut manifest_paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .map(|p| p.join("manifest.json"))
            .filter(|p| p.is_file())
            .collect();
        manifest_paths.sort();

        let mut loaded = Vec::new();
        for path in manifest_paths {
            let text = std::fs::read_to_string(&path)?;
            let raw: serde_json::Value = serde_json::from_str(&text)?;
            let errors = contracts.validate("plugin_manifest.schema.json", &raw)?;
            if !errors.is_empty() {
                return Err(PluginError::ManifestInvalid { path, errors });
            }
            let manifest: PluginManifest = serde_json::from_value(raw)?;
            debug!(plugin_id = %manifest.plugin_id, path = %path.display(), "plugin manifest loaded");
            loaded.push(manifest);
        }

        for manifest in &loaded {
            if self.manifests.contains_key(&manifest.plugin_id) {
                return Err(PluginError::ManifestDuplicate {
                    plugin_id: manifest.plugin_id.clone(),
                });
            }
            self.manifests
                .insert(manifest.plugin_id.clone(), manifest.clone());
        }

        for manifest in &loaded {
            for intent in &manifest.intents {
                if self.by_intent.contains_key(&intent.intent_id) {
                    return Err(PluginError::IntentDuplicate {
                        intent_id: intent.intent_id.clone(),
                    });
                }
                self.by_intent
                    .insert(intent.intent_id.clone(), manifest.plugin_id.clone());
            }
        }

        Ok(())
    }

    /// Manifests sorted by `plugin_id`.
    pub fn list_manifests(&self) -> Vec<&PluginManifest> {
        self.manifests.values().collect()
    }

    /// `(intent_id, plugin_id)` pairs sorted by intent id.
    pub fn list_intents(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .by_intent
            .iter()
            .map(|(intent, plugin)| (intent.clone(), plugin.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Plugin declaring this intent, if any.
    pub fn resolve(&self, intent_id: &str) -> Option<&str> {
        self.by_intent.get(intent_id).map(String::as_str)
    }

    /// Manifest for a plugin id.
    pub fn get_manifest(&self, plugin_id: &str) -> Option<&PluginManifest> {
        self.manifests.get(plugin_id)
    }

    /// Like [`Self::resolve`], but an unknown intent is an error.
    pub fn require(&self, intent_id: &str) -> Result<&str, PluginError> {
        self.resolve(intent_id)
            .ok_or_else(|| PluginError::IntentUnknown {
                intent_id: intent_id.to_owned(),
            })
    }
}
