//! Discovery and validation of plugin contract examples.
//!
//! Layout convention under `contracts/plugins/<plugin_id>/`:
//! `schemas/<base>.schema.json` paired with
//! `examples/<base>.example.(yml|yaml|json)`, first extension wins.

use std::path::{Path, PathBuf};

use serde_json::Value;

/// One failed (schema, example) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginExampleFailure {
    pub plugin_id: String,
    pub schema_path: PathBuf,
    pub example_path: PathBuf,
    pub error: String,
}

fn candidate_example_paths(examples_dir: &Path, base: &str) -> [PathBuf; 3] {
    [
        examples_dir.join(format!("{base}.example.yml")),
        examples_dir.join(format!("{base}.example.yaml")),
        examples_dir.join(format!("{base}.example.json")),
    ]
}

fn read_instance(path: &Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "yml" | "yaml" => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(&text).map_err(|e| e.to_string()),
        other => Err(format!("unsupported example extension: {other}")),
    }
}

/// Discover `(plugin_id, schema_path, example_path)` pairs.
///
/// Plugins without a matching example file are skipped; a missing top-level
/// directory yields no pairs.
pub fn discover_plugin_contract_pairs(
    contracts_plugins_dir: &Path,
) -> Vec<(String, PathBuf, PathBuf)> {
    let mut pairs = Vec::new();
    let Ok(entries) = std::fs::read_dir(contracts_plugins_dir) else {
        return pairs;
    };

    let mut plugin_dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    plugin_dirs.sort();

    for plugin_dir in plugin_dirs {
        let plugin_id = plugin_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_owned();
        let schemas_dir = plugin_dir.join("schemas");
        let examples_dir = plugin_dir.join("examples");
        let Ok(schema_entries) = std::fs::read_dir(&schemas_dir) else {
            continue;
        };

        let mut schema_paths: Vec<PathBuf> = schema_entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".schema.json"))
            })
            .collect();
        schema_paths.sort();

        for schema_path in schema_paths {
            let name = schema_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let base = name.trim_end_matches(".schema.json");
            let example = candidate_example_paths(&examples_dir, base)
                .into_iter()
                .find(|p| p.exists());
            if let Some(example_path) = example {
                pairs.push((plugin_id.clone(), schema_path, example_path));
            }
        }
    }

    pairs
}

/// Validate every discovered pair. Empty result means all examples pass.
pub fn validate_plugin_contract_examples(
    contracts_plugins_dir: &Path,
) -> Vec<PluginExampleFailure> {
    let mut failures = Vec::new();
    for (plugin_id, schema_path, example_path) in
        discover_plugin_contract_pairs(contracts_plugins_dir)
    {
        if let Err(error) = validate_pair(&schema_path, &example_path) {
            failures.push(PluginExampleFailure {
                plugin_id,
                schema_path,
                example_path,
                error,
            });
        }
    }
    failures
}

fn validate_pair(schema_path: &Path, example_path: &Path) -> Result<(), String> {
    let schema_text = std::fs::read_to_string(schema_path).map_err(|e| e.to_string())?;
    let schema: Value = serde_json::from_str(&schema_text).map_err(|e| e.to_string())?;
    let validator = jsonschema::validator_for(&schema).map_err(|e| e.to_string())?;
    let instance = read_instance(example_path)?;
    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| e.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
