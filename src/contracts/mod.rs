//! Contract store: JSON-Schema loading and instance validation.
//!
//! Schemas are loaded once (from a directory or the embedded core set) and
//! compiled eagerly. Cross-file `$ref`s resolve through an in-memory
//! resource registry keyed by a synthetic `file:///contracts/<name>` URI per
//! filename and by each schema's `$id`; nothing is ever fetched over the
//! network.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use jsonschema::{Resource, Validator};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod plugin_examples;

/// The core schema set shipped with the crate.
pub const CORE_SCHEMA_FILES: [(&str, &str); 5] = [
    (
        "defs.schema.json",
        include_str!("../../contracts/core/schemas/defs.schema.json"),
    ),
    (
        "intent.schema.json",
        include_str!("../../contracts/core/schemas/intent.schema.json"),
    ),
    (
        "plan.schema.json",
        include_str!("../../contracts/core/schemas/plan.schema.json"),
    ),
    (
        "plugin_manifest.schema.json",
        include_str!("../../contracts/core/schemas/plugin_manifest.schema.json"),
    ),
    (
        "trace_event.schema.json",
        include_str!("../../contracts/core/schemas/trace_event.schema.json"),
    ),
];

/// Contract store failures.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The schemas directory does not exist.
    #[error("schemas directory not found: {0}")]
    SchemasDirMissing(PathBuf),
    /// `defs.schema.json` must always be present.
    #[error("required schema missing: {0}")]
    RequiredSchemaMissing(String),
    /// Lookup by a name or `$id` the store does not know.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    /// A schema failed to compile.
    #[error("schema {name} failed to compile: {message}")]
    SchemaCompile { name: String, message: String },
    /// Filesystem failure while reading schemas or instances.
    #[error("contract i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A schema or instance file is not valid JSON.
    #[error("contract json error: {0}")]
    Json(#[from] serde_json::Error),
}

struct SchemaEntry {
    schema: Value,
    validator: Option<Validator>,
    compile_error: Option<String>,
}

/// Read-only registry of compiled contract schemas.
///
/// Loaded once by the host and passed by reference; there is no global
/// cache.
pub struct ContractStore {
    schemas_dir: Option<PathBuf>,
    entries: BTreeMap<String, SchemaEntry>,
    id_index: HashMap<String, String>,
}

impl std::fmt::Debug for ContractStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractStore")
            .field("schemas_dir", &self.schemas_dir)
            .field("schema_count", &self.entries.len())
            .finish()
    }
}

impl ContractStore {
    /// Load the embedded core schema set.
    pub fn builtin() -> Result<Self, ContractError> {
        let mut raw = Vec::new();
        for (name, text) in CORE_SCHEMA_FILES {
            raw.push((name.to_owned(), serde_json::from_str(text)?));
        }
        Self::from_schemas(raw, None)
    }

    /// Load every `*.schema.json` from a directory.
    pub fn load_dir(schemas_dir: impl AsRef<Path>) -> Result<Self, ContractError> {
        let dir = schemas_dir.as_ref();
        if !dir.is_dir() {
            return Err(ContractError::SchemasDirMissing(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".schema.json"))
            })
            .collect();
        paths.sort();

        let mut raw = Vec::new();
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_owned();
            let text = std::fs::read_to_string(&path)?;
            raw.push((name, serde_json::from_str(&text)?));
        }
        Self::from_schemas(raw, Some(dir.to_path_buf()))
    }

    fn from_schemas(
        mut raw: Vec<(String, Value)>,
        schemas_dir: Option<PathBuf>,
    ) -> Result<Self, ContractError> {
        if !raw.iter().any(|(name, _)| name == "defs.schema.json") {
            return Err(ContractError::RequiredSchemaMissing(
                "defs.schema.json".to_owned(),
            ));
        }

        // Inject a synthetic $id when a schema declares none, so relative
        // $refs have a base to resolve against.
        for (name, schema) in &mut raw {
            let has_id = schema.get("$id").and_then(Value::as_str).is_some();
            if !has_id {
                if let Some(obj) = schema.as_object_mut() {
                    obj.insert(
                        "$id".to_owned(),
                        Value::String(format!("file:///contracts/{name}")),
                    );
                }
            }
        }

        let mut resources: Vec<(String, Value)> = Vec::new();
        let mut id_index = HashMap::new();
        for (name, schema) in &raw {
            resources.push((format!("file:///contracts/{name}"), schema.clone()));
            if let Some(id) = schema.get("$id").and_then(Value::as_str) {
                resources.push((id.to_owned(), schema.clone()));
                id_index.insert(id.to_owned(), name.clone());
            }
        }

        let mut entries = BTreeMap::new();
        for (name, schema) in raw {
            let (validator, compile_error) = match compile_with_resources(&schema, &resources) {
                Ok(validator) => (Some(validator), None),
                Err(message) => (None, Some(message)),
            };
            debug!(schema = %name, ok = compile_error.is_none(), "contract schema loaded");
            entries.insert(
                name,
                SchemaEntry {
                    schema,
                    validator,
                    compile_error,
                },
            );
        }

        Ok(Self {
            schemas_dir,
            entries,
            id_index,
        })
    }

    /// Directory the schemas were loaded from, when loaded from disk.
    pub fn schemas_dir(&self) -> Option<&Path> {
        self.schemas_dir.as_deref()
    }

    /// Sorted schema filenames.
    pub fn schema_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Raw schema JSON, looked up by filename or `$id`.
    pub fn schema_json(&self, schema_name: &str) -> Result<&Value, ContractError> {
        self.entry(schema_name).map(|e| &e.schema)
    }

    fn entry(&self, schema_name: &str) -> Result<&SchemaEntry, ContractError> {
        if let Some(entry) = self.entries.get(schema_name) {
            return Ok(entry);
        }
        if let Some(name) = self.id_index.get(schema_name) {
            if let Some(entry) = self.entries.get(name) {
                return Ok(entry);
            }
        }
        Err(ContractError::UnknownSchema(schema_name.to_owned()))
    }

    /// Compile failures across the loaded set, as `(schema_name, message)`.
    ///
    /// Empty means every schema is itself valid.
    pub fn check_schemas(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .compile_error
                    .as_ref()
                    .map(|message| (name.clone(), message.clone()))
            })
            .collect()
    }

    /// Validate an instance; returns human-readable errors, empty = valid.
    pub fn validate(&self, schema_name: &str, instance: &Value) -> Result<Vec<String>, ContractError> {
        let entry = self.entry(schema_name)?;
        let validator = entry.validator.as_ref().ok_or_else(|| {
            ContractError::SchemaCompile {
                name: schema_name.to_owned(),
                message: entry.compile_error.clone().unwrap_or_default(),
            }
        })?;
        let mut errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        errors.sort();
        Ok(errors)
    }

    /// Validate the JSON document at `path`.
    pub fn validate_json_file(
        &self,
        schema_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Vec<String>, ContractError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let instance: Value = serde_json::from_str(&text)?;
        self.validate(schema_name, &instance)
    }

    /// Validate a JSONL file line by line; errors carry `line N:` prefixes.
    pub fn validate_jsonl_file(
        &self,
        schema_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Vec<String>, ContractError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut errors = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(instance) => {
                    for message in self.validate(schema_name, &instance)? {
                        errors.push(format!("line {line_no}: {message}"));
                    }
                }
                Err(e) => errors.push(format!("line {line_no}: invalid json: {e}")),
            }
        }
        Ok(errors)
    }
}

/// Compile one schema against the full resource registry.
fn compile_with_resources(schema: &Value, resources: &[(String, Value)]) -> Result<Validator, String> {
    let mut options = jsonschema::options();
    for (uri, value) in resources {
        let resource = Resource::from_contents(value.clone());
        options = options.with_resource(uri.clone(), resource);
    }
    options.build(schema).map_err(|e| e.to_string())
}
