//! Per-run runtime configuration.

use std::path::PathBuf;

use uuid::Uuid;

/// Immutable flags and destinations for exactly one run.
///
/// Defaults are the safe ones: dry-run on, strict dry-run on, destructive
/// tools denied. The `run_id` stamps every trace event of the run.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub run_id: String,
    pub dry_run: bool,
    pub strict_dry_run: bool,
    pub allow_destructive: bool,
    pub trace_path: PathBuf,
}

impl RuntimeContext {
    /// New context with a generated run id and safe defaults.
    pub fn new(trace_path: impl Into<PathBuf>) -> Self {
        Self {
            run_id: format!("run_{}", Uuid::new_v4().simple()),
            dry_run: true,
            strict_dry_run: true,
            allow_destructive: false,
            trace_path: trace_path.into(),
        }
    }

    /// Same defaults, caller-chosen run id.
    pub fn with_run_id(run_id: impl Into<String>, trace_path: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::new(trace_path)
        }
    }
}
