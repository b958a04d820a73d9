//! Filesystem tools: `fs.list`, `fs.stat`, `fs.mkdir`, `fs.move`, `fs.walk`.
//!
//! All paths go through [`crate::paths::expand_path`] before use. Dry-run
//! invocations never mutate the filesystem.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde_json::{json, Value};
use walkdir::WalkDir;

use super::{optional_bool, require_str, ToolError};
use crate::paths::expand_path;

/// Upper bound on `suffix_increment` probing before giving up.
const MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

/// Default recursion depth for `fs.walk`.
const DEFAULT_WALK_DEPTH: u64 = 20;

// ---------------------------------------------------------------------------
// fs.list
// ---------------------------------------------------------------------------

/// List directory entries (read-only; dry-run identical).
///
/// A missing path is tolerated and reported as `exists=false`.
pub fn list(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let path = expand_path(require_str(args, "fs.list", "path")?);
    if !path.exists() {
        return Ok(json!({
            "path": path.to_string_lossy(),
            "entries": [],
            "exists": false,
        }));
    }
    if !path.is_dir() {
        return Err(ToolError::InvalidInput(
            "fs.list: path is not a directory".to_owned(),
        ));
    }

    let mut entries: Vec<String> = std::fs::read_dir(&path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();

    Ok(json!({
        "path": path.to_string_lossy(),
        "entries": entries,
        "exists": true,
        "dry_run": dry_run,
    }))
}

// ---------------------------------------------------------------------------
// fs.stat
// ---------------------------------------------------------------------------

/// Stat a file or directory (read-only; dry-run identical).
pub fn stat(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let path = expand_path(require_str(args, "fs.stat", "path")?);
    let meta = std::fs::metadata(&path)
        .map_err(|_| ToolError::NotFound(format!("fs.stat: no such path: {}", path.display())))?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Ok(json!({
        "path": path.to_string_lossy(),
        "is_dir": meta.is_dir(),
        "is_file": meta.is_file(),
        "size": meta.len(),
        "mtime": mtime,
        "dry_run": dry_run,
    }))
}

// ---------------------------------------------------------------------------
// fs.mkdir
// ---------------------------------------------------------------------------

/// Create a directory (non-destructive; no delete).
///
/// `parents` and `exist_ok` both default to true.
pub fn mkdir(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let path = expand_path(require_str(args, "fs.mkdir", "path")?);
    let parents = optional_bool(args, "parents", true);
    let exist_ok = optional_bool(args, "exist_ok", true);

    if dry_run {
        return Ok(json!({
            "path": path.to_string_lossy(),
            "would_create": !path.exists(),
            "dry_run": true,
            "expected_effects": [{
                "kind": "fs_mkdir",
                "summary": format!("Create directory {}", path.display()),
                "resources": [path.to_string_lossy()],
            }],
        }));
    }

    let before = path.exists();
    if before {
        if !path.is_dir() {
            return Err(ToolError::Conflict(format!(
                "fs.mkdir: path exists and is not a directory: {}",
                path.display()
            )));
        }
        if !exist_ok {
            return Err(ToolError::Conflict(format!(
                "fs.mkdir: directory exists (exist_ok=false): {}",
                path.display()
            )));
        }
    } else if parents {
        std::fs::create_dir_all(&path)?;
    } else {
        std::fs::create_dir(&path)?;
    }

    Ok(json!({
        "path": path.to_string_lossy(),
        "created": !before && path.exists(),
        "dry_run": false,
    }))
}

// ---------------------------------------------------------------------------
// fs.move
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnConflict {
    Error,
    Overwrite,
    Skip,
    SuffixIncrement,
}

impl OnConflict {
    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Overwrite => "overwrite",
            Self::Skip => "skip",
            Self::SuffixIncrement => "suffix_increment",
        }
    }
}

fn parse_on_conflict(args: &Value) -> Result<OnConflict, ToolError> {
    // Legacy overwrite=true maps to on_conflict=overwrite.
    if optional_bool(args, "overwrite", false) {
        return Ok(OnConflict::Overwrite);
    }
    match args.get("on_conflict").and_then(Value::as_str) {
        None => Ok(OnConflict::Error),
        Some("error") => Ok(OnConflict::Error),
        Some("overwrite") => Ok(OnConflict::Overwrite),
        Some("skip") => Ok(OnConflict::Skip),
        Some("suffix_increment") => Ok(OnConflict::SuffixIncrement),
        Some(other) => Err(ToolError::InvalidInput(format!(
            "fs.move: 'on_conflict' must be one of error|overwrite|skip|suffix_increment, got '{other}'"
        ))),
    }
}

/// Candidate destination with `(n)` inserted before the suffix.
fn suffix_candidate(dst: &Path, n: u32) -> PathBuf {
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match dst.extension() {
        Some(ext) => format!("{stem}({n}).{}", ext.to_string_lossy()),
        None => format!("{stem}({n})"),
    };
    dst.with_file_name(name)
}

/// Lowest `n >= 1` whose candidate does not exist, bounded.
fn resolve_suffix_increment(dst: &Path) -> Result<PathBuf, ToolError> {
    for n in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = suffix_candidate(dst, n);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(ToolError::Conflict(format!(
        "fs.move: no free destination name after {MAX_SUFFIX_ATTEMPTS} attempts: {}",
        dst.display()
    )))
}

/// Move/rename a file or directory (never deletes).
///
/// On an existing destination the `on_conflict` strategy decides: `error`
/// fails, `skip` is a no-op, `overwrite` replaces, `suffix_increment` picks
/// the lowest free `{stem}(n){suffix}`. Dry-run never fails on a missing
/// source and reports what would happen.
pub fn mv(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let src = expand_path(require_str(args, "fs.move", "from")?);
    let dst = expand_path(require_str(args, "fs.move", "to")?);
    let on_conflict = parse_on_conflict(args)?;

    if dry_run {
        let src_exists = src.exists();
        let dst_exists = dst.exists();
        let would_skip = dst_exists && on_conflict == OnConflict::Skip;
        let would_error = dst_exists && on_conflict == OnConflict::Error;
        let would_overwrite = dst_exists && on_conflict == OnConflict::Overwrite;
        let would_suffix_increment = dst_exists && on_conflict == OnConflict::SuffixIncrement;
        let resolved_to = if would_suffix_increment {
            resolve_suffix_increment(&dst)?
        } else {
            dst.clone()
        };
        return Ok(json!({
            "from": src.to_string_lossy(),
            "to": dst.to_string_lossy(),
            "dry_run": true,
            "src_exists": src_exists,
            "dst_exists": dst_exists,
            "on_conflict": on_conflict.as_str(),
            "would_move": !would_skip && !would_error,
            "would_skip": would_skip,
            "would_error": would_error,
            "would_overwrite": would_overwrite,
            "would_suffix_increment": would_suffix_increment,
            "resolved_to": resolved_to.to_string_lossy(),
            "expected_effects": [{
                "kind": "fs_move",
                "summary": format!(
                    "Move {} -> {} (on_conflict={})",
                    src.display(),
                    dst.display(),
                    on_conflict.as_str()
                ),
                "resources": [src.to_string_lossy(), dst.to_string_lossy()],
            }],
        }));
    }

    if !src.exists() {
        return Err(ToolError::NotFound(format!(
            "fs.move: source not found: {}",
            src.display()
        )));
    }

    let mut target = dst.clone();
    if dst.exists() {
        match on_conflict {
            OnConflict::Skip => {
                return Ok(json!({
                    "from": src.to_string_lossy(),
                    "to": dst.to_string_lossy(),
                    "dry_run": false,
                    "skipped": true,
                    "reason": "dst_exists",
                }));
            }
            OnConflict::Error => {
                return Err(ToolError::Conflict(format!(
                    "fs.move: destination exists (on_conflict=error): {}",
                    dst.display()
                )));
            }
            OnConflict::Overwrite => {}
            OnConflict::SuffixIncrement => {
                target = resolve_suffix_increment(&dst)?;
            }
        }
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&src, &target)?;

    Ok(json!({
        "from": src.to_string_lossy(),
        "to": target.to_string_lossy(),
        "dry_run": false,
        "skipped": false,
    }))
}

// ---------------------------------------------------------------------------
// fs.walk
// ---------------------------------------------------------------------------

/// Recursively list entries under a directory.
///
/// Deterministic DFS with children sorted by name; returned paths are
/// relative to the walk root; unreadable directories are silently skipped.
/// `max_depth=0` lists only the root's immediate children.
pub fn walk(args: &Value, dry_run: bool) -> Result<Value, ToolError> {
    let root = expand_path(require_str(args, "fs.walk", "path")?);

    let max_depth = match args.get("max_depth") {
        None | Some(Value::Null) => DEFAULT_WALK_DEPTH,
        Some(v) => v.as_u64().ok_or_else(|| {
            ToolError::InvalidInput(
                "fs.walk: 'max_depth' must be a non-negative integer".to_owned(),
            )
        })?,
    };
    let include_dirs = optional_bool(args, "include_dirs", false);

    if !root.exists() {
        return Ok(json!({
            "path": root.to_string_lossy(),
            "entries": [],
            "exists": false,
            "dry_run": dry_run,
        }));
    }
    if !root.is_dir() {
        return Err(ToolError::InvalidInput(
            "fs.walk: path is not a directory".to_owned(),
        ));
    }

    // walkdir counts the root as depth 0, so the tool's "0 = only the
    // root's children" convention maps to max_depth + 1.
    let depth_limit = usize::try_from(max_depth)
        .unwrap_or(usize::MAX - 1)
        .saturating_add(1);

    let mut entries = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .max_depth(depth_limit)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let rel = entry
            .path()
            .strip_prefix(&root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| entry.path().to_string_lossy().into_owned());
        let file_type = entry.file_type();
        if file_type.is_dir() {
            if include_dirs {
                entries.push(json!({"path": rel, "is_file": false, "is_dir": true}));
            }
        } else if file_type.is_file() {
            entries.push(json!({"path": rel, "is_file": true, "is_dir": false}));
        }
    }

    Ok(json!({
        "path": root.to_string_lossy(),
        "entries": entries,
        "exists": true,
        "dry_run": dry_run,
    }))
}
