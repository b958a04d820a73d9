//! Deterministic path expansion and scope ancestry checks.
//!
//! Expansion order is fixed: a leading `~`, then environment variables,
//! then absolute-path resolution. Resolution uses the OS canonicalizer for
//! paths that exist and falls back to lexical absolutization for paths that
//! do not exist yet. No unicode normalization is attempted.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use path_absolutize::Absolutize;
use regex::Regex;

/// Matches `$VAR` and `${VAR}` references.
fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("env var pattern is valid")
    })
}

/// Substitute `$VAR`/`${VAR}` with the environment value.
///
/// Unset variables are left verbatim, matching shell-style expansion of
/// unknown names.
fn expand_env_vars(raw: &str) -> String {
    env_var_pattern()
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => caps
                    .get(0)
                    .map(|m| m.as_str().to_owned())
                    .unwrap_or_default(),
            }
        })
        .into_owned()
}

/// Expand a leading `~` to the current user's home directory.
///
/// `~user` forms are not supported and are left verbatim.
fn expand_home(raw: &str) -> PathBuf {
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    match home {
        Some(home) if raw == "~" => home,
        Some(home) => match raw.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}

/// Expand `~`, then environment variables, then resolve to an absolute
/// path. A `~` arriving via an env var's value stays literal.
pub fn expand_path(raw: &str) -> PathBuf {
    let home_expanded = expand_home(raw);
    let expanded = PathBuf::from(expand_env_vars(&home_expanded.to_string_lossy()));
    match std::fs::canonicalize(&expanded) {
        Ok(resolved) => resolved,
        Err(_) => expanded
            .absolutize()
            .map(|p| p.into_owned())
            .unwrap_or(expanded),
    }
}

/// Expand a declared root list, dropping empty entries.
pub fn normalize_roots<S: AsRef<str>>(fs_roots: &[S]) -> Vec<PathBuf> {
    fs_roots
        .iter()
        .map(AsRef::as_ref)
        .filter(|r| !r.is_empty())
        .map(expand_path)
        .collect()
}

/// True iff `path` resolves to one of `roots` or a strict descendant.
///
/// The ancestor test compares whole path components, never string prefixes,
/// so `/tmp/foo` is not inside `/tmp/foobar`.
pub fn is_within_any_root(path: &str, roots: &[PathBuf]) -> bool {
    let resolved = expand_path(path);
    roots.iter().any(|root| resolved.starts_with(root))
}

/// Component-wise ancestor test for already-resolved paths.
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
