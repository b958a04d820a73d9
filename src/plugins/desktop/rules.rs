//! Match-rule evaluation for the desktop tidy engine.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::config::{MatchAtom, Rule};

/// One entry of the pre-collected directory snapshot the planner works on.
///
/// The planner does no I/O itself; callers collect this snapshot (typically
/// via `fs.list` / `fs.stat`) and pass it in `params.entries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub name: String,
    #[serde(default)]
    pub is_file: bool,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Unix seconds; entries without an mtime never match recency atoms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
}

/// Snapshot entry as provided by the caller: a full object or a bare name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntryParam {
    Entry(EntrySnapshot),
    Name(String),
}

impl EntryParam {
    /// Bare names are treated as plain files.
    pub fn into_snapshot(self) -> EntrySnapshot {
        match self {
            Self::Entry(entry) => entry,
            Self::Name(name) => EntrySnapshot {
                name,
                is_file: true,
                is_dir: false,
                size: None,
                mtime: None,
            },
        }
    }
}

/// Lowercase extension after the last dot; empty when there is none.
pub fn extension(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.rsplit_once('.') {
        Some((_, ext)) => ext.to_owned(),
        None => String::new(),
    }
}

/// Approximate MIME family derived from the extension.
pub fn approx_mime_prefix(name: &str) -> Option<&'static str> {
    match extension(name).as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "heic" | "svg" => Some("image/"),
        "mp4" | "mov" | "mkv" | "webm" => Some("video/"),
        "mp3" | "wav" | "flac" | "m4a" => Some("audio/"),
        "pdf" | "txt" | "md" | "rtf" | "doc" | "docx" | "ppt" | "pptx" | "xls" | "xlsx"
        | "csv" => Some("application/"),
        _ => None,
    }
}

/// Evaluate one atom against an entry. `now` is Unix seconds.
pub fn atom_matches(atom: &MatchAtom, entry: &EntrySnapshot, now: i64) -> bool {
    if let Some(pattern) = &atom.filename_regex {
        return Regex::new(pattern)
            .map(|re| re.is_match(&entry.name))
            .unwrap_or(false);
    }
    if let Some(exts) = &atom.ext_in {
        let ext = extension(&entry.name);
        return exts
            .iter()
            .filter(|x| !x.is_empty())
            .any(|x| x.to_lowercase().trim_start_matches('.') == ext);
    }
    if let Some(prefix) = &atom.mime_prefix {
        if prefix.is_empty() {
            return false;
        }
        return approx_mime_prefix(&entry.name).is_some_and(|mime| mime.starts_with(prefix.as_str()));
    }
    if let Some(days) = atom.created_within_days {
        if days < 0 {
            return false;
        }
        let Some(mtime) = entry.mtime else {
            return false;
        };
        return now.saturating_sub(mtime) <= days.saturating_mul(86_400);
    }
    false
}

/// First-match-wins rule evaluation.
pub fn rule_matches(rule: &Rule, entry: &EntrySnapshot, now: i64) -> bool {
    let spec = &rule.match_spec;
    let any_ok = spec.any.is_empty() || spec.any.iter().any(|a| atom_matches(a, entry, now));
    let all_ok = spec.all.is_empty() || spec.all.iter().all(|a| atom_matches(a, entry, now));
    any_ok && all_ok
}

/// Skips hidden names and anything matching the configured glob patterns.
#[derive(Debug)]
pub struct SkipMatcher {
    globs: GlobSet,
}

impl SkipMatcher {
    /// Build from `params.exclude` plus `safety.ignore_patterns`.
    ///
    /// Unparseable patterns are dropped with a warning rather than failing
    /// the whole plan.
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "skipping invalid ignore pattern"),
            }
        }
        let globs = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "ignore pattern set failed to build");
            GlobSet::empty()
        });
        Self { globs }
    }

    /// Empty and dot-prefixed names are always skipped.
    pub fn should_skip(&self, name: &str) -> bool {
        name.is_empty() || name.starts_with('.') || self.globs.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::desktop::config::{MatchSpec, RuleAction};

    fn file(name: &str) -> EntrySnapshot {
        EntrySnapshot {
            name: name.to_owned(),
            is_file: true,
            is_dir: false,
            size: None,
            mtime: None,
        }
    }

    fn atom_ext(exts: &[&str]) -> MatchAtom {
        MatchAtom {
            ext_in: Some(exts.iter().map(|e| (*e).to_owned()).collect()),
            ..MatchAtom::default()
        }
    }

    #[test]
    fn test_extension_lowercases_after_last_dot() {
        assert_eq!(extension("photo.JPG"), "jpg");
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(extension("noext"), "");
        assert_eq!(extension("trailing."), "");
        assert_eq!(extension(".hidden"), "hidden");
    }

    #[test]
    fn test_ext_in_normalizes_leading_dots_and_case() {
        let atom = atom_ext(&[".JPG", "png"]);
        assert!(atom_matches(&atom, &file("pic.jpg"), 0));
        assert!(atom_matches(&atom, &file("pic.PNG"), 0));
        assert!(!atom_matches(&atom, &file("pic.gif"), 0));
    }

    #[test]
    fn test_filename_regex_searches_name() {
        let atom = MatchAtom {
            filename_regex: Some("^Screen Shot ".to_owned()),
            ..MatchAtom::default()
        };
        assert!(atom_matches(&atom, &file("Screen Shot 2026-01-05.png"), 0));
        assert!(!atom_matches(&atom, &file("pic.png"), 0));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let atom = MatchAtom {
            filename_regex: Some("[unclosed".to_owned()),
            ..MatchAtom::default()
        };
        assert!(!atom_matches(&atom, &file("anything"), 0));
    }

    #[test]
    fn test_mime_prefix_matches_derived_family() {
        let atom = MatchAtom {
            mime_prefix: Some("image/".to_owned()),
            ..MatchAtom::default()
        };
        assert!(atom_matches(&atom, &file("pic.heic"), 0));
        assert!(!atom_matches(&atom, &file("movie.mp4"), 0));

        let broad = MatchAtom {
            mime_prefix: Some("i".to_owned()),
            ..MatchAtom::default()
        };
        assert!(atom_matches(&broad, &file("pic.png"), 0));
    }

    #[test]
    fn test_created_within_days_window() {
        let now = 1_767_600_000;
        let atom = MatchAtom {
            created_within_days: Some(7),
            ..MatchAtom::default()
        };

        let mut entry = file("recent.txt");
        entry.mtime = Some(now - 3 * 86_400);
        assert!(atom_matches(&atom, &entry, now));

        entry.mtime = Some(now - 30 * 86_400);
        assert!(!atom_matches(&atom, &entry, now));

        // Entries without mtime never match.
        entry.mtime = None;
        assert!(!atom_matches(&atom, &entry, now));
    }

    #[test]
    fn test_rule_any_and_all_combination() {
        let rule = Rule {
            id: "r".to_owned(),
            match_spec: MatchSpec {
                any: vec![atom_ext(&["jpg"]), atom_ext(&["png"])],
                all: vec![MatchAtom {
                    filename_regex: Some("^IMG_".to_owned()),
                    ..MatchAtom::default()
                }],
            },
            action: RuleAction::default(),
        };

        assert!(rule_matches(&rule, &file("IMG_0001.png"), 0));
        // any matches but all does not
        assert!(!rule_matches(&rule, &file("pic.png"), 0));
        // all matches but any does not
        assert!(!rule_matches(&rule, &file("IMG_0001.gif"), 0));
    }

    #[test]
    fn test_rule_with_empty_match_matches_everything() {
        let rule = Rule {
            id: "r".to_owned(),
            match_spec: MatchSpec::default(),
            action: RuleAction::default(),
        };
        assert!(rule_matches(&rule, &file("anything.bin"), 0));
    }

    #[test]
    fn test_skip_matcher_hidden_and_globs() {
        let patterns = vec!["*.tmp".to_owned(), ".DS_Store".to_owned()];
        let skip = SkipMatcher::new(patterns.iter());

        assert!(skip.should_skip(".DS_Store"));
        assert!(skip.should_skip(".anything-hidden"));
        assert!(skip.should_skip("scratch.tmp"));
        assert!(!skip.should_skip("keep.txt"));
        assert!(skip.should_skip(""));
    }

    #[test]
    fn test_entry_param_bare_name_is_a_file() {
        let entry = EntryParam::Name("note.txt".to_owned()).into_snapshot();
        assert!(entry.is_file);
        assert!(!entry.is_dir);
        assert_eq!(entry.name, "note.txt");
    }
}
