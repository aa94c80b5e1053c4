//! Path-derived document tags and ticket inference.

use std::path::Path;

use crate::models::PathTags;
use crate::paths::{clean_path, to_slash};

/// Base names that count as control documents when they sit next to an
/// `index.md`.
const CONTROL_DOC_NAMES: [&str; 3] = ["readme.md", "tasks.md", "changelog.md"];

/// Compute [`PathTags`] for an absolute document path.
///
/// Only control-document detection touches the filesystem (a stat of the
/// sibling `index.md`); a failed stat yields `is_control_doc = false`.
pub fn compute_path_tags(doc_path: &Path) -> PathTags {
    let slash = clean_path(&to_slash(&doc_path.to_string_lossy()));
    let base = doc_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    PathTags {
        is_index: base == "index.md",
        is_archived_path: contains_segment(&slash, "archive"),
        is_scripts_path: contains_segment(&slash, "scripts"),
        is_sources_path: contains_segment(&slash, "sources"),
        is_control_doc: CONTROL_DOC_NAMES.contains(&base.as_str()) && has_sibling_index(doc_path),
    }
}

fn contains_segment(slash_path: &str, seg: &str) -> bool {
    slash_path.contains(&format!("/{}/", seg))
}

fn has_sibling_index(doc_path: &Path) -> bool {
    match doc_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::metadata(dir.join("index.md"))
            .map(|m| m.is_file())
            .unwrap_or(false),
        _ => false,
    }
}

/// Best-effort ticket id from a docs-root-relative path laid out as
/// `YYYY/MM/DD/<TICKET>--<slug>/<file>.md`.
pub fn infer_ticket_id(rel_path: &str) -> Option<String> {
    let slash = to_slash(rel_path);
    let segments: Vec<&str> = slash.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 4 {
        return None;
    }
    let ticket = segments[3].split("--").next().unwrap_or_default().trim();
    (!ticket.is_empty()).then(|| ticket.to_string())
}
