//! Multi-anchor path normalization.
//!
//! Related-file references in frontmatter may be typed relative to the
//! repository root, the docs root, the config directory or the document's
//! own directory. [`PathResolver::normalize`] resolves a raw reference once
//! and returns every projection it can compute ([`NormalizedPath`]) so later
//! matching reduces to string equality on forward-slash keys.
//!
//! All work is lexical except for two filesystem probes: the existence check
//! used to prefer an anchor whose candidate file exists, and repository-root
//! discovery (walk up looking for `.git`) when no repo root was supplied.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Base directory a path was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Repo,
    Docs,
    Doc,
    Config,
    Absolute,
    #[default]
    Unresolved,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Repo => "repo",
            Anchor::Docs => "docs",
            Anchor::Doc => "doc",
            Anchor::Config => "config",
            Anchor::Absolute => "absolute",
            Anchor::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every comparable representation of one raw path.
///
/// Keys are forward-slash strings; a key that cannot be computed is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NormalizedPath {
    pub canonical: String,
    pub repo_rel: String,
    pub docs_rel: String,
    pub doc_rel: String,
    pub abs: String,
    /// Lexically cleaned input; leading `..` segments survive.
    pub clean: String,
    /// Trimmed input with separators converted, otherwise as typed.
    pub original_clean: String,
    pub anchor: Anchor,
    /// Whether `abs` existed on disk at normalization time.
    pub exists: bool,
}

impl NormalizedPath {
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// The seven keys, de-duplicated, empty ones dropped, in priority order.
    pub fn keys(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(7);
        for key in [
            &self.canonical,
            &self.repo_rel,
            &self.docs_rel,
            &self.doc_rel,
            &self.abs,
            &self.clean,
            &self.original_clean,
        ] {
            let key = to_slash(key.trim());
            if !key.is_empty() && !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }
}

/// Construction parameters for [`PathResolver`]. Every anchor is optional.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub docs_root: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub repo_root: Option<PathBuf>,
    /// Document the paths are written in; its directory becomes the `doc` anchor.
    pub doc_path: Option<PathBuf>,
}

/// Normalizes raw path strings against a fixed set of absolute anchors.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    repo_root: String,
    docs_root: String,
    config_dir: String,
    doc_dir: String,
}

impl PathResolver {
    pub fn new(opts: ResolverOptions) -> Self {
        let doc_dir = opts
            .doc_path
            .as_deref()
            .and_then(Path::parent)
            .map(absolute_slash)
            .unwrap_or_default();
        let docs_root = opts.docs_root.as_deref().map(absolute_slash).unwrap_or_default();
        let config_dir = opts.config_dir.as_deref().map(absolute_slash).unwrap_or_default();
        let mut repo_root = opts.repo_root.as_deref().map(absolute_slash).unwrap_or_default();
        if repo_root.is_empty() {
            repo_root = [&doc_dir, &docs_root, &config_dir]
                .into_iter()
                .filter(|d| !d.is_empty())
                .find_map(|d| find_repository_root(Path::new(d)))
                .unwrap_or_default();
        }
        Self {
            repo_root,
            docs_root,
            config_dir,
            doc_dir,
        }
    }

    /// A resolver sharing this one's anchors, with `doc_path` as the doc anchor.
    pub fn for_document(&self, doc_path: &Path) -> Self {
        Self {
            doc_dir: doc_path.parent().map(absolute_slash).unwrap_or_default(),
            ..self.clone()
        }
    }

    pub fn repo_root(&self) -> &str {
        &self.repo_root
    }

    pub fn docs_root(&self) -> &str {
        &self.docs_root
    }

    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    pub fn doc_dir(&self) -> &str {
        &self.doc_dir
    }

    pub fn normalize(&self, raw: &str) -> NormalizedPath {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return NormalizedPath::default();
        }
        let original_clean = to_slash(trimmed);
        let clean = clean_path(&original_clean);
        let expanded = clean_path(&expand_home(&original_clean));

        if is_absolute(&expanded) {
            let mut out = self.project(&expanded, Anchor::Absolute);
            out.exists = Path::new(&expanded).exists();
            out.clean = clean;
            out.original_clean = original_clean;
            return out;
        }

        let bases = [
            (self.repo_root.as_str(), Anchor::Repo),
            (self.doc_dir.as_str(), Anchor::Doc),
            (self.config_dir.as_str(), Anchor::Config),
            (self.docs_root.as_str(), Anchor::Docs),
        ];

        let mut fallback: Option<NormalizedPath> = None;
        for (base, anchor) in bases {
            if base.is_empty() {
                continue;
            }
            let candidate = clean_path(&format!("{}/{}", base.trim_end_matches('/'), expanded));
            let acceptable = match anchor {
                Anchor::Repo => is_within(&candidate, base),
                _ => is_within(&candidate, base) || is_within(&candidate, &self.repo_root),
            };
            if !acceptable {
                continue;
            }
            let mut out = self.project(&candidate, anchor);
            out.clean = clean.clone();
            out.original_clean = original_clean.clone();
            if Path::new(&candidate).exists() {
                out.exists = true;
                return out;
            }
            if fallback.is_none() {
                fallback = Some(out);
            }
        }

        if let Some(out) = fallback {
            return out;
        }

        NormalizedPath {
            canonical: clean.clone(),
            clean,
            original_clean,
            anchor: Anchor::Unresolved,
            ..Default::default()
        }
    }

    fn project(&self, abs: &str, anchor: Anchor) -> NormalizedPath {
        let repo_rel = relative_within(abs, &self.repo_root);
        let docs_rel = relative_within(abs, &self.docs_root);
        let mut doc_rel = relative_within(abs, &self.doc_dir);
        if doc_rel.is_empty() && !self.doc_dir.is_empty() {
            doc_rel = relative_path(&self.doc_dir, abs);
        }
        let canonical = [&repo_rel, &docs_rel, &doc_rel]
            .into_iter()
            .find(|k| !k.is_empty())
            .cloned()
            .unwrap_or_else(|| clean_path(abs));
        NormalizedPath {
            canonical,
            repo_rel,
            docs_rel,
            doc_rel,
            abs: abs.to_string(),
            anchor,
            ..Default::default()
        }
    }
}

/// True iff any key of `a` equals any key of `b`.
pub fn match_paths(a: &NormalizedPath, b: &NormalizedPath) -> bool {
    let b_keys = b.keys();
    a.keys().iter().any(|k| b_keys.contains(k))
}

/// True iff some key of `file` lies strictly below some key of `dir`.
pub fn directory_match(dir: &NormalizedPath, file: &NormalizedPath) -> bool {
    let prefixes: Vec<String> = dir
        .keys()
        .iter()
        .map(|k| k.trim_end_matches('/').to_string())
        .filter(|k| !k.is_empty())
        .collect();
    file.keys().iter().any(|f| {
        prefixes
            .iter()
            .any(|p| f.len() > p.len() + 1 && f.starts_with(p.as_str()) && f[p.len()..].starts_with('/'))
    })
}

// ============ Lexical helpers ============

/// Convert backslashes to forward slashes.
pub fn to_slash(s: &str) -> String {
    s.replace('\\', "/")
}

fn drive_prefix_len(s: &str) -> usize {
    let b = s.as_bytes();
    if b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':' {
        2
    } else {
        0
    }
}

/// Absolute in either POSIX (`/x`) or drive-letter (`C:/x`) form.
pub fn is_absolute(s: &str) -> bool {
    let s = to_slash(s);
    let rest = &s[drive_prefix_len(&s)..];
    rest.starts_with('/')
}

/// Lexical clean of a forward-slash path: drops `.` and empty segments and
/// folds `..` against a preceding segment. Leading `..` of a relative path
/// are kept; `..` above an absolute root is dropped.
pub fn clean_path(s: &str) -> String {
    let s = to_slash(s);
    if s.is_empty() {
        return ".".to_string();
    }
    let prefix_len = drive_prefix_len(&s);
    let (prefix, rest) = s.split_at(prefix_len);
    let rooted = rest.starts_with('/');

    let mut stack: Vec<&str> = Vec::new();
    for seg in rest.split('/') {
        match seg {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&last) if last != ".." => {
                    stack.pop();
                }
                _ if rooted => {}
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("{}/{}", prefix, joined),
        (false, true) if prefix.is_empty() => ".".to_string(),
        (false, _) => format!("{}{}", prefix, joined),
    }
}

/// `target` relative to `base` when `target` is `base` or below it, else empty.
fn relative_within(target: &str, base: &str) -> String {
    if target.is_empty() || base.is_empty() {
        return String::new();
    }
    let rel = relative_path(base, target);
    if rel == ".." || rel.starts_with("../") || rel.is_empty() {
        return String::new();
    }
    rel
}

fn is_within(target: &str, base: &str) -> bool {
    !relative_within(target, base).is_empty()
}

/// Lexical relative path from absolute `base` to absolute `target`.
fn relative_path(base: &str, target: &str) -> String {
    if base.is_empty() || target.is_empty() {
        return String::new();
    }
    let base_segs: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    let target_segs: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let common = base_segs
        .iter()
        .zip(target_segs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = std::iter::repeat("..")
        .take(base_segs.len() - common)
        .collect();
    parts.extend(&target_segs[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn expand_home(s: &str) -> String {
    if s != "~" && !s.starts_with("~/") {
        return s.to_string();
    }
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => format!("{}{}", to_slash(&home), &s[1..]),
        _ => s.to_string(),
    }
}

/// Absolute, cleaned, forward-slash form of a directory.
pub fn absolute_slash(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return String::new();
    }
    let mut s = to_slash(&raw);
    if !is_absolute(&s) {
        if let Ok(cwd) = std::env::current_dir() {
            s = format!("{}/{}", to_slash(&cwd.to_string_lossy()), s);
        }
    }
    clean_path(&s)
}

/// Walk up from `start` to the first directory containing `.git`.
pub fn find_repository_root(start: &Path) -> Option<String> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(".git").exists() {
            return Some(absolute_slash(d));
        }
        dir = d.parent();
    }
    None
}
