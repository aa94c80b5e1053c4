//! Docs-root traversal.
//!
//! Walks the docs root in lexical order and yields every `.md` file
//! (case-insensitive extension). Directories are pruned before descent when
//! their base name starts with `_` (templates, guidelines, scaffolding), when
//! it is exactly `.meta`, or when an injected predicate says so. The walker
//! does not read files; it reports paths plus a read-error slot for entries
//! it could not inspect.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::WorkspaceError;

/// Extra directory skip predicate. Receives the directory's absolute path.
pub type SkipDirFn = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// A Markdown file found during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub read_err: Option<String>,
}

/// The built-in directory skip rule, applied to a base name.
pub fn default_skip_dir(name: &str) -> bool {
    name == ".meta" || name.starts_with('_')
}

pub struct Walker {
    root: PathBuf,
    skip_dirs: Vec<SkipDirFn>,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skip_dirs: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add a directory skip predicate.
    pub fn skip_dir<F>(mut self, pred: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.skip_dirs.push(Box::new(pred));
        self
    }

    /// Skip directories whose root-relative path matches any glob.
    pub fn exclude_globs(self, patterns: &[String]) -> Result<Self, WorkspaceError> {
        if patterns.is_empty() {
            return Ok(self);
        }
        let set = build_globset(patterns)?;
        let root = self.root.clone();
        Ok(self.skip_dir(move |dir| {
            let rel = dir.strip_prefix(&root).unwrap_or(dir);
            let rel = rel.to_string_lossy().replace('\\', "/");
            set.is_match(&rel)
        }))
    }

    fn skips(&self, dir: &Path) -> bool {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        default_skip_dir(&name) || self.skip_dirs.iter().any(|f| f(dir))
    }

    /// Collect Markdown files. Cancellation is checked per directory entry.
    pub fn walk(&self, cancel: &CancelToken) -> Result<Vec<WalkedFile>, WorkspaceError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || !self.skips(e.path()));

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(WorkspaceError::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(WorkspaceError::Walk(err));
                    }
                    match err.path() {
                        Some(path) if is_markdown(path) => {
                            warn!(path = %path.display(), error = %err, "unreadable document");
                            files.push(WalkedFile {
                                path: path.to_path_buf(),
                                read_err: Some(err.to_string()),
                            });
                        }
                        _ => warn!(error = %err, "skipping unreadable walk entry"),
                    }
                    continue;
                }
            };
            // Symlinked files are read through the link; symlinked
            // directories are never descended into.
            let is_doc = entry.file_type().is_file()
                || (entry.path_is_symlink() && !entry.path().is_dir());
            if is_doc && is_markdown(entry.path()) {
                files.push(WalkedFile {
                    path: entry.into_path(),
                    read_err: None,
                });
            }
        }

        Ok(files)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, WorkspaceError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
