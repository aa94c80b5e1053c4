use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkspaceConfig {
    /// Docs root holding the ticket workspaces.
    pub root: PathBuf,
    /// Defaults to the parent of `root`.
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    /// Defaults to the enclosing git checkout, else `config_dir`.
    #[serde(default)]
    pub repo_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    #[serde(default)]
    pub include_body: bool,
    /// Directory globs, relative to the docs root, pruned from the walk.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

/// Controlled vocabulary. An empty list leaves that field unchecked.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct VocabularyConfig {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub doc_types: Vec<String>,
    #[serde(default)]
    pub intent: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
}

impl VocabularyConfig {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
            && self.doc_types.is_empty()
            && self.intent.is_empty()
            && self.status.is_empty()
    }
}

impl Config {
    /// Configuration for a bare docs root with every other setting defaulted.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace: WorkspaceConfig {
                root: root.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate workspace
    if config.workspace.root.as_os_str().is_empty() {
        anyhow::bail!("workspace.root must be set");
    }

    // Validate index
    for pattern in &config.index.exclude_globs {
        if let Err(e) = Glob::new(pattern) {
            anyhow::bail!("index.exclude_globs: invalid glob '{}': {}", pattern, e);
        }
    }

    // Relative paths are anchored at the config file's directory
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let anchor = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            base.join(p)
        }
    };
    config.workspace.root = anchor(&config.workspace.root);
    config.workspace.config_dir = config.workspace.config_dir.as_deref().map(anchor);
    config.workspace.repo_root = config.workspace.repo_root.as_deref().map(anchor);

    Ok(config)
}
