//! Workspace facade.
//!
//! A [`Workspace`] owns the path resolver and the in-memory index for one
//! docs root. `init_index` rebuilds the index from scratch; `query_docs`
//! runs structured queries against it. The index lives exactly as long as
//! the facade, and nothing is spawned in the background.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::db;
use crate::diagnostics::Taxonomy;
use crate::error::WorkspaceError;
use crate::ingest::{self, IndexOptions, IngestContext, IngestReport};
use crate::migrate;
use crate::paths::{find_repository_root, PathResolver, ResolverOptions};
use crate::query::{DocQuery, DocQueryResult};
use crate::search;
use crate::stats::{self, IndexStats};
use crate::walker::Walker;

/// Construction parameters. All three paths are required.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceContext {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub repo_root: PathBuf,
    pub config: Option<Config>,
}

impl WorkspaceContext {
    /// Derive a context from a loaded configuration. `config_dir` defaults to
    /// the parent of the docs root; `repo_root` to the enclosing git
    /// checkout, else `config_dir`.
    pub fn from_config(config: Config) -> Self {
        let root = config.workspace.root.clone();
        let config_dir = config.workspace.config_dir.clone().unwrap_or_else(|| {
            root.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone())
        });
        let repo_root = config.workspace.repo_root.clone().unwrap_or_else(|| {
            find_repository_root(&config_dir)
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.clone())
        });
        Self {
            root,
            config_dir,
            repo_root,
            config: Some(config),
        }
    }
}

struct Index {
    pool: SqlitePool,
    fts_available: bool,
}

pub struct Workspace {
    ctx: WorkspaceContext,
    resolver: PathResolver,
    index: Option<Index>,
    report: IngestReport,
}

impl Workspace {
    pub fn new(ctx: WorkspaceContext) -> Result<Self, WorkspaceError> {
        for (name, path) in [
            ("root", &ctx.root),
            ("config_dir", &ctx.config_dir),
            ("repo_root", &ctx.repo_root),
        ] {
            if path.as_os_str().is_empty() {
                return Err(WorkspaceError::MissingPath(name));
            }
        }
        let resolver = PathResolver::new(ResolverOptions {
            docs_root: Some(ctx.root.clone()),
            config_dir: Some(ctx.config_dir.clone()),
            repo_root: Some(ctx.repo_root.clone()),
            doc_path: None,
        });
        Ok(Self {
            ctx,
            resolver,
            index: None,
            report: IngestReport::default(),
        })
    }

    pub fn context(&self) -> &WorkspaceContext {
        &self.ctx
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Build a fresh index, replacing any previous one. On failure the
    /// facade is left without an index.
    pub async fn init_index(
        &mut self,
        opts: IndexOptions,
        cancel: &CancelToken,
    ) -> Result<(), WorkspaceError> {
        if !self.ctx.root.is_dir() {
            return Err(WorkspaceError::RootNotFound(self.ctx.root.clone()));
        }

        if let Some(old) = self.index.take() {
            debug!("closing previous index");
            old.pool.close().await;
        }
        self.report = IngestReport::default();

        let pool = db::connect_in_memory().await?;
        let fts_available = migrate::create_schema(&pool).await?;

        let (exclude_globs, vocabulary) = match &self.ctx.config {
            Some(cfg) => (cfg.index.exclude_globs.as_slice(), Some(&cfg.vocabulary)),
            None => (&[][..], None),
        };
        let walker = Walker::new(&self.ctx.root).exclude_globs(exclude_globs)?;

        let ingest_ctx = IngestContext {
            walker: &walker,
            resolver: &self.resolver,
            options: opts,
            vocabulary,
            fts_available,
        };
        let report = ingest::build_index(&pool, &ingest_ctx, cancel).await?;

        self.report = report;
        self.index = Some(Index {
            pool,
            fts_available,
        });
        Ok(())
    }

    pub async fn query_docs(
        &self,
        q: &DocQuery,
        cancel: &CancelToken,
    ) -> Result<DocQueryResult, WorkspaceError> {
        let index = self.index.as_ref().ok_or(WorkspaceError::IndexNotInitialized)?;
        search::execute_query(&index.pool, q, &self.resolver, index.fts_available, cancel).await
    }

    pub fn fts_available(&self) -> bool {
        self.index.as_ref().is_some_and(|i| i.fts_available)
    }

    /// Raw index handle for exporters. Not part of the query contract.
    pub fn db(&self) -> Option<&SqlitePool> {
        self.index.as_ref().map(|i| &i.pool)
    }

    /// Diagnostics produced by the last `init_index`.
    pub fn ingest_diagnostics(&self) -> &[Taxonomy] {
        &self.report.diagnostics
    }

    pub fn ingest_report(&self) -> &IngestReport {
        &self.report
    }

    pub async fn stats(&self) -> Result<IndexStats, WorkspaceError> {
        let index = self.index.as_ref().ok_or(WorkspaceError::IndexNotInitialized)?;
        Ok(stats::index_stats(&index.pool, index.fts_available).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ctx(root: &Path) -> WorkspaceContext {
        WorkspaceContext {
            root: root.to_path_buf(),
            config_dir: root.to_path_buf(),
            repo_root: root.to_path_buf(),
            config: None,
        }
    }

    #[test]
    fn test_missing_paths_rejected() {
        let err = Workspace::new(WorkspaceContext::default()).err().unwrap();
        assert!(matches!(err, WorkspaceError::MissingPath("root")));

        let mut c = ctx(Path::new("/tmp"));
        c.repo_root = PathBuf::new();
        let err = Workspace::new(c).err().unwrap();
        assert!(matches!(err, WorkspaceError::MissingPath("repo_root")));
    }

    #[tokio::test]
    async fn test_query_before_init() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(ctx(tmp.path())).unwrap();
        let err = ws
            .query_docs(&DocQuery::repo(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::IndexNotInitialized));
        assert!(ws.db().is_none());
        assert!(!ws.fts_available());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let tmp = TempDir::new().unwrap();
        let mut ws = Workspace::new(ctx(&tmp.path().join("nope"))).unwrap();
        let err = ws
            .init_index(IndexOptions::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::RootNotFound(_)));
    }

    #[tokio::test]
    async fn test_exclude_globs_from_config() {
        let tmp = TempDir::new().unwrap();
        for dir in ["keep", "drafts"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
            fs::write(
                tmp.path().join(dir).join("a.md"),
                "---\nTitle: A\nTicket: T-1\nDocType: note\n---\n",
            )
            .unwrap();
        }
        let mut config = Config::for_root(tmp.path());
        config.index.exclude_globs = vec!["drafts".into()];
        let mut c = ctx(tmp.path());
        c.config = Some(config);
        let mut ws = Workspace::new(c).unwrap();
        ws.init_index(IndexOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        let res = ws
            .query_docs(&DocQuery::repo(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(res.docs.len(), 1);
        assert!(res.docs[0].path.ends_with("keep/a.md"));
    }

    #[test]
    fn test_context_from_config_defaults() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("ttmp");
        let c = WorkspaceContext::from_config(Config::for_root(&root));
        assert_eq!(c.root, root);
        assert_eq!(c.config_dir, tmp.path());
        assert!(!c.repo_root.as_os_str().is_empty());
    }
}
