//! # docmgr workspace
//!
//! Indexing and query engine for a ticket-oriented Markdown documentation
//! workspace.
//!
//! Documents live under a docs root, usually at
//! `<root>/YYYY/MM/DD/<TICKET>--<slug>/`, and carry YAML frontmatter (title,
//! ticket, doc type, topics, owners, related source files). The engine walks
//! the tree, parses every document, loads the metadata into an in-memory
//! SQLite index and answers structured queries ("every design doc of ticket
//! X", "which docs reference `backend/main.go`") with structured diagnostics
//! alongside the results.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Walker  │──▶│ Frontmatter │──▶│   Ingest     │
//! │ (.md)    │   │ + PathTags  │   │ (1 txn)      │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         ▼
//!  DocQuery ──▶ Compiler ──▶ Executor ──▶ SQLite (in-memory, FTS5?)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use docmgr_workspace::{CancelToken, DocQuery, IndexOptions, Workspace, WorkspaceContext};
//!
//! # async fn run() -> Result<(), docmgr_workspace::WorkspaceError> {
//! let mut ws = Workspace::new(WorkspaceContext {
//!     root: "ttmp".into(),
//!     config_dir: ".".into(),
//!     repo_root: ".".into(),
//!     config: None,
//! })?;
//! let cancel = CancelToken::new();
//! ws.init_index(IndexOptions::default(), &cancel).await?;
//!
//! let mut q = DocQuery::repo();
//! q.filters.related_file = vec!["backend/main.go".into()];
//! for doc in ws.query_docs(&q, &cancel).await?.docs {
//!     println!("{}", doc.path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`paths`] | Multi-anchor path normalization |
//! | [`frontmatter`] | Frontmatter reader and writer |
//! | [`models`] | Core data types |
//! | [`walker`] | Docs-root traversal |
//! | [`tags`] | Path tags and ticket inference |
//! | [`db`] | In-memory database connection |
//! | [`migrate`] | Schema creation and FTS detection |
//! | [`ingest`] | Index build pipeline |
//! | [`query`] | Public query types |
//! | [`query_sql`] | Query compiler |
//! | [`search`] | Query executor |
//! | [`dates`] | Date parsing for time-range filters |
//! | [`diagnostics`] | Diagnostic taxonomy |
//! | [`vocabulary`] | Controlled-vocabulary checks |
//! | [`stats`] | Index statistics |
//! | [`config`] | TOML configuration |
//! | [`workspace`] | Workspace facade |

pub mod cancel;
pub mod config;
pub mod dates;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod frontmatter;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod paths;
pub mod query;
pub mod query_sql;
pub mod search;
pub mod stats;
pub mod tags;
pub mod vocabulary;
pub mod walker;
pub mod workspace;

pub use cancel::CancelToken;
pub use diagnostics::{find_taxonomy, Severity, Stage, Symptom, Taxonomy};
pub use error::{FrontmatterError, QueryError, WorkspaceError};
pub use ingest::IndexOptions;
pub use models::{Document, PathTags, RelatedFile};
pub use paths::{NormalizedPath, PathResolver, ResolverOptions};
pub use query::{DocFilters, DocHandle, DocQuery, DocQueryOptions, DocQueryResult, OrderBy, Scope};
pub use workspace::{Workspace, WorkspaceContext};
