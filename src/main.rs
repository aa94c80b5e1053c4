//! # docmgr index CLI (`docmgr-index`)
//!
//! Thin command-line front end over the workspace engine. Every command
//! builds a fresh in-memory index of the docs root and then acts on it.
//!
//! ## Usage
//!
//! ```bash
//! docmgr-index --root ./ttmp <command>
//! docmgr-index --config ./docmgr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docmgr-index index` | Build the index and print ingest diagnostics |
//! | `docmgr-index query` | Run a structured query, print JSON |
//! | `docmgr-index stats` | Print index row counts |
//! | `docmgr-index check <file>` | Validate one document's frontmatter |
//! | `docmgr-index rewrite <file>` | Rewrite one document's frontmatter in canonical form |
//!
//! Logs go to stderr; set `DOCMGR_LOG` (e.g. `debug`) to override the level.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docmgr_workspace::config::{self, Config};
use docmgr_workspace::frontmatter;
use docmgr_workspace::stats::format_stats;
use docmgr_workspace::{
    CancelToken, DocFilters, DocQuery, DocQueryOptions, IndexOptions, OrderBy, Scope, Workspace,
    WorkspaceContext,
};

/// Index and query a ticket-oriented Markdown docs workspace.
#[derive(Parser)]
#[command(name = "docmgr-index", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Docs root. Overrides `workspace.root` from the config file.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and report what was ingested.
    Index {
        /// Store document bodies.
        #[arg(long)]
        include_body: bool,

        /// Print ingest diagnostics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Query the index. Prints `{docs, diagnostics}` as JSON.
    Query(QueryArgs),

    /// Print index statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Validate a document's frontmatter (required fields, YAML syntax).
    Check {
        file: PathBuf,
    },

    /// Rewrite a document's frontmatter in canonical form.
    Rewrite {
        file: PathBuf,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Restrict to one ticket.
    #[arg(long, conflicts_with = "scope_doc")]
    scope_ticket: Option<String>,

    /// Restrict to one document.
    #[arg(long)]
    scope_doc: Option<String>,

    #[arg(long)]
    ticket: Option<String>,

    #[arg(long)]
    doc_type: Option<String>,

    #[arg(long)]
    status: Option<String>,

    /// Match any of these topics (repeatable).
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Reverse lookup by related file (repeatable).
    #[arg(long = "file")]
    files: Vec<String>,

    /// Reverse lookup by related directory (repeatable).
    #[arg(long = "dir")]
    dirs: Vec<String>,

    /// Full-text query.
    #[arg(long)]
    text: Option<String>,

    /// `YYYY-MM-DD`, RFC3339 or relative (`2 weeks ago`, `last month`).
    #[arg(long)]
    since: Option<String>,

    #[arg(long)]
    until: Option<String>,

    /// path, last_updated or rank.
    #[arg(long, default_value = "path")]
    order_by: OrderBy,

    #[arg(long)]
    reverse: bool,

    #[arg(long)]
    include_body: bool,

    #[arg(long)]
    include_errors: bool,

    #[arg(long)]
    include_archived: bool,

    #[arg(long)]
    include_scripts: bool,

    #[arg(long)]
    include_control_docs: bool,

    #[arg(long)]
    diagnostics: bool,
}

impl QueryArgs {
    fn to_query(&self) -> DocQuery {
        let scope = match (&self.scope_ticket, &self.scope_doc) {
            (Some(ticket_id), _) => Scope::Ticket {
                ticket_id: ticket_id.clone(),
            },
            (None, Some(doc_path)) => Scope::Doc {
                doc_path: doc_path.clone(),
            },
            (None, None) => Scope::Repo,
        };
        DocQuery {
            scope,
            filters: DocFilters {
                ticket: self.ticket.clone(),
                doc_type: self.doc_type.clone(),
                status: self.status.clone(),
                topics_any: self.topics.clone(),
                related_file: self.files.clone(),
                related_dir: self.dirs.clone(),
                text_query: self.text.clone(),
                since: self.since.clone(),
                until: self.until.clone(),
                ..Default::default()
            },
            options: DocQueryOptions {
                include_body: self.include_body,
                include_errors: self.include_errors,
                order_by: self.order_by,
                reverse: self.reverse,
                include_archived_path: self.include_archived,
                include_scripts_path: self.include_scripts,
                include_control_docs: self.include_control_docs,
                include_diagnostics: self.diagnostics,
            },
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_env("DOCMGR_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_workspace_config(config_path: Option<&Path>, root: Option<&Path>) -> Result<Config> {
    let mut cfg = match (config_path, root) {
        (Some(path), _) => config::load_config(path)?,
        (None, Some(root)) => Config::for_root(root),
        (None, None) => bail!("no workspace given; pass --root <dir> or --config <file>"),
    };
    if let Some(root) = root {
        cfg.workspace.root = root.to_path_buf();
    }
    Ok(cfg)
}

async fn open_workspace(cfg: Config, include_body: bool, cancel: &CancelToken) -> Result<Workspace> {
    let include_body = include_body || cfg.index.include_body;
    let mut ws = Workspace::new(WorkspaceContext::from_config(cfg))?;
    ws.init_index(IndexOptions { include_body }, cancel)
        .await
        .context("Failed to build index")?;
    Ok(ws)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Commands that don't need a workspace
    match &cli.command {
        Commands::Check { file } => {
            let doc = frontmatter::validate_file(file)?;
            println!(
                "ok {} ({})",
                file.display(),
                doc.title.as_deref().unwrap_or_default()
            );
            return Ok(());
        }
        Commands::Rewrite { file } => {
            let parsed = frontmatter::read_document(file)?;
            let Some(doc) = parsed.document else {
                bail!("{}: no frontmatter to rewrite", file.display());
            };
            frontmatter::write_document(file, &doc, &parsed.body)?;
            println!("rewrote {}", file.display());
            return Ok(());
        }
        _ => {}
    }

    let cfg = load_workspace_config(cli.config.as_deref(), cli.root.as_deref())?;
    let cancel = CancelToken::new();

    match cli.command {
        Commands::Index { include_body, json } => {
            let ws = open_workspace(cfg, include_body, &cancel).await?;
            let report = ws.ingest_report();
            if json {
                println!("{}", serde_json::to_string_pretty(ws.ingest_diagnostics())?);
            } else {
                println!("indexed {}", ws.context().root.display());
                println!("  docs:           {}", report.docs);
                println!("  parse failures: {}", report.parse_failures);
                println!("  related files:  {}", report.related_files);
                for diag in ws.ingest_diagnostics() {
                    println!("  [{}] {}", diag.severity, diag);
                }
            }
        }
        Commands::Query(args) => {
            let ws = open_workspace(cfg, args.include_body, &cancel).await?;
            let result = ws.query_docs(&args.to_query(), &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Stats { json } => {
            let ws = open_workspace(cfg, false, &cancel).await?;
            let stats = ws.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", format_stats(&stats));
            }
        }
        Commands::Check { .. } | Commands::Rewrite { .. } => {
            // Handled above
        }
    }

    Ok(())
}
