//! Ingest pipeline.
//!
//! Walks the docs root, parses every Markdown file and loads the rows into
//! the in-memory index inside a single transaction: walker → frontmatter →
//! path tags → `docs`, `doc_topics`, `doc_owners`, `related_files` and,
//! when available, `docs_fts`. A file that cannot be read or parsed is
//! still indexed with `parse_ok = 0`; only database failures and
//! cancellation abort the build, and both roll the transaction back.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::VocabularyConfig;
use crate::dates::to_index_timestamp;
use crate::diagnostics::{self, Taxonomy};
use crate::error::WorkspaceError;
use crate::frontmatter::{self, ParsedFile};
use crate::models::{Document, PathTags};
use crate::paths::{absolute_slash, to_slash, PathResolver};
use crate::tags::{compute_path_tags, infer_ticket_id};
use crate::vocabulary;
use crate::walker::{WalkedFile, Walker};

const NO_FRONTMATTER: &str = "frontmatter delimiters '---' not found";

/// Options for one index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Store document bodies in `docs.body`.
    pub include_body: bool,
}

/// Counts and diagnostics from one index build.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub docs: u64,
    pub parse_failures: u64,
    pub related_files: u64,
    pub diagnostics: Vec<Taxonomy>,
}

/// Everything the pipeline needs besides the connection.
pub struct IngestContext<'a> {
    pub walker: &'a Walker,
    pub resolver: &'a PathResolver,
    pub options: IndexOptions,
    pub vocabulary: Option<&'a VocabularyConfig>,
    pub fts_available: bool,
}

/// Walk, parse and insert every document under the walker's root.
pub async fn build_index(
    pool: &SqlitePool,
    ctx: &IngestContext<'_>,
    cancel: &CancelToken,
) -> Result<IngestReport, WorkspaceError> {
    let started = Instant::now();
    let files = ctx.walker.walk(cancel)?;

    let mut report = IngestReport::default();
    let mut tx = pool.begin().await?;

    for file in &files {
        if cancel.is_cancelled() {
            tx.rollback().await?;
            return Err(WorkspaceError::Cancelled);
        }
        if let Err(err) = ingest_file(&mut tx, ctx, file, &mut report).await {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            return Err(match err {
                WorkspaceError::Database(db) => {
                    let file = absolute_slash(&file.path);
                    warn!(path = %file, error = %db, "index build failed");
                    diagnostics::index_build_failed(&file, &db.to_string())
                        .with_cause(db)
                        .into_error()
                        .into()
                }
                other => other,
            });
        }
    }

    tx.commit().await?;

    info!(
        root = %ctx.walker.root().display(),
        docs = report.docs,
        parse_failures = report.parse_failures,
        related_files = report.related_files,
        fts = ctx.fts_available,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "index built"
    );
    Ok(report)
}

/// Outcome of reading one file.
enum Parsed {
    Ok(ParsedFile),
    Failed(String),
}

fn parse_file(file: &WalkedFile, diags: &mut Vec<Taxonomy>) -> Parsed {
    if let Some(err) = &file.read_err {
        return Parsed::Failed(err.clone());
    }
    match frontmatter::read_document(&file.path) {
        Ok(parsed) if parsed.document.is_none() => Parsed::Failed(NO_FRONTMATTER.to_string()),
        Ok(parsed) => {
            diags.extend(parsed.diagnostics.iter().cloned());
            Parsed::Ok(parsed)
        }
        Err(err) => {
            if let Some(tax) = err.taxonomy() {
                diags.push(tax.clone());
            }
            Parsed::Failed(err.to_string())
        }
    }
}

async fn ingest_file(
    conn: &mut SqliteConnection,
    ctx: &IngestContext<'_>,
    file: &WalkedFile,
    report: &mut IngestReport,
) -> Result<(), WorkspaceError> {
    let abs = absolute_slash(&file.path);
    let tags = compute_path_tags(&file.path);

    let parsed = match parse_file(file, &mut report.diagnostics) {
        Parsed::Ok(parsed) => parsed,
        Parsed::Failed(parse_err) => {
            let rel = docs_relative(ctx.walker.root(), &file.path);
            let ticket = infer_ticket_id(&rel);
            insert_failed(conn, &abs, ticket.as_deref(), &parse_err, &tags).await?;
            report.docs += 1;
            report.parse_failures += 1;
            debug!(path = %abs, error = %parse_err, "indexed unparseable document");
            return Ok(());
        }
    };

    let ParsedFile { document, body, .. } = parsed;
    let doc = document.unwrap_or_default();

    let stored_body = ctx.options.include_body.then_some(body.as_str());
    let doc_id = insert_doc(conn, &abs, &doc, &tags, stored_body).await?;

    for topic in trimmed(&doc.topics) {
        sqlx::query(
            "INSERT OR IGNORE INTO doc_topics (doc_id, topic_lower, topic_original) VALUES (?, ?, ?)",
        )
        .bind(doc_id)
        .bind(topic.to_lowercase())
        .bind(topic)
        .execute(&mut *conn)
        .await?;
    }

    for owner in trimmed(&doc.owners) {
        sqlx::query(
            "INSERT OR IGNORE INTO doc_owners (doc_id, owner_lower, owner_original) VALUES (?, ?, ?)",
        )
        .bind(doc_id)
        .bind(owner.to_lowercase())
        .bind(owner)
        .execute(&mut *conn)
        .await?;
    }

    let doc_resolver = ctx.resolver.for_document(&file.path);
    for rf in &doc.related_files {
        let raw = rf.path.trim();
        if raw.is_empty() {
            continue;
        }
        let n = doc_resolver.normalize(raw);
        sqlx::query(
            r#"
            INSERT INTO related_files (
                doc_id, note, norm_canonical, norm_repo_rel, norm_docs_rel,
                norm_doc_rel, norm_abs, norm_clean, anchor, raw_path
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc_id)
        .bind(&rf.note)
        .bind(&n.canonical)
        .bind(&n.repo_rel)
        .bind(&n.docs_rel)
        .bind(&n.doc_rel)
        .bind(&n.abs)
        .bind(&n.clean)
        .bind(n.anchor.as_str())
        .bind(raw)
        .execute(&mut *conn)
        .await?;
        report.related_files += 1;

        if !n.exists {
            report
                .diagnostics
                .push(diagnostics::related_file_missing(&abs, raw, &rf.note));
        }
    }

    if ctx.fts_available {
        sqlx::query(
            "INSERT INTO docs_fts (rowid, title, body, topics, doc_type, ticket_id) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(doc_id)
        .bind(doc.title.as_deref().unwrap_or_default())
        .bind(&body)
        .bind(trimmed(&doc.topics).collect::<Vec<_>>().join(" "))
        .bind(doc.doc_type.as_deref().unwrap_or_default())
        .bind(doc.ticket.as_deref().map(str::trim).unwrap_or_default())
        .execute(&mut *conn)
        .await?;
    }

    if let Some(vocab) = ctx.vocabulary.filter(|v| !v.is_empty()) {
        report
            .diagnostics
            .extend(vocabulary::check_document(&abs, &doc, vocab));
    }

    report.docs += 1;
    debug!(path = %abs, doc_id, topics = doc.topics.len(), related = doc.related_files.len(), "indexed document");
    Ok(())
}

async fn insert_doc(
    conn: &mut SqliteConnection,
    abs: &str,
    doc: &Document,
    tags: &PathTags,
    body: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let last_updated = doc
        .last_updated
        .map(|t| to_index_timestamp(&t.with_timezone(&Utc)));
    let result = sqlx::query(
        r#"
        INSERT INTO docs (
            path, ticket_id, doc_type, status, intent, title, last_updated,
            what_for, when_to_use, parse_ok, parse_err,
            is_index, is_archived_path, is_scripts_path, is_sources_path, is_control_doc,
            body
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, NULL, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(abs)
    .bind(non_blank(&doc.ticket))
    .bind(non_blank(&doc.doc_type))
    .bind(non_blank(&doc.status))
    .bind(non_blank(&doc.intent))
    .bind(non_blank(&doc.title))
    .bind(last_updated)
    .bind(non_blank(&doc.what_for))
    .bind(non_blank(&doc.when_to_use))
    .bind(tags.is_index)
    .bind(tags.is_archived_path)
    .bind(tags.is_scripts_path)
    .bind(tags.is_sources_path)
    .bind(tags.is_control_doc)
    .bind(body)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_failed(
    conn: &mut SqliteConnection,
    abs: &str,
    ticket: Option<&str>,
    parse_err: &str,
    tags: &PathTags,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO docs (
            path, ticket_id, parse_ok, parse_err,
            is_index, is_archived_path, is_scripts_path, is_sources_path, is_control_doc
        ) VALUES (?, ?, 0, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(abs)
    .bind(ticket)
    .bind(parse_err)
    .bind(tags.is_index)
    .bind(tags.is_archived_path)
    .bind(tags.is_scripts_path)
    .bind(tags.is_sources_path)
    .bind(tags.is_control_doc)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn trimmed(values: &[String]) -> impl Iterator<Item = &str> {
    values.iter().map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn docs_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    to_slash(&rel.to_string_lossy())
}
