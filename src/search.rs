//! Query executor.
//!
//! Runs a compiled [`DocQuery`] against the index and turns rows into
//! [`DocHandle`]s. Primary rows are collected first; topics, owners and
//! related files are then hydrated per document with best-effort secondary
//! statements whose failures are logged and swallowed. Cancellation is
//! honored between rows and yields the handles collected so far.

use chrono::DateTime;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::diagnostics::{self, Severity, Symptom, Taxonomy};
use crate::error::WorkspaceError;
use crate::models::{Document, RelatedFile};
use crate::paths::PathResolver;
use crate::query::{DocHandle, DocQuery, DocQueryResult};
use crate::query_sql::{compile_doc_query, compile_with_parse_filter, ParseFilter, SqlArg};

/// Compile and run `q`. Validation errors surface before any SQL runs.
pub async fn execute_query(
    pool: &SqlitePool,
    q: &DocQuery,
    resolver: &PathResolver,
    fts_available: bool,
    cancel: &CancelToken,
) -> Result<DocQueryResult, WorkspaceError> {
    let compiled = compile_doc_query(q, resolver, fts_available)?;
    let want_diags = q.options.include_diagnostics;

    let mut diagnostics: Vec<Taxonomy> = if want_diags {
        compiled.diagnostics.clone()
    } else {
        Vec::new()
    };

    let rows = bind_args(sqlx::query(&compiled.sql), &compiled.args)
        .fetch_all(pool)
        .await?;

    let mut docs = Vec::with_capacity(rows.len());
    let mut cancelled = false;
    for row in &rows {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        docs.push(hydrate(pool, row, q.options.include_body).await?);
    }

    if cancelled {
        diagnostics.push(diagnostics::query_note(
            Symptom::Cancelled,
            Severity::Warning,
            "workspace.query",
            &format!("query cancelled after {} of {} rows", docs.len(), rows.len()),
        ));
    } else if want_diags && !q.options.include_errors {
        diagnostics.extend(skipped_due_to_parse(pool, q, resolver, fts_available).await?);
    }

    debug!(
        rows = docs.len(),
        fts = compiled.uses_fts,
        order_by = %q.options.order_by,
        "query executed"
    );

    Ok(DocQueryResult { docs, diagnostics })
}

fn bind_args<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &'q [SqlArg],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            SqlArg::Text(s) => query.bind(s.as_str()),
            SqlArg::Int(i) => query.bind(*i),
        };
    }
    query
}

async fn hydrate(
    pool: &SqlitePool,
    row: &SqliteRow,
    include_body: bool,
) -> Result<DocHandle, sqlx::Error> {
    let doc_id: i64 = row.try_get("doc_id")?;
    let path: String = row.try_get("path")?;
    let parse_ok: bool = row.try_get("parse_ok")?;

    if !parse_ok {
        let parse_err: Option<String> = row.try_get("parse_err")?;
        return Ok(DocHandle {
            path,
            document: None,
            body: None,
            read_err: Some(parse_err.unwrap_or_default()),
        });
    }

    let last_updated: Option<String> = row.try_get("last_updated")?;
    let mut doc = Document {
        title: row.try_get("title")?,
        ticket: row.try_get("ticket_id")?,
        status: row.try_get("status")?,
        doc_type: row.try_get("doc_type")?,
        intent: row.try_get("intent")?,
        what_for: row.try_get("what_for")?,
        when_to_use: row.try_get("when_to_use")?,
        last_updated: last_updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok()),
        ..Default::default()
    };

    // Secondary hydration; the primary row is returned regardless
    match sqlx::query_scalar::<_, String>(
        "SELECT topic_original FROM doc_topics WHERE doc_id = ? ORDER BY topic_lower",
    )
    .bind(doc_id)
    .fetch_all(pool)
    .await
    {
        Ok(topics) => doc.topics = topics,
        Err(err) => debug!(doc_id, error = %err, "topic hydration failed"),
    }

    match sqlx::query_scalar::<_, String>(
        "SELECT owner_original FROM doc_owners WHERE doc_id = ? ORDER BY owner_lower",
    )
    .bind(doc_id)
    .fetch_all(pool)
    .await
    {
        Ok(owners) => doc.owners = owners,
        Err(err) => debug!(doc_id, error = %err, "owner hydration failed"),
    }

    match sqlx::query_as::<_, (String, Option<String>)>(
        "SELECT raw_path, note FROM related_files WHERE doc_id = ? ORDER BY rf_id",
    )
    .bind(doc_id)
    .fetch_all(pool)
    .await
    {
        Ok(rows) => {
            doc.related_files = rows
                .into_iter()
                .map(|(path, note)| RelatedFile::new(path, note.unwrap_or_default()))
                .collect()
        }
        Err(err) => debug!(doc_id, error = %err, "related file hydration failed"),
    }

    let body = if include_body {
        row.try_get::<Option<String>, _>("body")?
    } else {
        None
    };

    Ok(DocHandle {
        path,
        document: Some(doc),
        body,
        read_err: None,
    })
}

/// Parse-failed rows the query would have matched with `include_errors`.
async fn skipped_due_to_parse(
    pool: &SqlitePool,
    q: &DocQuery,
    resolver: &PathResolver,
    fts_available: bool,
) -> Result<Vec<Taxonomy>, WorkspaceError> {
    let compiled = compile_with_parse_filter(q, resolver, fts_available, ParseFilter::Failed)?;
    let rows = bind_args(sqlx::query(&compiled.sql), &compiled.args)
        .fetch_all(pool)
        .await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let path: String = row.try_get("path")?;
        let parse_err: Option<String> = row.try_get("parse_err")?;
        out.push(diagnostics::query_skipped_parse(
            &path,
            parse_err.as_deref().unwrap_or_default(),
        ));
    }
    Ok(out)
}
