use sqlx::SqlitePool;
use tracing::debug;

/// Create the index schema. Returns whether the `docs_fts` full-text table
/// could be created (FTS5 compiled into the linked SQLite).
pub async fn create_schema(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    // One row per Markdown file found
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS docs (
            doc_id INTEGER PRIMARY KEY,
            path TEXT UNIQUE NOT NULL,
            ticket_id TEXT,
            doc_type TEXT,
            status TEXT,
            intent TEXT,
            title TEXT,
            last_updated TEXT,
            what_for TEXT,
            when_to_use TEXT,
            parse_ok INTEGER NOT NULL,
            parse_err TEXT,
            is_index INTEGER,
            is_archived_path INTEGER,
            is_scripts_path INTEGER,
            is_sources_path INTEGER,
            is_control_doc INTEGER,
            body TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_topics (
            doc_id INTEGER NOT NULL,
            topic_lower TEXT NOT NULL,
            topic_original TEXT NOT NULL,
            PRIMARY KEY (doc_id, topic_lower),
            FOREIGN KEY (doc_id) REFERENCES docs(doc_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_owners (
            doc_id INTEGER NOT NULL,
            owner_lower TEXT NOT NULL,
            owner_original TEXT NOT NULL,
            PRIMARY KEY (doc_id, owner_lower),
            FOREIGN KEY (doc_id) REFERENCES docs(doc_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS related_files (
            rf_id INTEGER PRIMARY KEY,
            doc_id INTEGER NOT NULL,
            note TEXT,
            norm_canonical TEXT,
            norm_repo_rel TEXT,
            norm_docs_rel TEXT,
            norm_doc_rel TEXT,
            norm_abs TEXT,
            norm_clean TEXT,
            anchor TEXT NOT NULL,
            raw_path TEXT NOT NULL,
            FOREIGN KEY (doc_id) REFERENCES docs(doc_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_docs_ticket_id ON docs(ticket_id)",
        "CREATE INDEX IF NOT EXISTS idx_docs_parse_ok ON docs(parse_ok)",
        "CREATE INDEX IF NOT EXISTS idx_docs_visibility ON docs(is_archived_path, is_scripts_path, is_control_doc)",
        "CREATE INDEX IF NOT EXISTS idx_doc_topics_topic_lower ON doc_topics(topic_lower)",
        "CREATE INDEX IF NOT EXISTS idx_doc_owners_owner_lower ON doc_owners(owner_lower)",
        "CREATE INDEX IF NOT EXISTS idx_related_files_doc_keys ON related_files(doc_id, norm_repo_rel, norm_abs)",
        "CREATE INDEX IF NOT EXISTS idx_related_files_repo_rel ON related_files(norm_repo_rel)",
        "CREATE INDEX IF NOT EXISTS idx_related_files_abs ON related_files(norm_abs)",
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(create_fts(pool).await)
}

/// Try to create the FTS5 table. Any failure means full-text is unavailable.
async fn create_fts(pool: &SqlitePool) -> bool {
    let result = sqlx::query(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS docs_fts USING fts5(
            title,
            body,
            topics,
            doc_type,
            ticket_id
        )
        "#,
    )
    .execute(pool)
    .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "fts5 unavailable; text queries fall back to title LIKE");
            false
        }
    }
}
