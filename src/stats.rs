//! Index statistics.
//!
//! Row counts for every index table plus the full-text capability bit. Used
//! by `docmgr-index stats` to confirm what a build picked up.

use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub docs: i64,
    pub parse_failures: i64,
    pub doc_topics: i64,
    pub doc_owners: i64,
    pub related_files: i64,
    pub fts_available: bool,
}

pub async fn index_stats(pool: &SqlitePool, fts_available: bool) -> Result<IndexStats, sqlx::Error> {
    let docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM docs")
        .fetch_one(pool)
        .await?;

    let parse_failures: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM docs WHERE parse_ok = 0")
        .fetch_one(pool)
        .await?;

    let doc_topics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_topics")
        .fetch_one(pool)
        .await?;

    let doc_owners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_owners")
        .fetch_one(pool)
        .await?;

    let related_files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM related_files")
        .fetch_one(pool)
        .await?;

    Ok(IndexStats {
        docs,
        parse_failures,
        doc_topics,
        doc_owners,
        related_files,
        fts_available,
    })
}

/// Human-readable summary, one count per line.
pub fn format_stats(stats: &IndexStats) -> String {
    let mut out = String::new();
    out.push_str("docmgr index\n");
    out.push_str("============\n");
    out.push_str(&format!("  docs:           {}\n", stats.docs));
    out.push_str(&format!("  parse failures: {}\n", stats.parse_failures));
    out.push_str(&format!("  topics:         {}\n", stats.doc_topics));
    out.push_str(&format!("  owners:         {}\n", stats.doc_owners));
    out.push_str(&format!("  related files:  {}\n", stats.related_files));
    out.push_str(&format!(
        "  full-text:      {}\n",
        if stats.fts_available { "yes" } else { "no" }
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate;

    #[tokio::test]
    async fn test_counts_empty_index() {
        let pool = db::connect_in_memory().await.unwrap();
        let fts = migrate::create_schema(&pool).await.unwrap();
        let stats = index_stats(&pool, fts).await.unwrap();
        assert_eq!(stats.docs, 0);
        assert_eq!(stats.related_files, 0);
        assert_eq!(stats.fts_available, fts);
    }

    #[test]
    fn test_format_stats() {
        let text = format_stats(&IndexStats {
            docs: 3,
            parse_failures: 1,
            ..Default::default()
        });
        assert!(text.contains("docs:           3"));
        assert!(text.contains("parse failures: 1"));
        assert!(text.contains("full-text:      no"));
    }
}
