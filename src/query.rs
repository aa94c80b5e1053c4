//! Public query types.
//!
//! A [`DocQuery`] is a scope, a set of AND-combined filters and result
//! options. Visibility gates default to hiding archived, scripts and control
//! documents, and parse failures are excluded unless `include_errors` is set.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::diagnostics::Taxonomy;
use crate::error::QueryError;
use crate::models::Document;

/// Which documents a query ranges over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    /// Every document in the workspace.
    #[default]
    Repo,
    /// Documents whose ticket id equals `ticket_id` (trimmed).
    Ticket { ticket_id: String },
    /// Exactly one document, matched by its normalized absolute path.
    Doc { doc_path: String },
}

/// Optional filters, combined with AND. Empty lists are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocFilters {
    pub ticket: Option<String>,
    pub doc_type: Option<String>,
    pub status: Option<String>,
    /// Matches when any topic equals any of these, case-insensitively.
    pub topics_any: Vec<String>,
    /// Matches when any related file resolves to any of these paths.
    pub related_file: Vec<String>,
    /// Matches when any related file lies below any of these directories.
    pub related_dir: Vec<String>,
    pub text_query: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub created_since: Option<String>,
    pub updated_since: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    Path,
    LastUpdated,
    /// Full-text rank; falls back to path when full-text is unavailable.
    Rank,
}

impl FromStr for OrderBy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "path" => Ok(OrderBy::Path),
            "last_updated" | "last-updated" | "lastupdated" => Ok(OrderBy::LastUpdated),
            "rank" => Ok(OrderBy::Rank),
            _ => Err(QueryError::UnsupportedOrderBy(s.to_string())),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderBy::Path => "path",
            OrderBy::LastUpdated => "last_updated",
            OrderBy::Rank => "rank",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocQueryOptions {
    pub include_body: bool,
    pub include_errors: bool,
    pub order_by: OrderBy,
    pub reverse: bool,
    pub include_archived_path: bool,
    pub include_scripts_path: bool,
    pub include_control_docs: bool,
    pub include_diagnostics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocQuery {
    pub scope: Scope,
    pub filters: DocFilters,
    pub options: DocQueryOptions,
}

impl DocQuery {
    pub fn repo() -> Self {
        Self::default()
    }

    pub fn ticket(ticket_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Ticket {
                ticket_id: ticket_id.into(),
            },
            ..Default::default()
        }
    }

    pub fn doc(doc_path: impl Into<String>) -> Self {
        Self {
            scope: Scope::Doc {
                doc_path: doc_path.into(),
            },
            ..Default::default()
        }
    }
}

/// One result row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocHandle {
    /// Absolute forward-slash path.
    pub path: String,
    /// Absent for rows whose frontmatter failed to parse.
    pub document: Option<Document>,
    pub body: Option<String>,
    pub read_err: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocQueryResult {
    pub docs: Vec<DocHandle>,
    pub diagnostics: Vec<Taxonomy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_from_str() {
        assert_eq!("".parse::<OrderBy>(), Ok(OrderBy::Path));
        assert_eq!("Last_Updated".parse::<OrderBy>(), Ok(OrderBy::LastUpdated));
        assert_eq!("rank".parse::<OrderBy>(), Ok(OrderBy::Rank));
        assert_eq!(
            "size".parse::<OrderBy>(),
            Err(QueryError::UnsupportedOrderBy("size".into()))
        );
    }

    #[test]
    fn test_defaults_hide_gated_categories() {
        let q = DocQuery::ticket("MEN-1");
        assert!(!q.options.include_control_docs);
        assert!(!q.options.include_archived_path);
        assert!(!q.options.include_scripts_path);
        assert!(!q.options.include_errors);
        assert_eq!(q.options.order_by, OrderBy::Path);
    }
}
