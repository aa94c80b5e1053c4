//! Error types for the workspace engine.
//!
//! Construction, ingest and query failures are typed so callers can match on
//! them; query errors additionally map onto a [`Taxonomy`] so an external
//! renderer can treat them like any other diagnostic.

use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::{self, Severity, Symptom, Taxonomy, TaxonomyError};

/// Failures of the workspace facade and ingest pipeline.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace {0} is required")]
    MissingPath(&'static str),

    #[error("docs root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("index not initialized; call init_index first")]
    IndexNotInitialized,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid exclude glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("operation cancelled")]
    Cancelled,

    /// Invalid query. `taxonomy` is the error's diagnostic form and is the
    /// `source()` of this variant, so it survives wrapping.
    #[error("{error}")]
    Query {
        error: QueryError,
        #[source]
        taxonomy: TaxonomyError,
    },

    #[error("{}", .0.taxonomy())]
    Diagnostic(#[from] TaxonomyError),
}

impl From<QueryError> for WorkspaceError {
    fn from(error: QueryError) -> Self {
        let taxonomy = error.taxonomy().into_error();
        WorkspaceError::Query { error, taxonomy }
    }
}

impl WorkspaceError {
    /// Taxonomy payload describing this error, when one applies.
    pub fn taxonomy(&self) -> Option<Taxonomy> {
        match self {
            WorkspaceError::Query { taxonomy, .. } => Some(taxonomy.taxonomy().clone()),
            WorkspaceError::Diagnostic(t) => Some(t.taxonomy().clone()),
            WorkspaceError::Cancelled => Some(diagnostics::query_note(
                Symptom::Cancelled,
                Severity::Warning,
                "workspace",
                "operation cancelled",
            )),
            _ => None,
        }
    }
}

/// Query validation failures. Raised before any SQL is executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("scope ticket {scope:?} contradicts filter ticket {filter:?}")]
    ContradictoryScopeAndFilter { scope: String, filter: String },

    #[error("ticket scope requires a non-empty ticket id")]
    EmptyScopeTicket,

    #[error("doc scope requires a non-empty doc path")]
    EmptyDocPath,

    #[error("doc scope path {0:?} could not be normalized to an absolute path")]
    InvalidDocPath(String),

    #[error("unsupported order_by {0:?} (expected path, last_updated or rank)")]
    UnsupportedOrderBy(String),

    #[error("invalid date {input:?} for {field}")]
    InvalidDate { field: &'static str, input: String },
}

impl QueryError {
    pub fn taxonomy(&self) -> Taxonomy {
        let symptom = match self {
            QueryError::ContradictoryScopeAndFilter { .. } => Symptom::ContradictoryScopeAndFilter,
            _ => Symptom::InvalidQuery,
        };
        let subject = match self {
            QueryError::ContradictoryScopeAndFilter { .. } => "ticket".to_string(),
            QueryError::EmptyScopeTicket => "scope.ticket".to_string(),
            QueryError::EmptyDocPath | QueryError::InvalidDocPath(_) => "scope.doc_path".to_string(),
            QueryError::UnsupportedOrderBy(_) => "options.order_by".to_string(),
            QueryError::InvalidDate { field, .. } => format!("filters.{}", field),
        };
        diagnostics::query_note(symptom, Severity::Error, &subject, &self.to_string())
    }
}

/// Failures reading or decoding a single frontmatter file.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frontmatter parse failed: {0}")]
    Parse(#[source] TaxonomyError),

    #[error("frontmatter validation failed: {0}")]
    Invalid(#[source] TaxonomyError),

    #[error("failed to serialize frontmatter: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

impl FrontmatterError {
    pub fn taxonomy(&self) -> Option<&Taxonomy> {
        match self {
            FrontmatterError::Parse(t) | FrontmatterError::Invalid(t) => Some(t.taxonomy()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{find_taxonomy, Stage};

    #[test]
    fn test_contradictory_query_maps_to_taxonomy() {
        let err = QueryError::ContradictoryScopeAndFilter {
            scope: "MEN-1".into(),
            filter: "MEN-2".into(),
        };
        let tax = err.taxonomy();
        assert_eq!(tax.stage, Stage::WorkspaceQuery);
        assert_eq!(tax.symptom, Symptom::ContradictoryScopeAndFilter);
        assert_eq!(tax.severity, Severity::Error);
    }

    #[test]
    fn test_frontmatter_parse_error_is_found_in_chain() {
        let tax = diagnostics::frontmatter_parse("a.md", 3, 0, String::new(), "x".into(), vec![]);
        let err = FrontmatterError::Parse(tax.into_error());
        let found = find_taxonomy(&err).expect("taxonomy");
        assert_eq!(found.symptom, Symptom::YamlSyntax);
        assert_eq!(err.taxonomy().map(|t| t.path.as_str()), Some("a.md"));
    }

    #[test]
    fn test_workspace_error_wraps_query_taxonomy() {
        let err = WorkspaceError::from(QueryError::UnsupportedOrderBy("size".into()));
        let tax = err.taxonomy().expect("taxonomy");
        assert_eq!(tax.symptom, Symptom::InvalidQuery);
        assert_eq!(tax.path, "options.order_by");
    }

    #[test]
    fn test_query_taxonomy_survives_anyhow_wrapping() {
        let err = WorkspaceError::from(QueryError::ContradictoryScopeAndFilter {
            scope: "MEN-1".into(),
            filter: "MEN-2".into(),
        });
        assert_eq!(
            find_taxonomy(&err).map(|t| t.symptom),
            Some(Symptom::ContradictoryScopeAndFilter)
        );
        assert!(err.to_string().contains("contradicts"));

        let wrapped = anyhow::Error::new(err).context("query failed");
        let chained: &(dyn std::error::Error + 'static) = wrapped.as_ref();
        let found = find_taxonomy(chained).expect("taxonomy through anyhow");
        assert_eq!(found.stage, Stage::WorkspaceQuery);
        assert_eq!(found.path, "ticket");
    }

    #[test]
    fn test_diagnostic_variant_is_found_in_chain() {
        let tax = diagnostics::index_build_failed("a.md", "disk full");
        let err = WorkspaceError::from(tax.into_error());
        assert_eq!(
            find_taxonomy(&err).map(|t| t.symptom),
            Some(Symptom::IndexBuildFailed)
        );
    }
}
