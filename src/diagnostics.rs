//! Structured diagnostics ("taxonomies").
//!
//! Every soft failure the engine observes is reported as a [`Taxonomy`]
//! value: which stage produced it, what the symptom was, the subject path,
//! a severity, a stage-specific [`DiagnosticContext`] payload and an optional
//! underlying cause. Taxonomies travel alongside results (ingest and query
//! diagnostics) or inside errors via [`TaxonomyError`], from which callers
//! recover them with [`find_taxonomy`].
//!
//! Rendering diagnostics for humans or machines is left to the caller; the
//! types here derive `Serialize` so they can be emitted as JSON directly.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Identifier stamped on every taxonomy produced by this crate.
pub const TOOL: &str = "docmgr";

/// Pipeline stage where a problem was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    #[serde(rename = "frontmatter.parse")]
    FrontmatterParse,
    #[serde(rename = "related_files")]
    RelatedFiles,
    #[serde(rename = "vocabulary")]
    Vocabulary,
    #[serde(rename = "workspace")]
    Workspace,
    #[serde(rename = "workspace.query")]
    WorkspaceQuery,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FrontmatterParse => "frontmatter.parse",
            Stage::RelatedFiles => "related_files",
            Stage::Vocabulary => "vocabulary",
            Stage::Workspace => "workspace",
            Stage::WorkspaceQuery => "workspace.query",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong, scoped by [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    // frontmatter.parse
    YamlSyntax,
    SchemaViolation,
    MissingClosingDelimiter,
    // related_files
    MissingFile,
    // vocabulary
    UnknownValue,
    // workspace
    IndexBuildFailed,
    // workspace.query
    QuerySkippedDueToParse,
    QueryNormalizationFallback,
    ContradictoryScopeAndFilter,
    InvalidQuery,
    FtsUnavailable,
    Cancelled,
}

impl Symptom {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symptom::YamlSyntax => "yaml_syntax",
            Symptom::SchemaViolation => "schema_violation",
            Symptom::MissingClosingDelimiter => "missing_closing_delimiter",
            Symptom::MissingFile => "missing_file",
            Symptom::UnknownValue => "unknown_value",
            Symptom::IndexBuildFailed => "index_build_failed",
            Symptom::QuerySkippedDueToParse => "query_skipped_due_to_parse",
            Symptom::QueryNormalizationFallback => "query_normalization_fallback",
            Symptom::ContradictoryScopeAndFilter => "contradictory_scope_and_filter",
            Symptom::InvalidQuery => "invalid_query",
            Symptom::FtsUnavailable => "fts_unavailable",
            Symptom::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Symptom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

// ============ Context payloads ============

/// YAML syntax failure inside a frontmatter block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontmatterParseContext {
    pub file: String,
    /// 1-based file line, 0 when unknown.
    pub line: usize,
    /// 1-based column, 0 when unknown.
    pub column: usize,
    pub snippet: String,
    pub problem: String,
    pub fixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontmatterSchemaContext {
    pub file: String,
    pub field: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedFileContext {
    pub doc_path: String,
    pub file_path: String,
    pub note: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabularyContext {
    pub file: String,
    pub field: String,
    pub value: String,
    pub known: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceQuerySkipContext {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceQueryNormalizationContext {
    /// `"file"` or `"dir"`.
    pub kind: String,
    pub input: String,
    pub note: String,
}

/// Free-form note for conditions that carry no structured payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteContext {
    pub subject: String,
    pub note: String,
}

/// Stage-specific payload of a [`Taxonomy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticContext {
    FrontmatterParse(FrontmatterParseContext),
    FrontmatterSchema(FrontmatterSchemaContext),
    RelatedFile(RelatedFileContext),
    Vocabulary(VocabularyContext),
    WorkspaceQuerySkip(WorkspaceQuerySkipContext),
    WorkspaceQueryNormalization(WorkspaceQueryNormalizationContext),
    Note(NoteContext),
}

impl DiagnosticContext {
    /// One-line human summary of the payload.
    pub fn summary(&self) -> String {
        match self {
            DiagnosticContext::FrontmatterParse(c) => {
                let mut loc = String::new();
                if c.line > 0 {
                    loc = format!(":{}", c.line);
                    if c.column > 0 {
                        loc.push_str(&format!(":{}", c.column));
                    }
                }
                format!("{}{} {}", c.file, loc, c.problem)
            }
            DiagnosticContext::FrontmatterSchema(c) => {
                format!("{}: {} ({})", c.file, c.field, c.detail)
            }
            DiagnosticContext::RelatedFile(c) => {
                let status = if c.exists { "present" } else { "missing" };
                format!("{}: related file {:?} ({})", c.doc_path, c.file_path, status)
            }
            DiagnosticContext::Vocabulary(c) => {
                format!("{}: field {} unknown value {:?}", c.file, c.field, c.value)
            }
            DiagnosticContext::WorkspaceQuerySkip(c) => {
                format!("query skipped {}: {}", c.file, c.reason)
            }
            DiagnosticContext::WorkspaceQueryNormalization(c) => format!(
                "query normalization fallback ({}) for {:?}: {}",
                c.kind, c.input, c.note
            ),
            DiagnosticContext::Note(c) => format!("{}: {}", c.subject, c.note),
        }
    }
}

// ============ Taxonomy ============

/// Underlying error attached to a taxonomy.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// A structured diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Taxonomy {
    pub tool: &'static str,
    pub stage: Stage,
    pub symptom: Symptom,
    pub path: String,
    pub severity: Severity,
    pub context: DiagnosticContext,
    #[serde(serialize_with = "serialize_cause")]
    pub cause: Option<Cause>,
}

fn serialize_cause<S: Serializer>(cause: &Option<Cause>, s: S) -> Result<S::Ok, S::Error> {
    match cause {
        Some(c) => s.serialize_some(&c.to_string()),
        None => s.serialize_none(),
    }
}

impl PartialEq for Taxonomy {
    fn eq(&self, other: &Self) -> bool {
        self.tool == other.tool
            && self.stage == other.stage
            && self.symptom == other.symptom
            && self.path == other.path
            && self.severity == other.severity
            && self.context == other.context
    }
}

impl Taxonomy {
    pub fn new(
        stage: Stage,
        symptom: Symptom,
        path: impl Into<String>,
        severity: Severity,
        context: DiagnosticContext,
    ) -> Self {
        Self {
            tool: TOOL,
            stage,
            symptom,
            path: path.into(),
            severity,
            context,
            cause: None,
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn summary(&self) -> String {
        self.context.summary()
    }

    /// Wrap into an error value that participates in error chains.
    pub fn into_error(self) -> TaxonomyError {
        TaxonomyError(Box::new(self))
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.stage, self.symptom, self.summary())
    }
}

// ============ Constructors ============

pub fn frontmatter_parse(
    file: &str,
    line: usize,
    column: usize,
    snippet: String,
    problem: String,
    fixes: Vec<String>,
) -> Taxonomy {
    Taxonomy::new(
        Stage::FrontmatterParse,
        Symptom::YamlSyntax,
        file,
        Severity::Error,
        DiagnosticContext::FrontmatterParse(FrontmatterParseContext {
            file: file.to_string(),
            line,
            column,
            snippet,
            problem,
            fixes,
        }),
    )
}

pub fn frontmatter_schema(file: &str, field: &str, detail: impl Into<String>) -> Taxonomy {
    Taxonomy::new(
        Stage::FrontmatterParse,
        Symptom::SchemaViolation,
        field,
        Severity::Warning,
        DiagnosticContext::FrontmatterSchema(FrontmatterSchemaContext {
            file: file.to_string(),
            field: field.to_string(),
            detail: detail.into(),
        }),
    )
}

pub fn missing_closing_delimiter(file: &str) -> Taxonomy {
    Taxonomy::new(
        Stage::FrontmatterParse,
        Symptom::MissingClosingDelimiter,
        file,
        Severity::Warning,
        DiagnosticContext::FrontmatterSchema(FrontmatterSchemaContext {
            file: file.to_string(),
            field: "---".to_string(),
            detail: "closing frontmatter delimiter not found; treating the file as body"
                .to_string(),
        }),
    )
}

pub fn related_file_missing(doc_path: &str, file_path: &str, note: &str) -> Taxonomy {
    Taxonomy::new(
        Stage::RelatedFiles,
        Symptom::MissingFile,
        file_path,
        Severity::Warning,
        DiagnosticContext::RelatedFile(RelatedFileContext {
            doc_path: doc_path.to_string(),
            file_path: file_path.to_string(),
            note: note.to_string(),
            exists: false,
        }),
    )
}

pub fn vocabulary_unknown(file: &str, field: &str, value: &str, known: Vec<String>) -> Taxonomy {
    Taxonomy::new(
        Stage::Vocabulary,
        Symptom::UnknownValue,
        field,
        Severity::Warning,
        DiagnosticContext::Vocabulary(VocabularyContext {
            file: file.to_string(),
            field: field.to_string(),
            value: value.to_string(),
            known,
        }),
    )
}

pub fn query_skipped_parse(file: &str, reason: &str) -> Taxonomy {
    Taxonomy::new(
        Stage::WorkspaceQuery,
        Symptom::QuerySkippedDueToParse,
        file,
        Severity::Warning,
        DiagnosticContext::WorkspaceQuerySkip(WorkspaceQuerySkipContext {
            file: file.to_string(),
            reason: reason.to_string(),
        }),
    )
}

pub fn query_normalization_fallback(kind: &str, input: &str, note: &str) -> Taxonomy {
    Taxonomy::new(
        Stage::WorkspaceQuery,
        Symptom::QueryNormalizationFallback,
        input,
        Severity::Warning,
        DiagnosticContext::WorkspaceQueryNormalization(WorkspaceQueryNormalizationContext {
            kind: kind.to_string(),
            input: input.to_string(),
            note: note.to_string(),
        }),
    )
}

/// The index build was aborted by a database failure while ingesting `file`.
pub fn index_build_failed(file: &str, note: &str) -> Taxonomy {
    Taxonomy::new(
        Stage::Workspace,
        Symptom::IndexBuildFailed,
        file,
        Severity::Error,
        DiagnosticContext::Note(NoteContext {
            subject: file.to_string(),
            note: note.to_string(),
        }),
    )
}

/// A query-stage condition described by a plain note.
pub fn query_note(symptom: Symptom, severity: Severity, subject: &str, note: &str) -> Taxonomy {
    Taxonomy::new(
        Stage::WorkspaceQuery,
        symptom,
        subject,
        severity,
        DiagnosticContext::Note(NoteContext {
            subject: subject.to_string(),
            note: note.to_string(),
        }),
    )
}

// ============ Error-chain integration ============

/// Error carrying a [`Taxonomy`]. `source()` yields the taxonomy's cause.
#[derive(Debug, Clone)]
pub struct TaxonomyError(pub Box<Taxonomy>);

impl TaxonomyError {
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.0
    }
}

impl fmt::Display for TaxonomyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "taxonomy: {}", self.0)
    }
}

impl StdError for TaxonomyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0
            .cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<Taxonomy> for TaxonomyError {
    fn from(t: Taxonomy) -> Self {
        t.into_error()
    }
}

/// Walk an error chain and return the first taxonomy found.
pub fn find_taxonomy<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Taxonomy> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(te) = e.downcast_ref::<TaxonomyError>() {
            return Some(te.taxonomy());
        }
        current = e.source();
    }
    None
}
