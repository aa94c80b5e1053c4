//! Query compiler: [`DocQuery`] to a parameterized SELECT over `docs`.
//!
//! The WHERE clause is seeded with the visibility gates and the parse-state
//! predicate, then the scope, then one predicate per non-empty filter.
//! Related-file and related-dir filters compare the query's normalized keys
//! against every persisted key column in a single EXISTS sub-query.
//! Validation errors are raised here, before any SQL runs.

use crate::dates;
use crate::diagnostics::{self, Severity, Symptom, Taxonomy};
use crate::error::QueryError;
use crate::paths::{clean_path, Anchor, PathResolver};
use crate::query::{DocQuery, OrderBy, Scope};

/// Persisted key columns of `related_files` compared by path filters.
const RELATED_KEY_COLUMNS: [&str; 7] = [
    "rf.norm_canonical",
    "rf.norm_repo_rel",
    "rf.norm_docs_rel",
    "rf.norm_doc_rel",
    "rf.norm_abs",
    "rf.norm_clean",
    "rf.raw_path",
];

/// A positional SQL argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Text(String),
    Int(i64),
}

/// Compiled statement plus compile-time diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<SqlArg>,
    pub diagnostics: Vec<Taxonomy>,
    /// Whether the statement joins `docs_fts`.
    pub uses_fts: bool,
}

/// Parse-state predicate applied by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFilter {
    Any,
    Ok,
    Failed,
}

/// Compile `q` with the parse-state predicate implied by its options.
pub fn compile_doc_query(
    q: &DocQuery,
    resolver: &PathResolver,
    fts_available: bool,
) -> Result<CompiledQuery, QueryError> {
    let parse = if q.options.include_errors {
        ParseFilter::Any
    } else {
        ParseFilter::Ok
    };
    compile_with_parse_filter(q, resolver, fts_available, parse)
}

pub fn compile_with_parse_filter(
    q: &DocQuery,
    resolver: &PathResolver,
    fts_available: bool,
    parse: ParseFilter,
) -> Result<CompiledQuery, QueryError> {
    let filter_ticket = non_empty(q.filters.ticket.as_deref());

    // Validate before building anything
    match &q.scope {
        Scope::Ticket { ticket_id } => {
            let scope_ticket = ticket_id.trim();
            if scope_ticket.is_empty() {
                return Err(QueryError::EmptyScopeTicket);
            }
            if let Some(filter) = filter_ticket {
                if filter != scope_ticket {
                    return Err(QueryError::ContradictoryScopeAndFilter {
                        scope: scope_ticket.to_string(),
                        filter: filter.to_string(),
                    });
                }
            }
        }
        Scope::Doc { doc_path } if doc_path.trim().is_empty() => {
            return Err(QueryError::EmptyDocPath);
        }
        _ => {}
    }

    let mut b = Builder::default();

    // Visibility defaults
    if !q.options.include_archived_path {
        b.push("d.is_archived_path = 0");
    }
    if !q.options.include_scripts_path {
        b.push("d.is_scripts_path = 0");
    }
    if !q.options.include_control_docs {
        b.push("d.is_control_doc = 0");
    }
    match parse {
        ParseFilter::Any => {}
        ParseFilter::Ok => b.push_arg("d.parse_ok = ?", SqlArg::Int(1)),
        ParseFilter::Failed => b.push_arg("d.parse_ok = ?", SqlArg::Int(0)),
    }

    // Scope
    match &q.scope {
        Scope::Repo => {}
        Scope::Ticket { ticket_id } => {
            b.push_arg("d.ticket_id = ?", SqlArg::Text(ticket_id.trim().to_string()))
        }
        Scope::Doc { doc_path } => {
            let n = resolver.normalize(doc_path);
            if n.abs.is_empty() {
                return Err(QueryError::InvalidDocPath(doc_path.clone()));
            }
            b.push_arg("d.path = ?", SqlArg::Text(clean_path(&n.abs)));
        }
    }

    // Filters
    if let Some(ticket) = filter_ticket {
        if !matches!(q.scope, Scope::Ticket { .. }) {
            b.push_arg("d.ticket_id = ?", SqlArg::Text(ticket.to_string()));
        }
    }
    if let Some(doc_type) = non_empty(q.filters.doc_type.as_deref()) {
        b.push_arg("d.doc_type = ?", SqlArg::Text(doc_type.to_string()));
    }
    if let Some(status) = non_empty(q.filters.status.as_deref()) {
        b.push_arg("d.status = ?", SqlArg::Text(status.to_string()));
    }

    let topics = lower_unique(&q.filters.topics_any);
    if !topics.is_empty() {
        b.push_args(
            format!(
                "EXISTS (SELECT 1 FROM doc_topics t WHERE t.doc_id = d.doc_id AND t.topic_lower IN ({}))",
                placeholders(topics.len())
            ),
            topics.into_iter().map(SqlArg::Text),
        );
    }

    if !q.filters.related_file.is_empty() {
        let keys = query_path_keys(resolver, &q.filters.related_file, "file", &mut b.diagnostics);
        let suffixes = basename_suffix_patterns(&q.filters.related_file);
        if !keys.is_empty() {
            let (clause, args) = related_file_clause(&keys, &suffixes);
            b.push_args(clause, args);
        }
    }

    if !q.filters.related_dir.is_empty() {
        let keys = query_path_keys(resolver, &q.filters.related_dir, "dir", &mut b.diagnostics);
        let prefixes = unique(
            keys.iter()
                .map(|k| k.trim_end_matches('/'))
                .filter(|k| !k.is_empty())
                .map(|k| format!("{}/%", escape_like(k))),
        );
        if !prefixes.is_empty() {
            let (clause, args) = related_dir_clause(&prefixes);
            b.push_args(clause, args);
        }
    }

    let mut join_fts = false;
    if let Some(text) = non_empty(q.filters.text_query.as_deref()) {
        if fts_available {
            let fts_query = fts_match_expression(text);
            if !fts_query.is_empty() {
                join_fts = true;
                b.push_arg("docs_fts MATCH ?", SqlArg::Text(fts_query));
            }
        } else {
            b.diagnostics.push(diagnostics::query_note(
                Symptom::FtsUnavailable,
                Severity::Info,
                "filters.text_query",
                "full-text search unavailable; matching text against titles only",
            ));
            b.push_arg(
                "d.title LIKE ? ESCAPE '\\'",
                SqlArg::Text(format!("%{}%", escape_like(text))),
            );
        }
    }

    // Time ranges
    for (field, value, op) in [
        ("since", &q.filters.since, ">="),
        ("created_since", &q.filters.created_since, ">="),
        ("updated_since", &q.filters.updated_since, ">="),
        ("until", &q.filters.until, "<="),
    ] {
        let Some(input) = non_empty(value.as_deref()) else {
            continue;
        };
        let bound = dates::parse_date(input).ok_or_else(|| QueryError::InvalidDate {
            field,
            input: input.to_string(),
        })?;
        b.push_arg(
            format!("d.last_updated {} ?", op),
            SqlArg::Text(dates::to_index_timestamp(&bound)),
        );
    }

    // Order
    let order_expr = match q.options.order_by {
        OrderBy::Path => "d.path",
        OrderBy::LastUpdated => "d.last_updated",
        OrderBy::Rank if join_fts => "bm25(docs_fts)",
        OrderBy::Rank => {
            if !fts_available {
                b.diagnostics.push(diagnostics::query_note(
                    Symptom::FtsUnavailable,
                    Severity::Info,
                    "options.order_by",
                    "rank ordering needs full-text search; ordering by path",
                ));
            }
            "d.path"
        }
    };
    let order_dir = if q.options.reverse { "DESC" } else { "ASC" };

    let mut sql = String::from(
        "SELECT\n  d.doc_id,\n  d.path,\n  d.ticket_id,\n  d.doc_type,\n  d.status,\n  d.intent,\n  d.title,\n  d.last_updated,\n  d.what_for,\n  d.when_to_use,\n  d.parse_ok,\n  d.parse_err,\n  d.body\nFROM docs d\n",
    );
    if join_fts {
        sql.push_str("JOIN docs_fts ON docs_fts.rowid = d.doc_id\n");
    }
    if !b.clauses.is_empty() {
        sql.push_str("WHERE ");
        sql.push_str(&b.clauses.join("\n  AND "));
        sql.push('\n');
    }
    sql.push_str(&format!("ORDER BY {} {}", order_expr, order_dir));
    if order_expr != "d.path" {
        sql.push_str(", d.path ASC");
    }

    Ok(CompiledQuery {
        sql,
        args: b.args,
        diagnostics: b.diagnostics,
        uses_fts: join_fts,
    })
}

#[derive(Default)]
struct Builder {
    clauses: Vec<String>,
    args: Vec<SqlArg>,
    diagnostics: Vec<Taxonomy>,
}

impl Builder {
    fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    fn push_arg(&mut self, clause: impl Into<String>, arg: SqlArg) {
        self.clauses.push(clause.into());
        self.args.push(arg);
    }

    fn push_args(&mut self, clause: impl Into<String>, args: impl IntoIterator<Item = SqlArg>) {
        self.clauses.push(clause.into());
        self.args.extend(args);
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn unique(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn lower_unique(values: &[String]) -> Vec<String> {
    unique(
        values
            .iter()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty()),
    )
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Union of the normalized keys of every raw input. Inputs that no anchor
/// could resolve are reported as normalization fallbacks.
fn query_path_keys(
    resolver: &PathResolver,
    raws: &[String],
    kind: &str,
    diags: &mut Vec<Taxonomy>,
) -> Vec<String> {
    let mut keys = Vec::new();
    for raw in raws {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let n = resolver.normalize(raw);
        if n.anchor == Anchor::Unresolved {
            diags.push(diagnostics::query_normalization_fallback(
                kind,
                raw,
                "no anchor resolved the path; matching on the cleaned input only",
            ));
        }
        keys.extend(n.keys());
    }
    unique(keys)
}

/// `%/<basename>` LIKE patterns for inputs without any path separator.
fn basename_suffix_patterns(raws: &[String]) -> Vec<String> {
    unique(raws.iter().filter_map(|raw| {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains('/') || raw.contains('\\') {
            return None;
        }
        let base = clean_path(raw);
        if base == "." || base == ".." {
            return None;
        }
        Some(format!("%/{}", escape_like(&base)))
    }))
}

fn related_file_clause(keys: &[String], suffixes: &[String]) -> (String, Vec<SqlArg>) {
    let in_list = placeholders(keys.len());
    let mut parts = Vec::new();
    let mut args = Vec::new();
    for col in RELATED_KEY_COLUMNS {
        let mut ors = vec![format!("{} IN ({})", col, in_list)];
        args.extend(keys.iter().cloned().map(SqlArg::Text));
        for suffix in suffixes {
            ors.push(format!("{} LIKE ? ESCAPE '\\'", col));
            args.push(SqlArg::Text(suffix.clone()));
        }
        parts.push(format!("({})", ors.join(" OR ")));
    }
    (
        format!(
            "EXISTS (SELECT 1 FROM related_files rf WHERE rf.doc_id = d.doc_id AND ({}))",
            parts.join(" OR ")
        ),
        args,
    )
}

fn related_dir_clause(prefixes: &[String]) -> (String, Vec<SqlArg>) {
    let mut parts = Vec::new();
    let mut args = Vec::new();
    for col in RELATED_KEY_COLUMNS {
        let likes: Vec<String> = prefixes
            .iter()
            .map(|_| format!("{} LIKE ? ESCAPE '\\'", col))
            .collect();
        args.extend(prefixes.iter().cloned().map(SqlArg::Text));
        parts.push(format!("({})", likes.join(" OR ")));
    }
    (
        format!(
            "EXISTS (SELECT 1 FROM related_files rf WHERE rf.doc_id = d.doc_id AND ({}))",
            parts.join(" OR ")
        ),
        args,
    )
}

/// Escape LIKE wildcards for use with `ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quote each whitespace-separated token so user input is never parsed as
/// FTS5 syntax. Tokens are implicitly AND-ed.
pub fn fts_match_expression(text: &str) -> String {
    text.split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}
