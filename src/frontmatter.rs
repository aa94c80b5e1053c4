//! Frontmatter reader and writer.
//!
//! A document is a Markdown file that starts with a `---` line, followed by a
//! YAML block, a closing `---` line and the body. Reading yields a
//! [`ParsedFile`]: the decoded [`Document`] (absent when the file has no
//! frontmatter), the body, and any non-fatal diagnostics. Malformed YAML is
//! fatal for the file and surfaces as [`FrontmatterError::Parse`] carrying a
//! `yaml_syntax` taxonomy with the file line, a snippet and suggested fixes.
//!
//! Field decoding is lenient: wrong shapes become `schema_violation`
//! warnings, and `RelatedFiles` accepts both scalar and mapping entries.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::diagnostics::{self, Taxonomy};
use crate::error::FrontmatterError;
use crate::models::{Document, RelatedFile};

/// File line where the YAML block starts (the line after the opening `---`).
const FM_START_LINE: usize = 2;

/// Result of reading one Markdown file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// `None` when the file has no opening delimiter.
    pub document: Option<Document>,
    pub body: String,
    /// Warnings: schema violations, missing closing delimiter.
    pub diagnostics: Vec<Taxonomy>,
}

/// Read and parse a Markdown file from disk.
pub fn read_document(path: &Path) -> Result<ParsedFile, FrontmatterError> {
    let content = std::fs::read_to_string(path).map_err(|source| FrontmatterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&path.to_string_lossy(), &content)
}

/// Parse Markdown `content`; `file` labels diagnostics.
pub fn parse_document(file: &str, content: &str) -> Result<ParsedFile, FrontmatterError> {
    let content = content.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = content.split('\n').collect();

    let opens = lines
        .first()
        .map(|l| l.trim_end() == "---")
        .unwrap_or(false);
    if !opens {
        return Ok(ParsedFile {
            document: None,
            body: content.to_string(),
            diagnostics: Vec::new(),
        });
    }

    let close = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim() == "---")
        .map(|(i, _)| i);

    let Some(close) = close else {
        return Ok(ParsedFile {
            document: Some(Document::default()),
            body: lines[1..].join("\n"),
            diagnostics: vec![diagnostics::missing_closing_delimiter(file)],
        });
    };

    let yaml = preprocess_yaml(&lines[1..close].join("\n"));
    let body = if close + 1 < lines.len() {
        lines[close + 1..].join("\n")
    } else {
        String::new()
    };

    let value: Value = match serde_yaml::from_str(&yaml) {
        Ok(v) => v,
        Err(err) => return Err(yaml_error(file, &lines, err)),
    };

    let mut warnings = Vec::new();
    let document = decode_document(file, &value, &mut warnings);
    if let Err(missing) = document.validate() {
        for field in missing.0 {
            warnings.push(diagnostics::frontmatter_schema(
                file,
                field,
                "missing required field",
            ));
        }
    }

    Ok(ParsedFile {
        document: Some(document),
        body,
        diagnostics: warnings,
    })
}

/// Read a file and fail unless it has frontmatter with every required field.
pub fn validate_file(path: &Path) -> Result<Document, FrontmatterError> {
    let parsed = read_document(path)?;
    let file = path.to_string_lossy();
    let Some(document) = parsed.document else {
        let tax = diagnostics::frontmatter_schema(
            &file,
            "---",
            "frontmatter delimiters '---' not found",
        );
        return Err(FrontmatterError::Invalid(tax.into_error()));
    };
    if let Err(missing) = document.validate() {
        let field = missing.0.first().copied().unwrap_or("frontmatter");
        let tax = diagnostics::frontmatter_schema(&file, field, missing.to_string())
            .with_cause(missing);
        return Err(FrontmatterError::Invalid(tax.into_error()));
    }
    Ok(document)
}

// ============ Writing ============

/// Render a document as frontmatter plus body. `RelatedFiles` entries are
/// always emitted in mapping form.
pub fn render_document(doc: &Document, body: &str) -> Result<String, FrontmatterError> {
    let yaml = serde_yaml::to_string(doc)?;
    Ok(format!("---\n{}---\n\n{}", yaml, body))
}

/// Atomically write a document: render to a sibling temp file, then rename.
pub fn write_document(path: &Path, doc: &Document, body: &str) -> Result<(), FrontmatterError> {
    let io_err = |source| FrontmatterError::Io {
        path: path.to_path_buf(),
        source,
    };
    let rendered = render_document(doc, body)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.md".to_string());
    let tmp = dir.join(format!(".{}.docmgr-tmp", name));
    std::fs::write(&tmp, rendered).map_err(io_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

// ============ YAML pre-processing ============

/// Whether a top-level scalar value needs quoting to be YAML-safe.
pub fn needs_quoting(value: &str) -> bool {
    let trimmed = value.trim();
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    if matches!(first, '@' | '`' | '#' | '&' | '*' | '!' | '|' | '>' | '%' | '?') {
        return true;
    }
    value.contains(": ")
        || trimmed.ends_with(':')
        || value.contains(" #")
        || value.contains('\t')
        || value.contains("{{")
        || value.contains("}}")
}

/// Single-quote `value`, doubling embedded single quotes.
pub fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote unsafe `Key: value` scalars, keeping each line's indentation.
/// Sequence items are left alone. Line count is preserved.
pub fn preprocess_yaml(yaml: &str) -> String {
    yaml.split('\n')
        .map(|line| {
            let body = line.trim_start_matches([' ', '\t']);
            if body.trim().is_empty() || body.starts_with('#') || body.starts_with("- ") {
                return line.to_string();
            }
            let indent = &line[..line.len() - body.len()];
            let Some((key, val)) = body.split_once(':') else {
                return line.to_string();
            };
            let key = key.trim();
            let val = val.trim();
            if key.is_empty() || val.is_empty() || val.starts_with(['"', '\'', '[', '{', '|', '>']) {
                return line.to_string();
            }
            if needs_quoting(val) {
                format!("{}{}: {}", indent, key, quote_value(val))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============ Syntax errors ============

fn line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"line (\d+)").ok()).as_ref()
}

fn yaml_error(file: &str, lines: &[&str], err: serde_yaml::Error) -> FrontmatterError {
    let msg = err.to_string();
    let location = err.location();

    let yaml_line = line_re()
        .and_then(|re| {
            re.captures_iter(&msg)
                .filter_map(|c| c[1].parse::<usize>().ok())
                .min()
        })
        .or_else(|| location.as_ref().map(|l| l.line()))
        .unwrap_or(0);
    let line = if yaml_line > 0 {
        FM_START_LINE + yaml_line - 1
    } else {
        0
    };
    let column = match &location {
        Some(l) if l.line() == yaml_line => l.column(),
        _ => 0,
    };

    let (problem, fixes) = classify_yaml_error(&msg);
    let snippet = build_snippet(lines, line, column);
    let tax = diagnostics::frontmatter_parse(file, line, column, snippet, problem, fixes)
        .with_cause(err);
    FrontmatterError::Parse(tax.into_error())
}

/// Map a parser message onto a short problem string and suggested fixes.
fn classify_yaml_error(msg: &str) -> (String, Vec<String>) {
    let l = msg.to_lowercase();
    let (problem, fixes): (&str, &[&str]) = if l.contains("mapping values are not allowed") {
        (
            "mapping values are not allowed (missing quotes before ':' or bad indentation)",
            &[
                "quote values that contain ': ' (e.g. Title: 'a: b')",
                "check the indentation of nested keys",
            ],
        )
    } else if l.contains("did not find expected key") {
        (
            "did not find expected key (check colons and indentation)",
            &["make sure every key ends with ':'", "check list and mapping indentation"],
        )
    } else if l.contains("did not find expected ',' or ']'") {
        (
            "unclosed flow sequence (missing ']')",
            &["close the list with ']'", "or use block list syntax ('- item' per line)"],
        )
    } else if l.contains("found character that cannot start any token") {
        (
            "invalid character (likely needs quoting or escaping)",
            &["quote values that start with @, `, % or other reserved characters"],
        )
    } else {
        return (
            msg.to_string(),
            vec!["check the frontmatter block for YAML syntax errors".to_string()],
        );
    };
    (
        problem.to_string(),
        fixes.iter().map(|f| f.to_string()).collect(),
    )
}

/// Lines `line-1..=line+1` as `%4d | text`, with a caret under `column`.
fn build_snippet(lines: &[&str], line: usize, column: usize) -> String {
    if line == 0 || line > lines.len() {
        return String::new();
    }
    let start = line.saturating_sub(1).max(1);
    let end = (line + 1).min(lines.len());
    let mut out = Vec::new();
    for i in start..=end {
        out.push(format!("{:4} | {}", i, lines[i - 1]));
        if i == line && column > 0 {
            out.push(format!("     | {}^", " ".repeat(column - 1)));
        }
    }
    out.join("\n")
}

// ============ Lenient field decoding ============

fn decode_document(file: &str, value: &Value, warnings: &mut Vec<Taxonomy>) -> Document {
    let map = match value {
        Value::Mapping(m) => m,
        Value::Null => return Document::default(),
        _ => {
            warnings.push(diagnostics::frontmatter_schema(
                file,
                "frontmatter",
                "frontmatter must be a mapping of keys to values",
            ));
            return Document::default();
        }
    };

    let mut f = FieldReader {
        file,
        map,
        warnings,
    };
    Document {
        title: f.string("Title"),
        ticket: f.string("Ticket"),
        status: f.string("Status"),
        topics: f.string_list("Topics"),
        doc_type: f.string("DocType"),
        intent: f.string("Intent"),
        owners: f.string_list("Owners"),
        related_files: f.related_files("RelatedFiles"),
        external_sources: f.string_list("ExternalSources"),
        summary: f.string("Summary"),
        what_for: f.string("WhatFor"),
        when_to_use: f.string("WhenToUse"),
        last_updated: f.timestamp("LastUpdated"),
    }
}

struct FieldReader<'a> {
    file: &'a str,
    map: &'a Mapping,
    warnings: &'a mut Vec<Taxonomy>,
}

impl<'a> FieldReader<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        let map: &'a Mapping = self.map;
        map.get(key).filter(|v| !v.is_null())
    }

    fn warn(&mut self, field: &str, detail: String) {
        self.warnings
            .push(diagnostics::frontmatter_schema(self.file, field, detail));
    }

    fn string(&mut self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        match scalar_string(value) {
            Some(s) => Some(s),
            None => {
                let detail = format!("expected a string, found {}", kind_of(value));
                self.warn(key, detail);
                None
            }
        }
    }

    fn string_list(&mut self, key: &str) -> Vec<String> {
        let Some(value) = self.get(key) else {
            return Vec::new();
        };
        match value {
            Value::Sequence(items) => {
                let mut out = Vec::new();
                let mut skipped = 0;
                for item in items {
                    match scalar_string(item) {
                        Some(s) => out.push(s),
                        None => skipped += 1,
                    }
                }
                if skipped > 0 {
                    self.warn(key, format!("skipped {} non-scalar entries", skipped));
                }
                out
            }
            Value::String(s) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            other => {
                let detail = format!("expected a list, found {}", kind_of(other));
                self.warn(key, detail);
                Vec::new()
            }
        }
    }

    fn related_files(&mut self, key: &str) -> Vec<RelatedFile> {
        let Some(value) = self.get(key) else {
            return Vec::new();
        };
        let Value::Sequence(items) = value else {
            let detail = format!("expected a list, found {}", kind_of(value));
            self.warn(key, detail);
            return Vec::new();
        };
        items.iter().filter_map(related_file_entry).collect()
    }

    fn timestamp(&mut self, key: &str) -> Option<DateTime<FixedOffset>> {
        let value = self.get(key)?;
        let parsed = scalar_string(value).and_then(|s| parse_timestamp(&s));
        if parsed.is_none() {
            self.warn(key, format!("unrecognized timestamp {:?}", value_text(value)));
        }
        parsed
    }
}

/// Decode one `RelatedFiles` entry: a scalar path or a `{Path, Note}`
/// mapping (keys matched case-insensitively). Anything else is skipped.
fn related_file_entry(value: &Value) -> Option<RelatedFile> {
    match value {
        Value::Mapping(m) => {
            let mut path = String::new();
            let mut note = String::new();
            for (k, v) in m {
                let Some(k) = k.as_str() else { continue };
                match k.to_ascii_lowercase().as_str() {
                    "path" => path = scalar_string(v).unwrap_or_default(),
                    "note" => note = scalar_string(v).unwrap_or_default(),
                    _ => {}
                }
            }
            let path = path.trim().to_string();
            (!path.is_empty()).then(|| RelatedFile::new(path, note.trim()))
        }
        other => {
            let path = scalar_string(other)?.trim().to_string();
            (!path.is_empty()).then(|| RelatedFile::new(path, ""))
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn value_text(value: &Value) -> String {
    scalar_string(value).unwrap_or_else(|| kind_of(value).to_string())
}

/// RFC3339 or a plain date/datetime (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
