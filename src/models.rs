//! Core data models shared by the reader, the ingest pipeline and the query
//! executor.
//!
//! A [`Document`] is the decoded frontmatter of one Markdown file. Its serde
//! field names are the frontmatter keys (`Title`, `Ticket`, `RelatedFiles`,
//! ...), so the same type is used when writing frontmatter back to disk.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use thiserror::Error;

/// Decoded frontmatter of a Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Ticket", skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Topics", skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(rename = "DocType", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "Intent", skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(rename = "Owners", skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<String>,
    #[serde(rename = "RelatedFiles", skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<RelatedFile>,
    #[serde(rename = "ExternalSources", skip_serializing_if = "Vec::is_empty")]
    pub external_sources: Vec<String>,
    #[serde(rename = "Summary", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "WhatFor", skip_serializing_if = "Option::is_none")]
    pub what_for: Option<String>,
    #[serde(rename = "WhenToUse", skip_serializing_if = "Option::is_none")]
    pub when_to_use: Option<String>,
    #[serde(rename = "LastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<FixedOffset>>,
}

/// Required frontmatter fields that were absent or blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required fields: {}", .0.join(", "))]
pub struct MissingFields(pub Vec<&'static str>);

impl Document {
    /// Check the required fields: `Title`, `Ticket` and `DocType`.
    pub fn validate(&self) -> Result<(), MissingFields> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.title) {
            missing.push("Title");
        }
        if blank(&self.ticket) {
            missing.push("Ticket");
        }
        if blank(&self.doc_type) {
            missing.push("DocType");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingFields(missing))
        }
    }
}

/// One `RelatedFiles` entry. Always serialized in mapping form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelatedFile {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Note", skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl RelatedFile {
    pub fn new(path: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            note: note.into(),
        }
    }
}

/// Boolean tags derived from a document's absolute path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PathTags {
    pub is_index: bool,
    pub is_archived_path: bool,
    pub is_scripts_path: bool,
    pub is_sources_path: bool,
    pub is_control_doc: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_lists_missing_fields() {
        let doc = Document {
            title: Some("  ".into()),
            doc_type: Some("design".into()),
            ..Default::default()
        };
        let err = doc.validate().unwrap_err();
        assert_eq!(err.0, vec!["Title", "Ticket"]);
        assert_eq!(err.to_string(), "missing required fields: Title, Ticket");
    }

    #[test]
    fn test_validate_ok() {
        let doc = Document {
            title: Some("T".into()),
            ticket: Some("MEN-1".into()),
            doc_type: Some("index".into()),
            ..Default::default()
        };
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_related_file_serializes_as_mapping() {
        let yaml = serde_yaml::to_string(&vec![
            RelatedFile::new("a.go", ""),
            RelatedFile::new("b.go", "entry"),
        ])
        .unwrap();
        assert_eq!(yaml, "- Path: a.go\n- Path: b.go\n  Note: entry\n");
    }
}
