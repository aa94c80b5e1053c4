//! Controlled-vocabulary checks.
//!
//! When a vocabulary is configured, every topic, doc type, intent and status
//! value of a parsed document is compared (case-insensitively) against the
//! known values; unknown values become `vocabulary` / `unknown_value`
//! warnings. Fields with an empty vocabulary are not checked.

use crate::config::VocabularyConfig;
use crate::diagnostics::{self, Taxonomy};
use crate::models::Document;

pub fn check_document(file: &str, doc: &Document, vocab: &VocabularyConfig) -> Vec<Taxonomy> {
    let mut out = Vec::new();
    for topic in &doc.topics {
        check_value(file, "Topics", topic, &vocab.topics, &mut out);
    }
    for (field, value, known) in [
        ("DocType", &doc.doc_type, &vocab.doc_types),
        ("Intent", &doc.intent, &vocab.intent),
        ("Status", &doc.status, &vocab.status),
    ] {
        if let Some(value) = value {
            check_value(file, field, value, known, &mut out);
        }
    }
    out
}

fn check_value(file: &str, field: &str, value: &str, known: &[String], out: &mut Vec<Taxonomy>) {
    let value = value.trim();
    if known.is_empty() || value.is_empty() {
        return;
    }
    if !known.iter().any(|k| k.trim().eq_ignore_ascii_case(value)) {
        out.push(diagnostics::vocabulary_unknown(file, field, value, known.to_vec()));
    }
}
