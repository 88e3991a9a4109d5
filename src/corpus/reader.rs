// Annotated corpus reader.
//
// The corpus file is a JSON array of records. Each record optionally carries
// the human-authored text under "humanText", and any number of generator
// fields whose value is an object holding "TextA" and "TextB". Every text is
// an annotated document ({"tokens": [...]}) produced by the external tagger.
//
// Field order inside a record is preserved (serde_json "preserve_order"), so
// documents come out in the same order the corpus lists them.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::models::{AnnotatedText, Corpus, Document, GroupKey, VARIANTS};

/// Record field holding the human-authored text.
const HUMAN_FIELD: &str = "humanText";

/// Load and parse an annotated corpus from disk.
///
/// A missing or malformed file is fatal: the whole run depends on it.
pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;

    let corpus = parse_corpus(&raw)
        .with_context(|| format!("Failed to parse corpus file {}", path.display()))?;

    info!(
        path = %path.display(),
        records = corpus.record_count,
        documents = corpus.documents.len(),
        tokens = corpus.token_count(),
        "Loaded annotated corpus"
    );

    Ok(corpus)
}

/// Parse an annotated corpus from a JSON string.
pub fn parse_corpus(raw: &str) -> Result<Corpus> {
    let value: Value = serde_json::from_str(raw).context("Corpus is not valid JSON")?;

    let records = match value {
        Value::Array(records) => records,
        _ => anyhow::bail!("Corpus must be a JSON array of records"),
    };

    let mut documents = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let Value::Object(fields) = record else {
            warn!(record = index, "Skipping corpus record that is not an object");
            continue;
        };

        if let Some(human) = fields.get(HUMAN_FIELD) {
            let text = parse_text(human)
                .with_context(|| format!("Record {index}: invalid {HUMAN_FIELD}"))?;
            push_document(&mut documents, GroupKey::human(), text);
        }

        for (source, value) in fields {
            if source == HUMAN_FIELD {
                continue;
            }
            // Only object-valued fields are generator outputs; ids, prompts
            // and other metadata are ignored.
            let Value::Object(variants) = value else {
                continue;
            };

            for variant in VARIANTS {
                let Some(raw_text) = variants.get(variant) else {
                    continue;
                };
                let text = parse_text(raw_text)
                    .with_context(|| format!("Record {index}: invalid {source}.{variant}"))?;
                push_document(&mut documents, GroupKey::new(source.as_str(), variant), text);
            }
        }
    }

    Ok(Corpus {
        documents,
        record_count: records.len(),
    })
}

/// Load a single annotated document ({"tokens": [...]}) from disk.
pub fn load_text(path: &Path) -> Result<AnnotatedText> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Text file {} is not valid JSON", path.display()))?;
    let text = parse_text(&value)
        .with_context(|| format!("Text file {} is not an annotated document", path.display()))?;
    if text.is_empty() {
        anyhow::bail!("Text file {} contains no tokens", path.display());
    }
    Ok(text)
}

/// Parse one annotated document. `null` is read as an empty text.
fn parse_text(value: &Value) -> Result<AnnotatedText> {
    if value.is_null() {
        return Ok(AnnotatedText::default());
    }
    let text: AnnotatedText = serde_json::from_value(value.clone())?;
    Ok(text)
}

/// Empty texts produce no document and therefore no contribution to any group.
fn push_document(documents: &mut Vec<Document>, group: GroupKey, text: AnnotatedText) {
    if text.is_empty() {
        debug!(group = %group, "Skipping empty text");
        return;
    }
    documents.push(Document { group, text });
}
