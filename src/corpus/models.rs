// Corpus data model — annotated documents grouped by (source, variant).
//
// The linguistic annotation (tokenization, POS tags, lemmas) is produced by an
// external tagger. These types only carry its output through the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source label used for the human-authored text of a record.
pub const HUMAN_SOURCE: &str = "HumanText";
/// Variant label of the human-authored text (there is only one).
pub const HUMAN_VARIANT: &str = "Original";
/// Variant labels each generator source produces, in reading order.
pub const VARIANTS: [&str; 2] = ["TextA", "TextB"];

/// A (source, variant) pair identifying one collection of documents whose
/// lemma occurrences are counted together.
///
/// Ordering is lexicographic by source, then variant. Frequency table rows
/// follow this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub source: String,
    pub variant: String,
}

impl GroupKey {
    pub fn new(source: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            variant: variant.into(),
        }
    }

    /// The group of the human-authored source.
    pub fn human() -> Self {
        Self::new(HUMAN_SOURCE, HUMAN_VARIANT)
    }

    pub fn is_human(&self) -> bool {
        self.source == HUMAN_SOURCE
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {}", self.source, self.variant)
    }
}

/// One token as emitted by the external annotator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedToken {
    /// Surface form as it appears in the text
    pub text: String,
    /// Canonical base form
    pub lemma: String,
    /// Universal POS tag (NOUN, ADJ, ...)
    pub pos: String,
    /// Stop-word flag from the annotator, if it provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_stop: Option<bool>,
    /// Alphabetic flag from the annotator, if it provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_alpha: Option<bool>,
}

impl AnnotatedToken {
    pub fn new(text: &str, lemma: &str, pos: &str) -> Self {
        Self {
            text: text.to_string(),
            lemma: lemma.to_string(),
            pos: pos.to_string(),
            is_stop: None,
            is_alpha: None,
        }
    }
}

/// A fully annotated text: the token sequence in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedText {
    pub tokens: Vec<AnnotatedToken>,
}

impl AnnotatedText {
    pub fn new(tokens: Vec<AnnotatedToken>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Surface forms of all tokens, in order.
    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

/// One annotated text attributed to its group.
#[derive(Debug, Clone)]
pub struct Document {
    pub group: GroupKey,
    pub text: AnnotatedText,
}

/// The whole corpus as an ordered list of documents.
///
/// Several documents usually share a group (one per corpus record).
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    /// Number of records the documents were read from
    pub record_count: usize,
}

impl Corpus {
    /// Distinct groups in first-seen order.
    pub fn groups(&self) -> Vec<GroupKey> {
        let mut seen = std::collections::HashSet::new();
        self.documents
            .iter()
            .filter(|d| seen.insert(d.group.clone()))
            .map(|d| d.group.clone())
            .collect()
    }

    pub fn token_count(&self) -> usize {
        self.documents.iter().map(|d| d.text.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_orders_by_source_then_variant() {
        let mut keys = vec![
            GroupKey::new("llama", "TextB"),
            GroupKey::human(),
            GroupKey::new("llama", "TextA"),
            GroupKey::new("gpt", "TextA"),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            labels,
            vec!["HumanText – Original", "gpt – TextA", "llama – TextA", "llama – TextB"]
        );
    }

    #[test]
    fn test_corpus_groups_first_seen_order() {
        let doc = |s: &str, v: &str| Document {
            group: GroupKey::new(s, v),
            text: AnnotatedText::default(),
        };
        let corpus = Corpus {
            documents: vec![doc("b", "TextA"), doc("a", "TextA"), doc("b", "TextA")],
            record_count: 2,
        };
        assert_eq!(
            corpus.groups(),
            vec![GroupKey::new("b", "TextA"), GroupKey::new("a", "TextA")]
        );
    }
}
