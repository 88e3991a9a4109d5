// Data models — Rust structs that map to database rows.
//
// A finished categorization run is stored whole: the category set, the
// frequency table and the per-group rankings live in JSON columns next to the
// parameters that produced them.

use serde::{Deserialize, Serialize};

use crate::categories::aggregate::{AggregateSettings, Aggregation};
use crate::categories::models::CategorySet;

/// One complete run for one POS selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRun {
    /// Output label derived from the POS filter (e.g. "ADJADV"); the key
    pub label: String,
    /// Comma-separated POS tags
    pub pos_tags: String,
    /// Vector provider name ("static" or "contextual")
    pub provider: String,
    pub threshold: f64,
    pub settings: AggregateSettings,
    pub document_count: usize,
    pub observation_count: usize,
    /// Occurrences that could not be assigned (no usable vector)
    pub dropped_occurrences: usize,
    pub categories: CategorySet,
    pub aggregation: Aggregation,
    /// When the run finished; the database fills it in when missing
    pub created_at: Option<String>,
    pub corpus_path: Option<String>,
}

/// Lightweight listing row for `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
    pub provider: String,
    pub threshold: f64,
    pub category_count: usize,
    pub column_count: usize,
    pub created_at: String,
}
