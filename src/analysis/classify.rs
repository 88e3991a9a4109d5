// Classification of a new text against a stored run.
//
// The eligible lemmas of the text are assigned to the run's surviving
// categories (one assignment per distinct lemma). For every category the text
// uses, its count is compared with the mean count of the human groups and the
// mean count of the generator groups; whichever is nearer decides the lean.
// Each decided category adds |count - overall mean| to the winning side's
// score, and the two scores normalized give the confidences.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::categories::aggregate::FrequencyTable;
use crate::categories::assigner::CategoryAssigner;
use crate::categories::models::{AssignmentCount, CategoryId, CategorySet, Observation};
use crate::corpus::filter::ContentFilter;
use crate::corpus::models::{AnnotatedText, GroupKey};
use crate::embeddings::traits::VectorProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tendency {
    Human,
    Generated,
    Unclear,
}

impl Tendency {
    pub fn label(&self) -> &'static str {
        match self {
            Tendency::Human => "human",
            Tendency::Generated => "generated",
            Tendency::Unclear => "unclear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVerdict {
    pub category: CategoryId,
    pub count: u64,
    pub global_mean: f64,
    pub human_mean: f64,
    pub generated_mean: f64,
    /// count - global mean
    pub difference: f64,
    /// difference / global mean * 100, or 0 when the mean is 0
    pub percent: f64,
    pub tendency: Tendency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Eligible lemma occurrences in the text
    pub lemma_count: usize,
    /// Categories the text was compared against
    pub category_count: usize,
    pub human_score: f64,
    pub generated_score: f64,
    pub human_confidence: f64,
    pub generated_confidence: f64,
    /// Sorted by |percent| descending
    pub verdicts: Vec<CategoryVerdict>,
}

impl Classification {
    /// The overall lean, or Unclear when the confidences are equal.
    pub fn tendency(&self) -> Tendency {
        if self.generated_confidence > self.human_confidence {
            Tendency::Generated
        } else if self.human_confidence > self.generated_confidence {
            Tendency::Human
        } else {
            Tendency::Unclear
        }
    }
}

/// Mean count per column over the selected rows.
fn profile(table: &FrequencyTable, include: impl Fn(&GroupKey) -> bool) -> Vec<f64> {
    let rows: Vec<_> = table.rows.iter().filter(|r| include(&r.group)).collect();
    if rows.is_empty() {
        return vec![0.0; table.columns.len()];
    }
    let mut sums = vec![0.0f64; table.columns.len()];
    for row in &rows {
        for (sum, &count) in sums.iter_mut().zip(&row.counts) {
            *sum += count as f64;
        }
    }
    let n = rows.len() as f64;
    sums.into_iter().map(|s| s / n).collect()
}

/// Compare a text's category counts with the profiles of a frequency table.
pub fn classify_counts(
    counts: &AssignmentCount,
    table: &FrequencyTable,
    lemma_count: usize,
) -> Classification {
    let global = profile(table, |_| true);
    let human = profile(table, |g| g.is_human());
    let generated = profile(table, |g| !g.is_human());

    let mut verdicts = Vec::new();
    let mut human_score = 0.0f64;
    let mut generated_score = 0.0f64;

    for (col, category) in table.columns.iter().enumerate() {
        let count = counts.get(category);
        if count == 0 {
            continue;
        }
        let (human_mean, generated_mean, global_mean) = (human[col], generated[col], global[col]);
        if human_mean == 0.0 && generated_mean == 0.0 {
            continue;
        }

        let c = count as f64;
        let to_human = (c - human_mean).abs();
        let to_generated = (c - generated_mean).abs();
        let tendency = if to_human < to_generated {
            human_score += (c - global_mean).abs();
            Tendency::Human
        } else if to_generated < to_human {
            generated_score += (c - global_mean).abs();
            Tendency::Generated
        } else {
            Tendency::Unclear
        };

        let difference = c - global_mean;
        let percent = if global_mean == 0.0 {
            0.0
        } else {
            difference / global_mean * 100.0
        };

        verdicts.push(CategoryVerdict {
            category: category.clone(),
            count,
            global_mean,
            human_mean,
            generated_mean,
            difference,
            percent,
            tendency,
        });
    }

    verdicts.sort_by(|a, b| b.percent.abs().total_cmp(&a.percent.abs()));

    let total = human_score + generated_score;
    let (human_confidence, generated_confidence) = if total > 0.0 {
        (human_score / total, generated_score / total)
    } else {
        (0.5, 0.5)
    };

    Classification {
        lemma_count,
        category_count: table.columns.len(),
        human_score,
        generated_score,
        human_confidence,
        generated_confidence,
        verdicts,
    }
}

/// Classify an annotated text against a stored run's categories and table.
///
/// Only categories that survived aggregation are candidates. Each distinct
/// eligible lemma is looked up as a bare lemma and assigned once.
pub fn classify(
    text: &AnnotatedText,
    filter: &ContentFilter,
    provider: &dyn VectorProvider,
    categories: &CategorySet,
    table: &FrequencyTable,
) -> Result<Classification> {
    let selected = filter.select(&text.tokens);
    let lemmas: BTreeSet<&str> = selected.iter().map(|(_, l)| l.as_str()).collect();

    let surviving = CategorySet::from_categories(
        table
            .columns
            .iter()
            .filter_map(|id| categories.get(id).cloned())
            .collect(),
    )?;

    let observations = lemmas
        .iter()
        .map(|&lemma| Ok(Observation::new(lemma, provider.lookup_lemma(lemma)?)))
        .collect::<Result<Vec<_>>>()?;

    let assignments = CategoryAssigner::new(&surviving).assign(&observations);

    info!(
        lemmas = selected.len(),
        distinct = lemmas.len(),
        assigned = assignments.assigned.len(),
        "Classified text"
    );

    Ok(classify_counts(&assignments.counts, table, selected.len()))
}
