// Deviation report — which groups over- or under-use which categories.
//
// For every cell of the frequency table: the difference between the group's
// count and the category mean across all groups, absolute and in percent of
// that mean.

use serde::{Deserialize, Serialize};

use crate::categories::aggregate::FrequencyTable;
use crate::categories::models::CategoryId;
use crate::corpus::models::GroupKey;

/// Default number of entries on each side of the report.
pub const DEFAULT_TOP_DEVIATIONS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub group: GroupKey,
    pub category: CategoryId,
    pub count: u64,
    /// Category mean across all groups
    pub mean: f64,
    /// count - mean
    pub absolute: f64,
    /// absolute / mean * 100, or 0 when the mean is 0
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviationReport {
    /// Largest positive deviations first
    pub over: Vec<Deviation>,
    /// Largest negative deviations first
    pub under: Vec<Deviation>,
}

/// Mean count per column, over all rows.
pub fn column_means(table: &FrequencyTable) -> Vec<f64> {
    if table.rows.is_empty() {
        return vec![0.0; table.columns.len()];
    }
    let n = table.rows.len() as f64;
    table.totals().into_iter().map(|t| t as f64 / n).collect()
}

/// Deviations of every cell, row by row.
pub fn deviations(table: &FrequencyTable) -> Vec<Deviation> {
    let means = column_means(table);
    let mut out = Vec::with_capacity(table.rows.len() * table.columns.len());

    for row in &table.rows {
        for ((category, &count), &mean) in table.columns.iter().zip(&row.counts).zip(&means) {
            let absolute = count as f64 - mean;
            let percent = if mean == 0.0 { 0.0 } else { absolute / mean * 100.0 };
            out.push(Deviation {
                group: row.group.clone(),
                category: category.clone(),
                count,
                mean,
                absolute,
                percent,
            });
        }
    }

    out
}

/// The `n` strongest over- and under-representations.
pub fn top_deviations(table: &FrequencyTable, n: usize) -> DeviationReport {
    let all = deviations(table);

    let mut over: Vec<Deviation> = all.iter().filter(|d| d.absolute > 0.0).cloned().collect();
    over.sort_by(|a, b| b.absolute.total_cmp(&a.absolute));
    over.truncate(n);

    let mut under: Vec<Deviation> = all.into_iter().filter(|d| d.absolute < 0.0).collect();
    under.sort_by(|a, b| a.absolute.total_cmp(&b.absolute));
    under.truncate(n);

    DeviationReport { over, under }
}
