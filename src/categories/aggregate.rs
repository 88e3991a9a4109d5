// Aggregation — per-group counts into a frequency table and top-K lists.
//
// Step 1 merges counts per group (a group seen twice is summed). Step 2 ranks
// categories by their total over all groups and keeps the strongest
// `max_categories` with a non-zero total; everything else disappears from
// every output. Step 3 ranks the surviving categories inside each group.
// Ties always fall back to category founding order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::models::{AssignmentCount, CategoryId, CategorySet};
use crate::corpus::models::GroupKey;

pub const DEFAULT_MAX_CATEGORIES: usize = 100;
pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSettings {
    /// Columns kept in the frequency table
    pub max_categories: usize,
    /// Entries kept per group
    pub top_k: usize,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            max_categories: DEFAULT_MAX_CATEGORIES,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// One row of the frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub group: GroupKey,
    /// One cell per column, same order as `FrequencyTable::columns`
    pub counts: Vec<u64>,
}

/// Groups × surviving categories, zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    /// Category ids by descending global total
    pub columns: Vec<CategoryId>,
    /// Rows ordered by (source, variant)
    pub rows: Vec<FrequencyRow>,
}

impl FrequencyTable {
    pub fn column_index(&self, category: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == category)
    }

    pub fn row(&self, group: &GroupKey) -> Option<&FrequencyRow> {
        self.rows.iter().find(|r| &r.group == group)
    }

    /// Count for one cell; 0 for unknown groups or dropped categories.
    pub fn get(&self, group: &GroupKey, category: &str) -> u64 {
        match (self.row(group), self.column_index(category)) {
            (Some(row), Some(col)) => row.counts[col],
            _ => 0,
        }
    }

    /// Column totals over all groups.
    pub fn totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.columns.len()];
        for row in &self.rows {
            for (total, &count) in totals.iter_mut().zip(&row.counts) {
                *total += count;
            }
        }
        totals
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupKey> {
        self.rows.iter().map(|r| &r.group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCategory {
    /// 1-based
    pub rank: usize,
    pub category: CategoryId,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRanking {
    pub group: GroupKey,
    pub entries: Vec<RankedCategory>,
}

/// The strongest surviving categories of each group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTopK {
    pub groups: Vec<GroupRanking>,
}

impl GroupTopK {
    pub fn for_group(&self, group: &GroupKey) -> Option<&[RankedCategory]> {
        self.groups
            .iter()
            .find(|g| &g.group == group)
            .map(|g| g.entries.as_slice())
    }
}

/// Both aggregation outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub table: FrequencyTable,
    pub top_k: GroupTopK,
    /// Categories with a non-zero total that did not make the cut
    pub truncated: usize,
}

/// Combines per-group counts into the reported tables.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    settings: AggregateSettings,
    order: HashMap<CategoryId, usize>,
}

impl Aggregator {
    pub fn new(settings: AggregateSettings) -> Self {
        Self {
            settings,
            order: HashMap::new(),
        }
    }

    /// Fix the tie-break order (normally the category founding order).
    /// Categories not listed rank after listed ones, in the order they are
    /// first seen in the input.
    pub fn with_order<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CategoryId>,
    {
        self.order.clear();
        for id in ids {
            let next = self.order.len();
            self.order.entry(id.into()).or_insert(next);
        }
        self
    }

    /// Tie-break order from a category set.
    pub fn for_categories(settings: AggregateSettings, categories: &CategorySet) -> Self {
        Self::new(settings).with_order(categories.ids().cloned())
    }

    pub fn settings(&self) -> AggregateSettings {
        self.settings
    }

    pub fn aggregate<I>(&self, per_group: I) -> Aggregation
    where
        I: IntoIterator<Item = (GroupKey, AssignmentCount)>,
    {
        let mut merged: BTreeMap<GroupKey, AssignmentCount> = BTreeMap::new();
        let mut order = self.order.clone();

        for (group, counts) in per_group {
            for (category, _) in counts.iter() {
                let next = order.len();
                order.entry(category.clone()).or_insert(next);
            }
            merged.entry(group).or_default().merge(&counts);
        }

        // Global totals
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for counts in merged.values() {
            for (category, count) in counts.iter() {
                *totals.entry(category.as_str()).or_insert(0) += count;
            }
        }

        let rank_of = |category: &str| order.get(category).copied().unwrap_or(usize::MAX);

        let mut ranked: Vec<(&str, u64)> = totals.into_iter().filter(|&(_, t)| t > 0).collect();
        ranked.sort_by_key(|&(category, total)| (Reverse(total), rank_of(category)));
        let truncated = ranked.len().saturating_sub(self.settings.max_categories);
        ranked.truncate(self.settings.max_categories);

        let columns: Vec<CategoryId> = ranked.iter().map(|(c, _)| c.to_string()).collect();

        let rows: Vec<FrequencyRow> = merged
            .iter()
            .map(|(group, counts)| FrequencyRow {
                group: group.clone(),
                counts: columns.iter().map(|c| counts.get(c)).collect(),
            })
            .collect();

        let groups = rows
            .iter()
            .map(|row| {
                let mut cells: Vec<(&CategoryId, u64)> = columns
                    .iter()
                    .zip(&row.counts)
                    .filter(|&(_, &count)| count > 0)
                    .map(|(c, &count)| (c, count))
                    .collect();
                cells.sort_by_key(|&(category, count)| (Reverse(count), rank_of(category)));
                cells.truncate(self.settings.top_k);

                GroupRanking {
                    group: row.group.clone(),
                    entries: cells
                        .into_iter()
                        .enumerate()
                        .map(|(i, (category, count))| RankedCategory {
                            rank: i + 1,
                            category: category.clone(),
                            count,
                        })
                        .collect(),
                }
            })
            .collect();

        info!(
            groups = rows.len(),
            columns = columns.len(),
            truncated,
            "Aggregated category counts"
        );

        Aggregation {
            table: FrequencyTable { columns, rows },
            top_k: GroupTopK { groups },
            truncated,
        }
    }
}

/// Aggregate with the founding order of `categories` as tie-break.
pub fn aggregate<I>(per_group: I, categories: &CategorySet, settings: AggregateSettings) -> Aggregation
where
    I: IntoIterator<Item = (GroupKey, AssignmentCount)>,
{
    Aggregator::for_categories(settings, categories).aggregate(per_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> AssignmentCount {
        pairs.iter().map(|&(c, n)| (c, n)).collect()
    }

    #[test]
    fn test_empty_input() {
        let result = Aggregator::default().aggregate(Vec::new());
        assert!(result.table.columns.is_empty());
        assert!(result.table.rows.is_empty());
        assert!(result.top_k.groups.is_empty());
    }

    #[test]
    fn test_group_without_counts_gets_zero_row() {
        let result = Aggregator::new(AggregateSettings::default()).aggregate(vec![
            (GroupKey::human(), counts(&[("a", 2)])),
            (GroupKey::new("llama", "TextA"), AssignmentCount::new()),
        ]);
        let row = result.table.row(&GroupKey::new("llama", "TextA")).unwrap();
        assert_eq!(row.counts, vec![0]);
        assert!(result
            .top_k
            .for_group(&GroupKey::new("llama", "TextA"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rows_sorted_by_group_key() {
        let result = Aggregator::default().aggregate(vec![
            (GroupKey::new("llama", "TextB"), counts(&[("a", 1)])),
            (GroupKey::human(), counts(&[("a", 1)])),
            (GroupKey::new("llama", "TextA"), counts(&[("a", 1)])),
        ]);
        let groups: Vec<String> = result.table.groups().map(|g| g.to_string()).collect();
        assert_eq!(
            groups,
            vec!["HumanText – Original", "llama – TextA", "llama – TextB"]
        );
    }

    #[test]
    fn test_tie_on_total_uses_founding_order() {
        let result = Aggregator::default()
            .with_order(["late", "early"].map(String::from))
            .aggregate(vec![(GroupKey::human(), counts(&[("early", 3), ("late", 3)]))]);
        assert_eq!(result.table.columns, vec!["late", "early"]);
    }

    #[test]
    fn test_max_categories_zero_drops_everything() {
        let settings = AggregateSettings {
            max_categories: 0,
            top_k: 10,
        };
        let result = Aggregator::new(settings).aggregate(vec![(GroupKey::human(), counts(&[("a", 1)]))]);
        assert!(result.table.columns.is_empty());
        assert_eq!(result.truncated, 1);
        assert_eq!(result.table.rows.len(), 1);
    }
}
