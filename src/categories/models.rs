// Category data model — observations, categories, and per-group counts.
//
// A Category is founded once by the builder and keeps the founder's vector as
// its representative for its whole life. The set only grows during the build
// pass; its mutators are crate-private, so once `build` hands the set out it
// is read-only for everyone downstream.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::embeddings::similarity::{cosine_with_norms, is_degenerate_norm, magnitude};
use crate::embeddings::traits::Vector;

/// Categories are identified by the lemma that founded them.
pub type CategoryId = String;

/// A lemma occurrence (or distinct lemma) with its vector, if any.
///
/// The (source, variant) group travels with the enclosing
/// `(GroupKey, Vec<Observation>)` document, not with each observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub lemma: String,
    pub vector: Option<Vector>,
}

impl Observation {
    pub fn new(lemma: impl Into<String>, vector: Option<Vector>) -> Self {
        Self {
            lemma: lemma.into(),
            vector,
        }
    }
}

/// An emergent cluster of lemmas sharing a founder's representative vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// The founding lemma's vector. Never recomputed.
    pub representative: Vector,
    /// Lemmas that joined, in joining order (founder first). A lemma appears
    /// once per joining observation.
    pub members: Vec<String>,
    #[serde(skip)]
    norm: f64,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, representative: Vector) -> Self {
        let id = id.into();
        let norm = magnitude(&representative);
        Self {
            members: vec![id.clone()],
            id,
            representative,
            norm,
        }
    }

    /// Distinct member lemmas, sorted.
    pub fn distinct_members(&self) -> Vec<&str> {
        let mut members: Vec<&str> = self.members.iter().map(|m| m.as_str()).collect();
        members.sort_unstable();
        members.dedup();
        members
    }

    /// Cosine similarity between a vector (with its norm) and the
    /// representative.
    pub(crate) fn similarity(&self, vector: &[f32], norm: f64) -> f64 {
        cosine_with_norms(vector, norm, &self.representative, self.norm)
    }

    /// A zero-magnitude or non-finite representative can never be matched.
    pub fn is_degenerate(&self) -> bool {
        is_degenerate_norm(self.norm)
    }
}

/// All categories of one build pass, in founding order.
///
/// Founding order is the tie-break order for every "pick the best category"
/// decision, in building as well as assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Category>", into = "Vec<Category>")]
pub struct CategorySet {
    categories: Vec<Category>,
    index: HashMap<CategoryId, usize>,
}

impl CategorySet {
    /// Assemble a frozen set from complete categories (e.g. a stored run).
    /// Identifiers must be unique.
    pub fn from_categories(categories: Vec<Category>) -> Result<Self> {
        let mut set = Self::default();
        for mut category in categories {
            if set.index.contains_key(&category.id) {
                anyhow::bail!("Duplicate category id {:?}", category.id);
            }
            category.norm = magnitude(&category.representative);
            set.index.insert(category.id.clone(), set.categories.len());
            set.categories.push(category);
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.index.get(id).map(|&i| &self.categories[i])
    }

    /// Founding position of a category.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Identifiers in founding order.
    pub fn ids(&self) -> impl Iterator<Item = &CategoryId> {
        self.categories.iter().map(|c| &c.id)
    }

    /// Number of observations that went into categories.
    pub fn observation_count(&self) -> usize {
        self.categories.iter().map(|c| c.members.len()).sum()
    }

    /// The category with the highest similarity to `vector`, earliest-founded
    /// on ties. Degenerate representatives are never candidates, and a
    /// degenerate `vector` (zero, NaN or infinite) matches nothing.
    pub fn best_match(&self, vector: &[f32]) -> Option<(usize, f64)> {
        let norm = magnitude(vector);
        if is_degenerate_norm(norm) {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (i, category) in self.categories.iter().enumerate() {
            if category.is_degenerate() {
                continue;
            }
            let sim = category.similarity(vector, norm);
            // Strict comparison keeps the earliest category on ties
            if best.map_or(true, |(_, best_sim)| sim > best_sim) {
                best = Some((i, sim));
            }
        }
        best
    }

    pub(crate) fn category_at(&self, position: usize) -> &Category {
        &self.categories[position]
    }

    pub(crate) fn found(&mut self, lemma: &str, vector: Vector) -> usize {
        let position = self.categories.len();
        self.index.insert(lemma.to_string(), position);
        self.categories.push(Category::new(lemma, vector));
        position
    }

    pub(crate) fn join(&mut self, position: usize, lemma: &str) {
        self.categories[position].members.push(lemma.to_string());
    }
}

impl TryFrom<Vec<Category>> for CategorySet {
    type Error = anyhow::Error;

    fn try_from(categories: Vec<Category>) -> Result<Self> {
        Self::from_categories(categories)
    }
}

impl From<CategorySet> for Vec<Category> {
    fn from(set: CategorySet) -> Self {
        set.categories
    }
}

/// Occurrence counts per category for one group.
///
/// Only categories that received at least one occurrence are present; an
/// absent category counts as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCount(BTreeMap<CategoryId, u64>);

impl AssignmentCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, category: &str) {
        self.add(category, 1);
    }

    pub fn add(&mut self, category: &str, count: u64) {
        if count == 0 {
            return;
        }
        *self.0.entry(category.to_string()).or_insert(0) += count;
    }

    pub fn get(&self, category: &str) -> u64 {
        self.0.get(category).copied().unwrap_or(0)
    }

    /// Sum another count into this one.
    pub fn merge(&mut self, other: &AssignmentCount) {
        for (category, &count) in &other.0 {
            self.add(category, count);
        }
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CategoryId, u64)> {
        self.0.iter().map(|(k, &v)| (k, v))
    }
}

impl<S: Into<CategoryId>> FromIterator<(S, u64)> for AssignmentCount {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (category, count) in iter {
            let category: CategoryId = category.into();
            counts.add(&category, count);
        }
        counts
    }
}

/// Result of assigning one batch of occurrences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments {
    /// (lemma, category) for every occurrence that was assigned, in input order
    pub assigned: Vec<(String, CategoryId)>,
    /// Occurrences per category
    pub counts: AssignmentCount,
    /// Occurrences without a usable vector
    pub dropped: usize,
}

/// One category as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReportEntry {
    pub id: CategoryId,
    /// Distinct member lemmas
    pub member_count: usize,
    /// Observations that went into the category
    pub observations: usize,
    /// Distinct member lemmas, sorted
    pub members: Vec<String>,
}

/// Summary of a category set, sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub entries: Vec<CategoryReportEntry>,
}

impl CategoryReport {
    pub fn from_set(set: &CategorySet) -> Self {
        let mut entries: Vec<CategoryReportEntry> = set
            .iter()
            .map(|c| {
                let members: Vec<String> =
                    c.distinct_members().into_iter().map(String::from).collect();
                CategoryReportEntry {
                    id: c.id.clone(),
                    member_count: members.len(),
                    observations: c.members.len(),
                    members,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_founder_is_first_member() {
        let c = Category::new("gut", vec![1.0, 0.0]);
        assert_eq!(c.members, vec!["gut".to_string()]);
        assert!(!c.is_degenerate());
    }

    #[test]
    fn test_distinct_members_sorted() {
        let mut c = Category::new("gut", vec![1.0]);
        c.members.extend(["schön", "gut", "fein"].map(String::from));
        assert_eq!(c.distinct_members(), vec!["fein", "gut", "schön"]);
    }

    #[test]
    fn test_from_categories_rejects_duplicates() {
        let result = CategorySet::from_categories(vec![
            Category::new("a", vec![1.0]),
            Category::new("a", vec![0.5]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_best_match_prefers_earliest_on_tie() {
        let set = CategorySet::from_categories(vec![
            Category::new("first", vec![1.0, 0.0]),
            Category::new("second", vec![2.0, 0.0]),
        ])
        .unwrap();
        let (pos, sim) = set.best_match(&[3.0, 0.0]).unwrap();
        assert_eq!(pos, 0);
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_match_skips_degenerate_representatives() {
        let set = CategorySet::from_categories(vec![
            Category::new("null", vec![0.0, 0.0]),
            Category::new("x", vec![-1.0, 0.0]),
        ])
        .unwrap();
        // Only candidate has negative similarity; it still wins
        let (pos, sim) = set.best_match(&[1.0, 0.0]).unwrap();
        assert_eq!(pos, 1);
        assert!(sim < 0.0);
    }

    #[test]
    fn test_best_match_none_for_zero_vector_or_empty_set() {
        let set = CategorySet::from_categories(vec![Category::new("x", vec![1.0])]).unwrap();
        assert!(set.best_match(&[0.0]).is_none());
        assert!(CategorySet::default().best_match(&[1.0]).is_none());
    }

    #[test]
    fn test_best_match_none_for_non_finite_vector() {
        let set = CategorySet::from_categories(vec![Category::new("x", vec![1.0, 0.0])]).unwrap();
        assert!(set.best_match(&[f32::NAN, 1.0]).is_none());
        assert!(set.best_match(&[f32::INFINITY, 0.0]).is_none());
        assert!(Category::new("nan", vec![f32::NAN, 0.0]).is_degenerate());
    }

    #[test]
    fn test_serde_roundtrip_restores_norms_and_index() {
        let set = CategorySet::from_categories(vec![
            Category::new("gut", vec![1.0, 0.0]),
            Category::new("schnell", vec![0.0, 1.0]),
        ])
        .unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: CategorySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.position("schnell"), Some(1));
        assert_eq!(back.best_match(&[0.1, 0.9]).map(|(p, _)| p), Some(1));
    }

    #[test]
    fn test_assignment_count_merge_sums() {
        let mut a: AssignmentCount = [("x", 5), ("y", 2)].into_iter().collect();
        let b: AssignmentCount = [("x", 3), ("z", 9)].into_iter().collect();
        a.merge(&b);
        assert_eq!(a.get("x"), 8);
        assert_eq!(a.get("y"), 2);
        assert_eq!(a.get("z"), 9);
        assert_eq!(a.get("missing"), 0);
        assert_eq!(a.total(), 19);
    }

    #[test]
    fn test_report_sorted_by_id_with_distinct_members() {
        let mut set = CategorySet::default();
        let s = set.found("schnell", vec![0.0, 1.0]);
        let g = set.found("gut", vec![1.0, 0.0]);
        set.join(g, "schön");
        set.join(g, "schön");
        set.join(s, "rasch");

        let report = CategoryReport::from_set(&set);
        assert_eq!(report.entries[0].id, "gut");
        assert_eq!(report.entries[0].members, vec!["gut", "schön"]);
        assert_eq!(report.entries[0].member_count, 2);
        assert_eq!(report.entries[0].observations, 3);
        assert_eq!(report.entries[1].id, "schnell");
    }

    #[test]
    fn test_assignment_count_ignores_zero() {
        let counts: AssignmentCount = [("x", 0)].into_iter().collect();
        assert!(counts.is_empty());
    }
}
