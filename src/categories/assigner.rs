// Category assigner — maps occurrences onto a frozen category set.
//
// No threshold here: every occurrence with a usable vector goes to its most
// similar category, even if that similarity is negative. Occurrences without
// a vector, or with a zero vector, are dropped and counted as such.

use tracing::debug;

use super::models::{Assignments, Category, CategorySet, Observation};

pub struct CategoryAssigner<'a> {
    categories: &'a CategorySet,
}

impl<'a> CategoryAssigner<'a> {
    pub fn new(categories: &'a CategorySet) -> Self {
        Self { categories }
    }

    /// Most similar category for a vector, earliest-founded on ties.
    pub fn best_category(&self, vector: &[f32]) -> Option<&'a Category> {
        self.categories
            .best_match(vector)
            .map(|(position, _)| self.categories.category_at(position))
    }

    pub fn assign<'o, I>(&self, occurrences: I) -> Assignments
    where
        I: IntoIterator<Item = &'o Observation>,
    {
        let mut out = Assignments::default();

        for occ in occurrences {
            let category = occ
                .vector
                .as_deref()
                .and_then(|vector| self.best_category(vector));
            match category {
                Some(category) => {
                    out.counts.increment(&category.id);
                    out.assigned.push((occ.lemma.clone(), category.id.clone()));
                }
                None => out.dropped += 1,
            }
        }

        debug!(
            assigned = out.assigned.len(),
            dropped = out.dropped,
            categories = out.counts.len(),
            "Assigned occurrences"
        );

        out
    }
}

/// Assign occurrences against a category set in one call.
pub fn assign<'o, I>(occurrences: I, categories: &CategorySet) -> Assignments
where
    I: IntoIterator<Item = &'o Observation>,
{
    CategoryAssigner::new(categories).assign(occurrences)
}
