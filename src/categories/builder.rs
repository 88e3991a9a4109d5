// Category builder — greedy threshold clustering of lemma observations.
//
// Observations are visited once, in input order. Each one is compared with
// the representative of every existing category; if the best similarity
// reaches the threshold it joins that category, otherwise it founds a new
// one with its own vector as the representative. Representatives are never
// recomputed, so the result depends on input order and the same input always
// gives the same categories.

use anyhow::Result;
use tracing::{debug, info};

use super::models::{CategorySet, Observation};
use crate::embeddings::similarity::is_finite_vector;

/// Similarity a lemma needs to join an existing category.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Builds a category set from a sequence of observations.
#[derive(Debug, Clone, Copy)]
pub struct CategoryBuilder {
    threshold: f64,
}

impl Default for CategoryBuilder {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl CategoryBuilder {
    /// Threshold must be a number in [0, 1].
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("Similarity threshold must be between 0 and 1, got {threshold}");
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run one build pass.
    ///
    /// - Observations without a vector, or with a NaN or infinite component,
    ///   are skipped.
    /// - A zero-magnitude vector never matches, so it founds its own category.
    /// - Ties between equally similar categories go to the earliest one.
    /// - When a lemma fails to join but a category with its name already
    ///   exists (contextual vectors give each occurrence its own vector), it
    ///   is added to that namesake category and the representative stays.
    pub fn build<'a, I>(&self, observations: I) -> CategorySet
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut set = CategorySet::default();
        let mut skipped = 0usize;
        let mut joined = 0usize;

        for obs in observations {
            let Some(vector) = obs.vector.as_ref().filter(|v| is_finite_vector(v)) else {
                skipped += 1;
                continue;
            };

            match set.best_match(vector) {
                Some((position, sim)) if sim >= self.threshold => {
                    debug!(
                        lemma = %obs.lemma,
                        category = %set.category_at(position).id,
                        similarity = sim,
                        "Joined category"
                    );
                    set.join(position, &obs.lemma);
                    joined += 1;
                }
                _ => match set.position(&obs.lemma) {
                    Some(position) => {
                        set.join(position, &obs.lemma);
                        joined += 1;
                    }
                    None => {
                        set.found(&obs.lemma, vector.clone());
                    }
                },
            }
        }

        info!(
            categories = set.len(),
            joined,
            skipped,
            threshold = self.threshold,
            "Built categories"
        );

        set
    }
}

/// Convenience wrapper: validate the threshold and build in one call.
pub fn build_categories(observations: &[Observation], threshold: f64) -> Result<CategorySet> {
    Ok(CategoryBuilder::new(threshold)?.build(observations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(lemma: &str, vector: Option<Vec<f32>>) -> Observation {
        Observation::new(lemma, vector)
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        assert!(CategoryBuilder::new(-0.1).is_err());
        assert!(CategoryBuilder::new(1.5).is_err());
        assert!(CategoryBuilder::new(f64::NAN).is_err());
        assert!(CategoryBuilder::new(0.0).is_ok());
        assert!(CategoryBuilder::new(1.0).is_ok());
    }

    #[test]
    fn test_missing_vectors_are_skipped() {
        let input = vec![obs("fehlt", None), obs("gut", Some(vec![1.0, 0.0]))];
        let set = build_categories(&input, 0.5).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("fehlt").is_none());
    }

    #[test]
    fn test_non_finite_vectors_are_skipped() {
        let input = vec![
            obs("kaputt", Some(vec![f32::NAN, 1.0])),
            obs("gut", Some(vec![1.0, 0.0])),
            obs("riesig", Some(vec![f32::INFINITY, 0.0])),
        ];
        let set = build_categories(&input, 0.0).unwrap();
        let ids: Vec<&String> = set.ids().collect();
        assert_eq!(ids, vec!["gut"]);
        assert_eq!(set.observation_count(), 1);

        // The surviving set still serializes to valid JSON and back
        let json = serde_json::to_string(&set).unwrap();
        let back: CategorySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_zero_vector_founds_and_is_never_joined() {
        let input = vec![
            obs("null", Some(vec![0.0, 0.0])),
            obs("gut", Some(vec![1.0, 0.0])),
            obs("auch", Some(vec![0.0, 0.0])),
        ];
        let set = build_categories(&input, 0.0).unwrap();
        let ids: Vec<&String> = set.ids().collect();
        assert_eq!(ids, vec!["null", "gut", "auch"]);
        assert_eq!(set.get("null").unwrap().members.len(), 1);
    }

    #[test]
    fn test_namesake_collision_joins_existing_category() {
        // Same lemma, orthogonal contextual vectors
        let input = vec![
            obs("bank", Some(vec![1.0, 0.0])),
            obs("bank", Some(vec![0.0, 1.0])),
        ];
        let set = build_categories(&input, 0.9).unwrap();
        assert_eq!(set.len(), 1);
        let bank = set.get("bank").unwrap();
        assert_eq!(bank.members, vec!["bank".to_string(), "bank".to_string()]);
        assert_eq!(bank.representative, vec![1.0, 0.0]);
    }

    #[test]
    fn test_empty_input_gives_empty_set() {
        let set = build_categories(&[], 0.5).unwrap();
        assert!(set.is_empty());
    }
}
