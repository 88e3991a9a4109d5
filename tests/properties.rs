// Property tests for category building, assignment and aggregation.

use proptest::prelude::*;

use wortfeld::categories::aggregate::{AggregateSettings, Aggregator};
use wortfeld::categories::assigner::assign;
use wortfeld::categories::builder::build_categories;
use wortfeld::categories::models::{AssignmentCount, Observation};
use wortfeld::corpus::models::GroupKey;

fn observation() -> impl Strategy<Value = Observation> {
    (
        "[a-e]{1,3}",
        prop::option::of(prop::collection::vec(-1.0f32..1.0, 4)),
    )
        .prop_map(|(lemma, vector)| Observation::new(lemma, vector))
}

fn per_group() -> impl Strategy<Value = Vec<(GroupKey, AssignmentCount)>> {
    prop::collection::vec(
        (
            "[a-c]",
            prop::collection::vec(("c[0-9]{1,2}", 0u64..20), 0..15),
        ),
        0..8,
    )
    .prop_map(|groups| {
        groups
            .into_iter()
            .map(|(source, cells)| (GroupKey::new(source, "TextA"), cells.into_iter().collect()))
            .collect()
    })
}

proptest! {
    #[test]
    fn build_is_deterministic(input in prop::collection::vec(observation(), 0..40), threshold in 0.0f64..=1.0) {
        let first = build_categories(&input, threshold).unwrap();
        let second = build_categories(&input, threshold).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_vectorized_observation_lands_in_one_category(
        input in prop::collection::vec(observation(), 0..40),
        threshold in 0.0f64..=1.0,
    ) {
        let set = build_categories(&input, threshold).unwrap();
        let with_vector = input.iter().filter(|o| o.vector.is_some()).count();
        prop_assert_eq!(set.observation_count(), with_vector);
        prop_assert!(set.len() <= with_vector);
        for category in set.iter() {
            prop_assert_eq!(&category.members[0], &category.id);
        }
    }

    #[test]
    fn assignment_accounts_for_every_occurrence(
        build in prop::collection::vec(observation(), 1..20),
        occurrences in prop::collection::vec(observation(), 0..40),
    ) {
        let set = build_categories(&build, 0.5).unwrap();
        let result = assign(&occurrences, &set);
        prop_assert_eq!(result.counts.total() as usize + result.dropped, occurrences.len());
        prop_assert_eq!(result.assigned.len(), result.counts.total() as usize);
        for (_, category) in &result.assigned {
            prop_assert!(set.get(category).is_some());
        }
    }

    #[test]
    fn aggregation_respects_bounds(
        input in per_group(),
        max_categories in 0usize..12,
        top_k in 0usize..6,
    ) {
        let settings = AggregateSettings { max_categories, top_k };
        let result = Aggregator::new(settings).aggregate(input.clone());

        prop_assert!(result.table.columns.len() <= max_categories);
        for row in &result.table.rows {
            prop_assert_eq!(row.counts.len(), result.table.columns.len());
        }
        for ranking in &result.top_k.groups {
            prop_assert!(ranking.entries.len() <= top_k);
            for (i, entry) in ranking.entries.iter().enumerate() {
                prop_assert_eq!(entry.rank, i + 1);
                prop_assert!(entry.count > 0);
                prop_assert!(result.table.column_index(&entry.category).is_some());
            }
        }

        // Rows are sorted and unique
        let groups: Vec<&GroupKey> = result.table.groups().collect();
        prop_assert!(groups.windows(2).all(|w| w[0] < w[1]));

        // Every kept column total matches the sum of the input cells
        let totals = result.table.totals();
        for (col, category) in result.table.columns.iter().enumerate() {
            let expected: u64 = input.iter().map(|(_, counts)| counts.get(category)).sum();
            prop_assert_eq!(totals[col], expected);
        }
    }
}
