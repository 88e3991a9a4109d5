// Categories — emergent semantic categories and their frequencies.
//
// build → assign → aggregate. The builder clusters lemma observations into a
// CategorySet, the assigner maps every occurrence of each group onto that
// frozen set, and the aggregator turns the per-group counts into the
// frequency table and per-group top-K lists.

pub mod aggregate;
pub mod assigner;
pub mod builder;
pub mod models;
