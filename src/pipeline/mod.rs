// Pipeline — the end-to-end categorization run.

pub mod categorize;
