// Categorization pipeline: corpus -> observations -> categories -> tables.
//
// 1. Select eligible lemmas in every document (content filter)
// 2. Look up vectors, once per document (or once per distinct lemma)
// 3. Build the category set from the observations
// 4. Assign each document's occurrences, keeping one count per document
// 5. Aggregate the counts into the frequency table and top-K lists
//
// Nothing is shared between stages except the values passed along, so the
// same corpus with the same provider always gives the same run.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::categories::aggregate::{AggregateSettings, Aggregator};
use crate::categories::assigner::CategoryAssigner;
use crate::categories::builder::CategoryBuilder;
use crate::categories::models::{AssignmentCount, Observation};
use crate::corpus::filter::ContentFilter;
use crate::corpus::models::{Corpus, GroupKey};
use crate::db::models::CategoryRun;
use crate::embeddings::traits::{Granularity, Vector, VectorProvider};

/// Parameters of one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub threshold: f64,
    pub aggregate: AggregateSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            threshold: crate::categories::builder::DEFAULT_THRESHOLD,
            aggregate: AggregateSettings::default(),
        }
    }
}

/// Vectorized corpus: what the builder sees, and what each document assigns.
#[derive(Debug, Clone, Default)]
pub struct CollectedObservations {
    /// Input to the builder, in build order
    pub build_input: Vec<Observation>,
    /// Every eligible occurrence per document, in corpus order
    pub documents: Vec<(GroupKey, Vec<Observation>)>,
}

impl CollectedObservations {
    pub fn occurrence_count(&self) -> usize {
        self.documents.iter().map(|(_, occ)| occ.len()).sum()
    }
}

/// Gather observations from the corpus.
///
/// Per-lemma providers: the builder sees each distinct eligible lemma once,
/// in lexicographic order, and each vector is looked up once. Per-occurrence
/// providers: the builder sees every eligible occurrence in corpus order.
pub fn collect_observations(
    corpus: &Corpus,
    provider: &dyn VectorProvider,
    filter: &ContentFilter,
) -> Result<CollectedObservations> {
    let selected: Vec<Vec<(usize, String)>> = corpus
        .documents
        .iter()
        .map(|doc| filter.select(&doc.text.tokens))
        .collect();

    match provider.granularity() {
        Granularity::PerLemma => {
            let lemmas: BTreeSet<&str> = selected
                .iter()
                .flatten()
                .map(|(_, lemma)| lemma.as_str())
                .collect();

            let pb = progress_bar(lemmas.len() as u64, "Looking up lemma vectors");
            let mut vectors: HashMap<&str, Option<Vector>> = HashMap::with_capacity(lemmas.len());
            for &lemma in &lemmas {
                vectors.insert(lemma, provider.lookup_lemma(lemma)?);
                pb.inc(1);
            }
            pb.finish_and_clear();

            let build_input: Vec<Observation> = lemmas
                .iter()
                .map(|&lemma| Observation::new(lemma, vectors.get(lemma).cloned().flatten()))
                .collect();

            let documents: Vec<(GroupKey, Vec<Observation>)> = corpus
                .documents
                .iter()
                .zip(&selected)
                .map(|(doc, positions)| {
                    let occurrences: Vec<Observation> = positions
                        .iter()
                        .map(|(_, lemma)| {
                            Observation::new(
                                lemma.as_str(),
                                vectors.get(lemma.as_str()).cloned().flatten(),
                            )
                        })
                        .collect();
                    (doc.group.clone(), occurrences)
                })
                .collect();

            Ok(CollectedObservations {
                build_input,
                documents,
            })
        }
        Granularity::PerOccurrence => {
            let pb = progress_bar(corpus.documents.len() as u64, "Embedding documents");
            let mut documents = Vec::with_capacity(corpus.documents.len());
            for (doc, positions) in corpus.documents.iter().zip(&selected) {
                let vectors = provider.lookup_many(&doc.text, positions)?;
                let occurrences: Vec<Observation> = positions
                    .iter()
                    .zip(vectors)
                    .map(|((_, lemma), vector)| Observation::new(lemma.as_str(), vector))
                    .collect();
                documents.push((doc.group.clone(), occurrences));
                pb.inc(1);
            }
            pb.finish_and_clear();

            let build_input: Vec<Observation> = documents
                .iter()
                .flat_map(|(_, occ)| occ.iter().cloned())
                .collect();

            Ok(CollectedObservations {
                build_input,
                documents,
            })
        }
    }
}

/// Run the whole pipeline and return the finished run (not yet stored).
pub fn run(
    corpus: &Corpus,
    provider: &dyn VectorProvider,
    filter: &ContentFilter,
    settings: &PipelineSettings,
) -> Result<CategoryRun> {
    let builder = CategoryBuilder::new(settings.threshold)?;

    info!(
        documents = corpus.documents.len(),
        provider = provider.name(),
        pos = %filter.pos_filter(),
        "Collecting observations"
    );
    let collected = collect_observations(corpus, provider, filter)?;

    let categories = builder.build(&collected.build_input);

    let assigner = CategoryAssigner::new(&categories);
    let mut per_group: Vec<(GroupKey, AssignmentCount)> = corpus
        .groups()
        .into_iter()
        .map(|g| (g, AssignmentCount::new()))
        .collect();
    let mut dropped = 0usize;
    for (group, occurrences) in &collected.documents {
        let assignments = assigner.assign(occurrences);
        dropped += assignments.dropped;
        per_group.push((group.clone(), assignments.counts));
    }

    let aggregation =
        Aggregator::for_categories(settings.aggregate, &categories).aggregate(per_group);

    info!(
        categories = categories.len(),
        occurrences = collected.occurrence_count(),
        dropped,
        columns = aggregation.table.columns.len(),
        "Categorization complete"
    );

    let pos = filter.pos_filter();
    Ok(CategoryRun {
        label: pos.label(),
        pos_tags: pos.to_string(),
        provider: provider.name().to_string(),
        threshold: settings.threshold,
        settings: settings.aggregate,
        document_count: corpus.documents.len(),
        observation_count: collected.build_input.len(),
        dropped_occurrences: dropped,
        categories,
        aggregation,
        created_at: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        corpus_path: None,
    })
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message);
    pb
}
