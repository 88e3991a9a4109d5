// Static per-lemma word vectors from a word2vec / fastText text file.
//
// File format: one word per line followed by its components, separated by
// spaces. An optional first line "<count> <dim>" is recognized and skipped.
// Keys are folded to lowercase because lemmas are lowercased by the content
// filter; when two spellings fold together, the first one in the file wins
// (these files are sorted by frequency).

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::similarity::is_finite_vector;
use super::traits::{Granularity, TokenRef, Vector, VectorProvider};

/// In-memory lemma → vector table.
pub struct StaticVectors {
    vectors: HashMap<String, Vector>,
    dim: usize,
}

impl StaticVectors {
    /// Load vectors from a text file.
    ///
    /// With a `vocabulary`, only those (lowercase) words are kept, which keeps
    /// memory bounded when the file covers millions of words.
    pub fn load(path: &Path, vocabulary: Option<&HashSet<String>>) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open vector file {}", path.display()))?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg} ({pos} lines)")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Reading {}", path.display()));

        let vectors = Self::from_reader(BufReader::new(file), vocabulary, Some(&spinner))
            .with_context(|| format!("Failed to read vector file {}", path.display()))?;
        spinner.finish_and_clear();

        info!(
            path = %path.display(),
            words = vectors.len(),
            dim = vectors.dim,
            "Loaded static word vectors"
        );
        Ok(vectors)
    }

    /// Parse vectors from any buffered reader.
    pub fn from_reader<R: BufRead>(
        reader: R,
        vocabulary: Option<&HashSet<String>>,
        progress: Option<&ProgressBar>,
    ) -> Result<Self> {
        let mut vectors: HashMap<String, Vector> = HashMap::new();
        let mut dim = 0usize;
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some(pb) = progress {
                pb.inc(1);
            }

            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else {
                continue;
            };
            let rest: Vec<&str> = parts.collect();

            // "<count> <dim>" header
            if line_no == 0 && rest.len() == 1 && word.parse::<usize>().is_ok() {
                if let Ok(d) = rest[0].parse::<usize>() {
                    dim = d;
                    continue;
                }
            }

            let key = word.to_lowercase();
            if vectors.contains_key(&key) {
                continue;
            }
            if let Some(vocab) = vocabulary {
                if !vocab.contains(&key) {
                    continue;
                }
            }

            let values = match rest.iter().map(|v| v.parse::<f32>()).collect::<Result<Vector, _>>() {
                Ok(values) if !values.is_empty() && is_finite_vector(&values) => values,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            if dim == 0 {
                dim = values.len();
            }
            if values.len() != dim {
                skipped += 1;
                continue;
            }

            vectors.insert(key, values);
        }

        if skipped > 0 {
            warn!(skipped, "Skipped malformed vector lines");
        }

        Ok(Self { vectors, dim })
    }

    /// Build a table from explicit pairs (all vectors must share a dimension).
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vector)>,
        S: Into<String>,
    {
        let mut vectors = HashMap::new();
        let mut dim = 0usize;
        for (word, vector) in pairs {
            if dim == 0 {
                dim = vector.len();
            } else if vector.len() != dim {
                anyhow::bail!(
                    "Vector dimension mismatch: expected {dim}, got {}",
                    vector.len()
                );
            }
            let word = word.into();
            if !is_finite_vector(&vector) {
                anyhow::bail!("Vector for '{word}' has a NaN or infinite component");
            }
            vectors.insert(word.to_lowercase(), vector);
        }
        Ok(Self { vectors, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, lemma: &str) -> Option<&Vector> {
        self.vectors
            .get(lemma)
            .or_else(|| self.vectors.get(&lemma.to_lowercase()))
    }
}

impl VectorProvider for StaticVectors {
    fn name(&self) -> &str {
        "static"
    }

    fn granularity(&self) -> Granularity {
        Granularity::PerLemma
    }

    fn lookup(&self, token: TokenRef<'_>) -> Result<Option<Vector>> {
        Ok(self.get(token.lemma).cloned())
    }

    fn lookup_lemma(&self, lemma: &str) -> Result<Option<Vector>> {
        Ok(self.get(lemma).cloned())
    }
}
