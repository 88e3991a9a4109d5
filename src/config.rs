use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::categories::aggregate::{DEFAULT_MAX_CATEGORIES, DEFAULT_TOP_K};
use crate::categories::builder::DEFAULT_THRESHOLD;

/// Which vector provider to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBackend {
    /// Static word vectors from a text file (default) — one vector per lemma
    Static,
    /// Local ONNX transformer — one vector per occurrence, needs download-model
    Contextual,
}

impl FromStr for ProviderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "contextual" => Ok(Self::Contextual),
            other => anyhow::bail!("Unknown provider {other:?} (expected static or contextual)"),
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Command-line
/// flags override the numeric settings per run.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Directory containing downloaded model files
    pub model_dir: PathBuf,
    /// Static word-vector file (word2vec / fastText text format)
    pub vectors_path: Option<PathBuf>,
    /// Where report files are written
    pub output_dir: PathBuf,
    pub provider: ProviderBackend,
    pub threshold: f64,
    pub max_categories: usize,
    pub top_k: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the vector file, which is only
    /// required when the static provider actually runs.
    pub fn load() -> Result<Self> {
        let provider = match env::var("WORTFELD_PROVIDER") {
            Ok(value) => value.parse().context("Invalid WORTFELD_PROVIDER")?,
            Err(_) => ProviderBackend::Static,
        };

        let model_dir = env::var("WORTFELD_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::embeddings::download::default_model_dir());

        Ok(Self {
            db_path: env::var("WORTFELD_DB_PATH").unwrap_or_else(|_| "./wortfeld.db".to_string()),
            model_dir,
            vectors_path: env::var("WORTFELD_VECTORS")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            output_dir: env::var("WORTFELD_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            provider,
            threshold: parse_var("WORTFELD_THRESHOLD", DEFAULT_THRESHOLD)?,
            max_categories: parse_var("WORTFELD_MAX_CATEGORIES", DEFAULT_MAX_CATEGORIES)?,
            top_k: parse_var("WORTFELD_TOP_K", DEFAULT_TOP_K)?,
        })
    }

    /// Check that a static vector file is configured and exists.
    pub fn require_vectors(&self) -> Result<&PathBuf> {
        let Some(path) = self.vectors_path.as_ref() else {
            anyhow::bail!(
                "WORTFELD_VECTORS not set. Point it at a word-vector file \
                 (word2vec / fastText text format) in your .env file,\n\
                 or set WORTFELD_PROVIDER=contextual to use the transformer model."
            );
        };
        if !path.exists() {
            anyhow::bail!("Vector file not found: {}", path.display());
        }
        Ok(path)
    }

    /// Check that the contextual model has been downloaded.
    pub fn require_model(&self) -> Result<PathBuf> {
        if !crate::embeddings::download::contextual_files_present(&self.model_dir) {
            anyhow::bail!(
                "Contextual model files not found in {}\n\
                 Run `wortfeld download-model` to download them.\n\
                 Or set WORTFELD_PROVIDER=static to use a word-vector file instead.",
                self.model_dir.display()
            );
        }
        Ok(crate::embeddings::download::contextual_model_dir(&self.model_dir))
    }
}

/// Read a numeric variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {name}={raw:?}: {e}")),
        _ => Ok(default),
    }
}
