// Model download helper for the contextual embedding model.
//
// Fetches a multilingual sentence-transformer (covers German) exported to
// ONNX, plus its tokenizer, from HuggingFace. Files are stored in a
// platform-appropriate directory (~/.local/share/wortfeld/models/ on Linux)
// so they persist across runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// HuggingFace repo for the contextual embedding model.
const CONTEXTUAL_HF_URL: &str =
    "https://huggingface.co/sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2/resolve/main";

/// Remote file paths inside the repo.
const CONTEXTUAL_MODEL_FILE: &str = "onnx/model.onnx";
const CONTEXTUAL_TOKENIZER_FILE: &str = "tokenizer.json";

/// Subdirectory name for the model inside the model directory.
const CONTEXTUAL_MODEL_NAME: &str = "paraphrase-multilingual-MiniLM-L12-v2";

/// Returns the default directory for storing model files.
/// Uses the platform data directory: ~/.local/share/wortfeld/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wortfeld")
        .join("models")
}

/// Subdirectory within model_dir for the contextual model.
pub fn contextual_model_dir(base: &Path) -> PathBuf {
    base.join(CONTEXTUAL_MODEL_NAME)
}

/// Check whether both contextual model files exist.
pub fn contextual_files_present(base: &Path) -> bool {
    let dir = contextual_model_dir(base);
    dir.join("model.onnx").exists() && dir.join("tokenizer.json").exists()
}

/// Download the contextual model and tokenizer.
///
/// Skips files that already exist. Creates directories as needed.
pub async fn download_model(base: &Path) -> Result<()> {
    let dir = contextual_model_dir(base);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\nContextual embedding model ({CONTEXTUAL_MODEL_NAME}):");

    let tokenizer_path = dir.join("tokenizer.json");
    if tokenizer_path.exists() {
        info!("Tokenizer already exists, skipping");
        println!("  tokenizer.json (already exists)");
    } else {
        println!("  Downloading tokenizer.json...");
        download_file(
            &format!("{}/{}", CONTEXTUAL_HF_URL, CONTEXTUAL_TOKENIZER_FILE),
            &tokenizer_path,
            false,
        )
        .await?;
    }

    let model_path = dir.join("model.onnx");
    if model_path.exists() {
        info!("Model already exists, skipping");
        println!("  model.onnx (already exists)");
    } else {
        println!("  Downloading model.onnx (~470 MB)...");
        download_file(
            &format!("{}/{}", CONTEXTUAL_HF_URL, CONTEXTUAL_MODEL_FILE),
            &model_path,
            true,
        )
        .await?;
    }

    Ok(())
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = if show_progress {
        Some(progress_bar(response.content_length()))
    } else {
        None
    };

    // Write through a temporary name so an interrupted download never looks
    // like a complete model on the next run.
    let partial = dest.with_extension("part");
    let mut bytes: Vec<u8> = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        bytes.extend_from_slice(&chunk);
        if let Some(ref pb) = pb {
            pb.set_position(bytes.len() as u64);
        }
    }

    std::fs::write(&partial, &bytes)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

fn progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) =
                ProgressStyle::default_bar().template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("=> "));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("    {spinner} {bytes}") {
                pb.set_style(style);
            }
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_wortfeld() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("wortfeld") && path_str.contains("models"),
            "Expected path containing wortfeld/models, got: {path_str}"
        );
    }

    #[test]
    fn test_contextual_model_dir_is_subdirectory() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(contextual_model_dir(&base), base.join(CONTEXTUAL_MODEL_NAME));
    }

    #[test]
    fn test_files_present_false_when_empty() {
        let dir = std::env::temp_dir().join("wortfeld-test-nonexistent");
        assert!(!contextual_files_present(&dir));
    }

    #[test]
    fn test_files_present_true_when_files_exist() {
        let base = tempfile::tempdir().unwrap();
        let dir = contextual_model_dir(base.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.onnx"), b"fake").unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"fake").unwrap();

        assert!(contextual_files_present(base.path()));
    }
}
