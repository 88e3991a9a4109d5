// Per-occurrence contextual embeddings from a local ONNX transformer.
//
// A lemma's vector depends on the sentence it appears in. The annotated words
// of a text are fed to the tokenizer pre-tokenized, so every word-piece knows
// which word it came from; a word's vector is the mean of the last hidden
// states of its word-pieces.
//
// Truncation from `tokenizer.json` is switched off on load. Long texts are
// processed in windows of words instead, and a window whose pieces exceed the
// model's maximum sequence length is halved until every part fits. Only a
// single word longer than that limit on its own goes without a vector.

use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, warn};

use super::traits::{Granularity, TokenRef, Vector, VectorProvider};
use crate::corpus::models::AnnotatedText;

/// Words per model pass. Word-piece expansion for German rarely exceeds ~2.5
/// pieces per word, which keeps a window under 512 pieces.
pub const DEFAULT_WINDOW_WORDS: usize = 128;

/// Longest input the model accepts, in word-pieces including special tokens.
pub const MAX_SEQUENCE_PIECES: usize = 512;

/// Transformer-backed provider. `Session::run` needs `&mut`, so the session
/// sits behind a Mutex while the provider itself is shared by reference.
pub struct ContextualEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    window: usize,
}

impl ContextualEmbedder {
    /// Load the model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Run `wortfeld download-model` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `wortfeld download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `wortfeld download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;
        let tokenizer = prepare_tokenizer(tokenizer)?;

        debug!(
            "Loaded contextual embedding model from {}",
            model_dir.display()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            window: DEFAULT_WINDOW_WORDS,
        })
    }

    /// Override the number of words per model pass (minimum 1).
    pub fn with_window(mut self, words: usize) -> Self {
        self.window = words.max(1);
        self
    }

    fn encode(&self, words: &[&str]) -> Result<Encoding> {
        self.tokenizer
            .encode(words.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
    }

    /// Embed a window of words, one slot per word, in as many model passes
    /// as it takes to stay within `MAX_SEQUENCE_PIECES`.
    fn embed_window(&self, words: &[&str]) -> Result<Vec<Option<Vector>>> {
        let mut out: Vec<Option<Vector>> = vec![None; words.len()];
        let ranges = fitting_ranges(0..words.len(), MAX_SEQUENCE_PIECES, |range| {
            Ok(self.encode(&words[range])?.get_ids().len())
        })?;
        for range in ranges {
            let vectors = self.embed_words(&words[range.clone()])?;
            for (slot, vector) in out[range].iter_mut().zip(vectors) {
                *slot = vector;
            }
        }
        Ok(out)
    }

    /// Embed a run of words in one model pass, one slot per word.
    fn embed_words(&self, words: &[&str]) -> Result<Vec<Option<Vector>>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let encoding = self.encode(words)?;

        let seq_len = encoding.get_ids().len();
        if seq_len == 0 {
            return Ok(vec![None; words.len()]);
        }

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = vec![0; seq_len];

        let shape = [1i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
            .context("Failed to create attention_mask tensor")?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .context("Failed to create token_type_ids tensor")?;

        // Output 0 is last_hidden_state: [1, seq_len, hidden]
        let hidden_states = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

            let outputs = session
                .run(ort::inputs! {
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor,
                    "token_type_ids" => token_type_ids_tensor
                })
                .context("Embedding ONNX inference failed")?;

            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("Failed to extract embedding output tensor")?;

            data.to_vec()
        };

        if hidden_states.is_empty() || hidden_states.len() % seq_len != 0 {
            anyhow::bail!(
                "Unexpected hidden state size {} for sequence length {}",
                hidden_states.len(),
                seq_len
            );
        }
        let hidden = hidden_states.len() / seq_len;

        Ok(pool_word_pieces(
            encoding.get_word_ids(),
            &hidden_states,
            hidden,
            words.len(),
        ))
    }
}

/// Drop any truncation (and padding) configured in `tokenizer.json`, so every
/// word of a window gets its pieces.
fn prepare_tokenizer(mut tokenizer: Tokenizer) -> Result<Tokenizer> {
    tokenizer
        .with_truncation(None)
        .map_err(|e| anyhow::anyhow!("Failed to disable tokenizer truncation: {}", e))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Split `range` into consecutive parts of at most `max_pieces` pieces each.
///
/// Parts are halved until they fit and come back in ascending order. A single
/// word that is too long on its own is left out.
fn fitting_ranges<F>(range: Range<usize>, max_pieces: usize, mut pieces: F) -> Result<Vec<Range<usize>>>
where
    F: FnMut(Range<usize>) -> Result<usize>,
{
    let mut fitting = Vec::new();
    let mut pending = vec![range];

    while let Some(range) = pending.pop() {
        if range.is_empty() {
            continue;
        }
        if pieces(range.clone())? <= max_pieces {
            fitting.push(range);
            continue;
        }
        if range.len() == 1 {
            warn!(word = range.start, max_pieces, "Word exceeds model sequence length");
            continue;
        }
        let mid = range.start + range.len() / 2;
        pending.push(mid..range.end);
        pending.push(range.start..mid);
    }

    Ok(fitting)
}

/// Average the hidden states of each word's pieces.
///
/// `word_ids[j]` names the word piece `j` belongs to (None for special
/// tokens). Words without any piece get None.
fn pool_word_pieces(
    word_ids: &[Option<u32>],
    hidden_states: &[f32],
    hidden: usize,
    word_count: usize,
) -> Vec<Option<Vector>> {
    let mut sums: Vec<Option<(Vec<f64>, usize)>> = vec![None; word_count];

    for (piece, word) in word_ids.iter().enumerate() {
        let Some(word) = word.map(|w| w as usize) else {
            continue;
        };
        if word >= word_count {
            continue;
        }
        let offset = piece * hidden;
        let Some(state) = hidden_states.get(offset..offset + hidden) else {
            continue;
        };
        let (sum, count) = sums[word].get_or_insert_with(|| (vec![0.0; hidden], 0));
        for (acc, &v) in sum.iter_mut().zip(state) {
            *acc += v as f64;
        }
        *count += 1;
    }

    sums.into_iter()
        .map(|slot| {
            slot.map(|(sum, count)| sum.iter().map(|v| (v / count as f64) as f32).collect())
        })
        .collect()
}

impl VectorProvider for ContextualEmbedder {
    fn name(&self) -> &str {
        "contextual"
    }

    fn granularity(&self) -> Granularity {
        Granularity::PerOccurrence
    }

    fn lookup(&self, token: TokenRef<'_>) -> Result<Option<Vector>> {
        let positions = [(token.index, token.lemma.to_string())];
        let mut vectors = self.lookup_many(token.text, &positions)?;
        Ok(vectors.pop().flatten())
    }

    fn lookup_many(
        &self,
        text: &AnnotatedText,
        positions: &[(usize, String)],
    ) -> Result<Vec<Option<Vector>>> {
        let words = text.words();
        let mut out: Vec<Option<Vector>> = vec![None; positions.len()];

        for start in (0..words.len()).step_by(self.window) {
            let end = (start + self.window).min(words.len());
            let wanted: Vec<(usize, usize)> = positions
                .iter()
                .enumerate()
                .filter(|(_, (index, _))| *index >= start && *index < end)
                .map(|(slot, (index, _))| (slot, *index))
                .collect();
            if wanted.is_empty() {
                continue;
            }

            let mut window_vectors = self.embed_window(&words[start..end])?;
            for (slot, index) in wanted {
                out[slot] = window_vectors[index - start].take();
            }
        }

        debug!(
            words = words.len(),
            requested = positions.len(),
            "Computed contextual vectors"
        );

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// Word-level tokenizer whose file caps sequences at four pieces.
    fn truncating_tokenizer() -> Tokenizer {
        let json = r#"{
  "version": "1.0",
  "truncation": {"direction": "Right", "max_length": 4, "strategy": "LongestFirst", "stride": 0},
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": {"type": "Whitespace"},
  "post_processor": null,
  "decoder": null,
  "model": {"type": "WordLevel", "vocab": {"[UNK]": 0, "gut": 1, "schnell": 2}, "unk_token": "[UNK]"}
}"#;
        Tokenizer::from_str(json).unwrap()
    }

    fn ten_words() -> Vec<&'static str> {
        vec!["gut", "schnell", "rasch", "gut", "schlecht", "neu", "alt", "gut", "kurz", "lang"]
    }

    #[test]
    fn test_pool_averages_pieces_per_word() {
        // [CLS] w0 w0 w1 [SEP], hidden size 2
        let word_ids = vec![None, Some(0), Some(0), Some(1), None];
        let states = vec![
            9.0, 9.0, // CLS
            1.0, 2.0, // w0 piece 1
            3.0, 4.0, // w0 piece 2
            5.0, 6.0, // w1
            9.0, 9.0, // SEP
        ];
        let pooled = pool_word_pieces(&word_ids, &states, 2, 2);
        assert_eq!(pooled[0], Some(vec![2.0, 3.0]));
        assert_eq!(pooled[1], Some(vec![5.0, 6.0]));
    }

    #[test]
    fn test_pool_missing_word_is_none() {
        // Word 1 was truncated away
        let word_ids = vec![None, Some(0), None];
        let states = vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let pooled = pool_word_pieces(&word_ids, &states, 2, 2);
        assert_eq!(pooled[0], Some(vec![1.0, 1.0]));
        assert_eq!(pooled[1], None);
    }

    #[test]
    fn test_pool_ignores_out_of_range_pieces() {
        let word_ids = vec![Some(0), Some(5)];
        let states = vec![1.0, 3.0];
        let pooled = pool_word_pieces(&word_ids, &states, 1, 1);
        assert_eq!(pooled, vec![Some(vec![1.0])]);
    }

    #[test]
    fn test_prepared_tokenizer_keeps_every_word() {
        let words = ten_words();

        let raw = truncating_tokenizer().encode(words.clone(), true).unwrap();
        assert_eq!(raw.get_ids().len(), 4);

        let tokenizer = prepare_tokenizer(truncating_tokenizer()).unwrap();
        assert!(tokenizer.get_truncation().is_none());
        let encoding = tokenizer.encode(words.clone(), true).unwrap();
        let seq_len = encoding.get_ids().len();
        assert_eq!(seq_len, words.len());

        // Every word gets a pooled vector once truncation is off
        let states: Vec<f32> = (0..seq_len).map(|i| i as f32 + 1.0).collect();
        let pooled = pool_word_pieces(encoding.get_word_ids(), &states, 1, words.len());
        assert!(pooled.iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_fitting_ranges_cover_every_word_in_order() {
        // Two pieces per word plus two special tokens
        let ranges = fitting_ranges(0..10, 8, |r| Ok(r.len() * 2 + 2)).unwrap();
        assert!(ranges.iter().all(|r| r.len() * 2 + 2 <= 8));
        let covered: Vec<usize> = ranges.into_iter().flatten().collect();
        assert_eq!(covered, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_fitting_ranges_keep_window_that_fits() {
        let ranges = fitting_ranges(3..7, 512, |r| Ok(r.len())).unwrap();
        assert_eq!(ranges, vec![3..7]);
    }

    #[test]
    fn test_fitting_ranges_drop_only_oversized_word() {
        // Word 2 alone is longer than the limit
        let ranges = fitting_ranges(0..4, 5, |r| Ok(r.map(|w| if w == 2 { 9 } else { 1 }).sum())).unwrap();
        let covered: Vec<usize> = ranges.into_iter().flatten().collect();
        assert_eq!(covered, vec![0, 1, 3]);
    }

    #[test]
    fn test_load_missing_model_fails_with_hint() {
        let dir = std::env::temp_dir().join("wortfeld-test-no-model");
        let err = ContextualEmbedder::load(&dir).err().expect("load should fail");
        assert!(err.to_string().contains("download-model"));
    }
}
