// Vector provider trait — the swap-ready embedding abstraction.
//
// Category building and assignment never know where vectors come from. A
// provider either has one vector per lemma (static word vectors) or one per
// occurrence (a transformer that reads the surrounding text). Both fit behind
// this trait, and the pipeline asks `granularity()` to decide how to gather
// observations.

use anyhow::Result;

use crate::corpus::models::AnnotatedText;

/// A dense embedding vector.
pub type Vector = Vec<f32>;

/// Whether a provider's vectors depend on context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One vector per lemma, independent of where it occurs
    PerLemma,
    /// One vector per occurrence, computed from the surrounding text
    PerOccurrence,
}

/// One token occurrence: a position inside an annotated text, plus the
/// normalized lemma the content filter derived for it.
#[derive(Debug, Clone, Copy)]
pub struct TokenRef<'a> {
    pub text: &'a AnnotatedText,
    pub index: usize,
    pub lemma: &'a str,
}

/// Trait for looking up embedding vectors.
pub trait VectorProvider {
    /// Short name for logs and stored run metadata.
    fn name(&self) -> &str;

    fn granularity(&self) -> Granularity;

    /// Vector for one token occurrence, or None if the provider has none.
    fn lookup(&self, token: TokenRef<'_>) -> Result<Option<Vector>>;

    /// Vectors for several occurrences of the same text, in the same order as
    /// `positions`. The default calls `lookup` one by one; providers that run
    /// a model over the whole text override this.
    fn lookup_many(
        &self,
        text: &AnnotatedText,
        positions: &[(usize, String)],
    ) -> Result<Vec<Option<Vector>>> {
        positions
            .iter()
            .map(|(index, lemma)| {
                self.lookup(TokenRef {
                    text,
                    index: *index,
                    lemma,
                })
            })
            .collect()
    }

    /// Vector for a bare lemma with no surrounding text.
    ///
    /// Used when a per-lemma provider builds categories from the distinct
    /// lemma list. Contextual providers embed the lemma as a one-word text.
    fn lookup_lemma(&self, lemma: &str) -> Result<Option<Vector>> {
        let text = AnnotatedText::new(vec![crate::corpus::models::AnnotatedToken::new(
            lemma, lemma, "X",
        )]);
        self.lookup(TokenRef {
            text: &text,
            index: 0,
            lemma,
        })
    }
}
