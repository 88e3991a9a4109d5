// Embeddings — vector providers and similarity.
//
// StaticVectors gives one vector per lemma from a word-vector file;
// ContextualEmbedder gives one vector per occurrence from a local transformer.

pub mod contextual;
pub mod download;
pub mod similarity;
pub mod static_vectors;
pub mod traits;
