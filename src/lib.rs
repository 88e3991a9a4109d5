// Wortfeld: Emergent semantic categories across human and generated text
//
// This is the library root. Each module corresponds to a stage or concern of
// the categorization pipeline.

pub mod analysis;
pub mod categories;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embeddings;
pub mod output;
pub mod pipeline;
pub mod status;
