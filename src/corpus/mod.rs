// Corpus — annotated documents, their groups, and content-word selection.

pub mod filter;
pub mod models;
pub mod reader;
