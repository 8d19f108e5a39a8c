//! Question answering capabilities backed by language models.
//!
//! This module provides `LlmExtractor`, which uses an Ollama-compatible model
//! to pick an answer span out of a passage.

mod extractor;

pub use extractor::{LlmExtractor, LlmExtractorBuilder};
