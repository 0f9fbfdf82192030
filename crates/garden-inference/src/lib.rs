//! # garden-inference
//!
//! Embedding and generation backends for garden.
//!
//! This crate provides:
//! - Sentence-aware text chunking
//! - Single-vector and chunked embedders over any [`EmbeddingBackend`]
//! - Ollama implementation (default, feature `ollama`)
//! - Client for the external `[text, vector]` tuple embedding service
//! - Article summarization and `<think>` span handling
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Expose the deterministic mock backend to dependent crates
//! - `integration`: Run tests against a live inference server
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use garden_inference::{OllamaBackend, VectorEmbedder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(OllamaBackend::from_env());
//!     let embedder = VectorEmbedder::new(backend);
//!     let vector = embedder.embed("Hello").await.unwrap();
//! }
//! ```

pub mod chunker;
pub mod embedder;
pub mod service;
pub mod summarizer;
pub mod thinking;

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use garden_core::{
    ChunkedEmbeddingBackend, EmbeddedChunk, EmbeddingBackend, GenerationBackend,
};

pub use chunker::{split_sentences, SentenceChunker};
pub use embedder::{ChunkedEmbedder, VectorEmbedder};
pub use service::EmbeddingServiceBackend;
pub use summarizer::{summary_prompt, Summarizer};
pub use thinking::{parse_thinking_response, strip_thinking, ThinkingResponse};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaConfig};
