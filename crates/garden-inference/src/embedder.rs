//! Vector and chunked embedders over an [`EmbeddingBackend`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use garden_core::{
    ChunkedEmbeddingBackend, EmbeddedChunk, EmbeddingBackend, Error, Result, Vector,
};

use crate::chunker::SentenceChunker;

/// Maps one text to one vector.
#[derive(Clone)]
pub struct VectorEmbedder {
    backend: Arc<dyn EmbeddingBackend>,
}

impl VectorEmbedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    /// Embed `text`.
    ///
    /// Blank input produces no vector and is reported as an error, as is a
    /// backend that returns nothing.
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "embedder", op = "embed", text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vector> {
        if text.trim().is_empty() {
            return Err(Error::Embedding("no embedding returned for empty input".to_string()));
        }
        self.backend
            .embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Chunks text with a [`SentenceChunker`] and embeds every chunk.
#[derive(Clone)]
pub struct ChunkedEmbedder {
    backend: Arc<dyn EmbeddingBackend>,
    chunker: SentenceChunker,
}

impl ChunkedEmbedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self::with_chunker(backend, SentenceChunker::default())
    }

    pub fn with_chunker(backend: Arc<dyn EmbeddingBackend>, chunker: SentenceChunker) -> Self {
        Self { backend, chunker }
    }
}

#[async_trait]
impl ChunkedEmbeddingBackend for ChunkedEmbedder {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "embedder", op = "embed_chunks", text_len = text.len()))]
    async fn embed_chunks(&self, text: &str) -> Result<Vec<EmbeddedChunk>> {
        let start = Instant::now();
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.backend.embed_texts(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| EmbeddedChunk { text, vector })
            .collect();

        debug!(
            chunk_count = embedded.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Chunked embedding complete"
        );
        Ok(embedded)
    }
}
