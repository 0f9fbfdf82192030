//! Vector-similarity lookups over stored chunks.

use std::sync::Arc;

use tracing::{debug, instrument};

use garden_core::defaults;
use garden_core::{
    strategy, EmbeddingChunkRepository, Error, Result, RetrievedItem, SimilarBookmark,
};
use garden_inference::VectorEmbedder;

/// Nearest Q&A fragments and nearest bookmarks for free-text queries.
#[derive(Clone)]
pub struct SimilaritySearch {
    chunks: Arc<dyn EmbeddingChunkRepository>,
    embedder: VectorEmbedder,
}

impl SimilaritySearch {
    pub fn new(chunks: Arc<dyn EmbeddingChunkRepository>, embedder: VectorEmbedder) -> Self {
        Self { chunks, embedder }
    }

    /// Top-`limit` Q&A fragments for `query`, ranked 1..n.
    #[instrument(skip(self), fields(subsystem = "search", component = "similar", op = "similar_questions"))]
    pub async fn similar_questions(&self, query: &str, limit: i64) -> Result<Vec<RetrievedItem>> {
        let query_vector = self.embedder.embed(query).await?;
        let items = self.chunks.similar_questions(&query_vector, limit).await?;
        debug!(result_count = items.len(), "Similar questions retrieved");
        Ok(items)
    }

    /// Bookmarks nearest to `query` among chunks of one strategy
    /// (default `qa-v2-passage`, limit 10).
    #[instrument(skip(self), fields(subsystem = "search", component = "similar", op = "similar_bookmarks"))]
    pub async fn similar_bookmarks(
        &self,
        query: &str,
        strategy_name: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<SimilarBookmark>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query is required".to_string()));
        }
        let strategy_name = strategy_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(strategy::QA_V2_PASSAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(defaults::SIMILAR_BOOKMARKS_LIMIT);

        let query_vector = self.embedder.embed(query).await?;
        let bookmarks = self
            .chunks
            .similar_bookmarks(&query_vector, strategy_name, limit)
            .await?;
        debug!(result_count = bookmarks.len(), strategy = strategy_name, "Similar bookmarks retrieved");
        Ok(bookmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_core::memory::InMemoryStore;
    use garden_core::{BookmarkRepository, EmbeddingBackend, TitleSource, Vector};
    use garden_inference::mock::MockInferenceBackend;

    const DIM: usize = 16;

    async fn vector_of(backend: &MockInferenceBackend, text: &str) -> Vector {
        backend.embed_texts(&[text.to_string()]).await.unwrap().remove(0)
    }

    fn search(store: &InMemoryStore, backend: &MockInferenceBackend) -> SimilaritySearch {
        SimilaritySearch::new(
            Arc::new(store.clone()),
            VectorEmbedder::new(Arc::new(backend.clone())),
        )
    }

    #[tokio::test]
    async fn test_similar_questions_split_and_rank() {
        let store = InMemoryStore::new().with_dimension(DIM);
        let backend = MockInferenceBackend::new().with_dimension(DIM);
        let bookmark = store.add_bookmark("https://example.com/borrow");
        store
            .insert_title(bookmark.id, "Borrowing", &TitleSource::Reader)
            .await
            .unwrap();

        let close = vector_of(&backend, "what is borrowing").await;
        store.add_chunk(bookmark.id, strategy::QA_V2_PASSAGE, "What is borrowing?\nTaking a reference.", close);
        store.add_chunk(
            bookmark.id,
            strategy::CHUNKED_READER,
            "not a question",
            vector_of(&backend, "what is borrowing").await,
        );

        let items = search(&store, &backend)
            .similar_questions("what is borrowing", 10)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].question, "What is borrowing?");
        assert_eq!(items[0].answer, "Taking a reference.");
        assert_eq!(items[0].bookmark_title, "Borrowing");
        assert_eq!(items[0].url, "https://example.com/borrow");
        assert!((items[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_similar_bookmarks_defaults_to_passage_strategy() {
        let store = InMemoryStore::new().with_dimension(DIM);
        let backend = MockInferenceBackend::new().with_dimension(DIM);
        let passage = store.add_bookmark("https://example.com/passage");
        let reader = store.add_bookmark("https://example.com/reader");
        store.add_chunk(passage.id, strategy::QA_V2_PASSAGE, "q?\na", vector_of(&backend, "ownership").await);
        store.add_chunk(reader.id, strategy::CHUNKED_READER, "text", vector_of(&backend, "ownership").await);

        let svc = search(&store, &backend);
        let hits = svc.similar_bookmarks("ownership", None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bookmark.id, passage.id);

        let hits = svc
            .similar_bookmarks("ownership", Some(strategy::CHUNKED_READER), Some(5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bookmark.id, reader.id);
    }

    #[tokio::test]
    async fn test_similar_bookmarks_requires_query() {
        let store = InMemoryStore::new();
        let backend = MockInferenceBackend::new();
        let result = search(&store, &backend).similar_bookmarks(" ", None, None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(backend.embed_call_count(), 0);
    }
}
