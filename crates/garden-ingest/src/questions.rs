//! Q&A fragment edits with an audit trail.
//!
//! Every successful mutation appends a `qa-edit` or `qa-delete`
//! observation referring to the bookmark. The audit write is auxiliary: a
//! failure is logged and does not undo or fail the mutation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use garden_core::{
    compose_question_answer, observation, BookmarkRepository, BookmarkWithTitle,
    ChunkedEmbeddingBackend, DeleteQuestionRequest, EmbeddingChunkRepository, Error,
    NewObservation, ObservationRepository, QaDeletePayload, QaEditPayload, Result,
    UpdateQuestionRequest,
};

/// Rewrites and deletes Q&A chunks of a bookmark.
#[derive(Clone)]
pub struct QuestionService {
    bookmarks: Arc<dyn BookmarkRepository>,
    chunks: Arc<dyn EmbeddingChunkRepository>,
    observations: Arc<dyn ObservationRepository>,
    embedder: Arc<dyn ChunkedEmbeddingBackend>,
}

impl QuestionService {
    pub fn new(
        bookmarks: Arc<dyn BookmarkRepository>,
        chunks: Arc<dyn EmbeddingChunkRepository>,
        observations: Arc<dyn ObservationRepository>,
        embedder: Arc<dyn ChunkedEmbeddingBackend>,
    ) -> Self {
        Self {
            bookmarks,
            chunks,
            observations,
            embedder,
        }
    }

    async fn bookmark(&self, bookmark_id: Uuid) -> Result<BookmarkWithTitle> {
        self.bookmarks
            .get_with_title(bookmark_id)
            .await?
            .ok_or(Error::BookmarkNotFound(bookmark_id))
    }

    /// Replace the question and answer of chunk `req.reference_id`,
    /// re-embedding the new content.
    #[instrument(skip(self, req), fields(subsystem = "ingest", component = "questions", op = "update_question", chunk_id = %req.reference_id))]
    pub async fn update_question(
        &self,
        bookmark_id: Uuid,
        req: UpdateQuestionRequest,
    ) -> Result<()> {
        if req.new_question.trim().is_empty() {
            return Err(Error::InvalidInput("new question must not be empty".to_string()));
        }
        let bookmark = self.bookmark(bookmark_id).await?;

        let content = compose_question_answer(&req.new_question, &req.new_answer);
        let vector = self
            .embedder
            .embed_chunks(&content)
            .await?
            .into_iter()
            .next()
            .map(|chunk| chunk.vector)
            .ok_or_else(|| Error::Embedding("no embedding returned for question".to_string()))?;

        self.chunks
            .update_chunk(bookmark_id, req.reference_id, &content, &vector)
            .await?;
        info!("Question updated");

        let payload = QaEditPayload {
            bookmark_id,
            title: bookmark.title,
            summary: bookmark.summary,
            previous_question: req.previous_question,
            previous_answer: req.previous_answer,
            new_question: req.new_question,
            new_answer: req.new_answer,
            timestamp: Utc::now(),
        };
        self.record(
            bookmark_id,
            observation::TYPE_QA_EDIT,
            observation::SOURCE_USER_EDIT,
            observation::TAGS_QA_EDIT,
            serde_json::to_value(payload),
        )
        .await;
        Ok(())
    }

    /// Delete Q&A chunk `chunk_id`; the request carries the deleted text for
    /// the audit trail.
    #[instrument(skip(self, req), fields(subsystem = "ingest", component = "questions", op = "delete_question"))]
    pub async fn delete_question(
        &self,
        bookmark_id: Uuid,
        chunk_id: Uuid,
        req: DeleteQuestionRequest,
    ) -> Result<()> {
        let bookmark = self.bookmark(bookmark_id).await?;

        if !self.chunks.delete_chunk(bookmark_id, chunk_id).await? {
            return Err(Error::NotFound(format!(
                "question {} of bookmark {}",
                chunk_id, bookmark_id
            )));
        }
        info!("Question deleted");

        let payload = QaDeletePayload {
            bookmark_id,
            title: bookmark.title,
            summary: bookmark.summary,
            question: req.question,
            answer: req.answer,
            timestamp: Utc::now(),
        };
        self.record(
            bookmark_id,
            observation::TYPE_QA_DELETE,
            observation::SOURCE_USER_DELETE,
            observation::TAGS_QA_DELETE,
            serde_json::to_value(payload),
        )
        .await;
        Ok(())
    }

    async fn record(
        &self,
        bookmark_id: Uuid,
        observation_type: &str,
        source: &str,
        tags: &str,
        data: serde_json::Result<serde_json::Value>,
    ) {
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, observation_type, "Failed to serialize audit payload");
                return;
            }
        };
        let result = self
            .observations
            .insert(NewObservation {
                data,
                observation_type: observation_type.to_string(),
                source: source.to_string(),
                tags: tags.to_string(),
                parent: None,
                ref_id: Some(bookmark_id),
            })
            .await;
        if let Err(e) = result {
            warn!(error = %e, observation_type, "Failed to record audit observation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use garden_core::memory::InMemoryStore;
    use garden_core::{split_question_answer, strategy, EmbeddedChunk, Vector};

    const DIM: usize = 3;

    /// One chunk per call with a vector derived from the text length.
    struct LengthEmbedder;

    #[async_trait]
    impl ChunkedEmbeddingBackend for LengthEmbedder {
        async fn embed_chunks(&self, text: &str) -> Result<Vec<EmbeddedChunk>> {
            Ok(vec![EmbeddedChunk {
                text: text.to_string(),
                vector: Vector::from(vec![text.len() as f32, 1.0, 0.0]),
            }])
        }
    }

    struct EmptyEmbedder;

    #[async_trait]
    impl ChunkedEmbeddingBackend for EmptyEmbedder {
        async fn embed_chunks(&self, _text: &str) -> Result<Vec<EmbeddedChunk>> {
            Ok(Vec::new())
        }
    }

    fn service(store: &InMemoryStore, embedder: Arc<dyn ChunkedEmbeddingBackend>) -> QuestionService {
        QuestionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            embedder,
        )
    }

    fn seeded() -> (InMemoryStore, Uuid, Uuid) {
        let store = InMemoryStore::new().with_dimension(DIM);
        let bookmark = store.add_bookmark("https://example.com/qa");
        let chunk = store.add_chunk(
            bookmark.id,
            strategy::QA_V2_PASSAGE,
            "What is it?\nA thing.",
            Vector::from(vec![0.0, 0.0, 1.0]),
        );
        (store, bookmark.id, chunk)
    }

    fn edit_request(chunk: Uuid) -> UpdateQuestionRequest {
        UpdateQuestionRequest {
            reference_id: chunk,
            previous_question: "What is it".to_string(),
            previous_answer: "A thing.".to_string(),
            new_question: "What is it really".to_string(),
            new_answer: "A better thing.".to_string(),
        }
    }

    // =========================================================================
    // UPDATE
    // =========================================================================

    #[tokio::test]
    async fn test_update_rewrites_content_and_vector() {
        let (store, bookmark_id, chunk) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        svc.update_question(bookmark_id, edit_request(chunk)).await.unwrap();

        let stored = store.chunks_for(bookmark_id, strategy::QA_V2_PASSAGE);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].1, "What is it really?\nA better thing.");
        assert_eq!(
            split_question_answer(&stored[0].1),
            ("What is it really?", "A better thing.")
        );
        let expected_len = "What is it really?\nA better thing.".len() as f32;
        assert_eq!(
            store.chunk_vector(chunk).unwrap().as_slice(),
            &[expected_len, 1.0, 0.0]
        );
    }

    #[tokio::test]
    async fn test_update_records_edit_observation() {
        let (store, bookmark_id, chunk) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        svc.update_question(bookmark_id, edit_request(chunk)).await.unwrap();

        let observations = store.observations();
        assert_eq!(observations.len(), 1);
        let obs = &observations[0];
        assert_eq!(obs.observation_type.as_deref(), Some("qa-edit"));
        assert_eq!(obs.source.as_deref(), Some("user-edit"));
        assert_eq!(obs.tags.as_deref(), Some("edit,question,answer"));
        assert_eq!(obs.ref_id, Some(bookmark_id));
        assert_eq!(obs.data["previousQuestion"], "What is it");
        assert_eq!(obs.data["newAnswer"], "A better thing.");
        assert_eq!(obs.data["bookmarkId"], bookmark_id.to_string());
    }

    #[tokio::test]
    async fn test_update_survives_audit_failure() {
        let (store, bookmark_id, chunk) = seeded();
        let store = store.with_failing_observations();
        let svc = service(&store, Arc::new(LengthEmbedder));

        svc.update_question(bookmark_id, edit_request(chunk)).await.unwrap();

        let stored = store.chunks_for(bookmark_id, strategy::QA_V2_PASSAGE);
        assert_eq!(stored[0].1, "What is it really?\nA better thing.");
        assert!(store.observations().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_bookmark() {
        let (store, _, chunk) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        let err = svc
            .update_question(Uuid::now_v7(), edit_request(chunk))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BookmarkNotFound(_)));
        assert!(store.observations().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_chunk_is_not_found() {
        let (store, bookmark_id, _) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        let err = svc
            .update_question(bookmark_id, edit_request(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.observations().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_embedding_fails() {
        let (store, bookmark_id, chunk) = seeded();
        let svc = service(&store, Arc::new(EmptyEmbedder));

        let err = svc
            .update_question(bookmark_id, edit_request(chunk))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        let stored = store.chunks_for(bookmark_id, strategy::QA_V2_PASSAGE);
        assert_eq!(stored[0].1, "What is it?\nA thing.");
    }

    #[tokio::test]
    async fn test_update_rejects_blank_question() {
        let (store, bookmark_id, chunk) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        let mut req = edit_request(chunk);
        req.new_question = "  ".to_string();
        let err = svc.update_question(bookmark_id, req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    #[tokio::test]
    async fn test_delete_removes_chunk_and_audits() {
        let (store, bookmark_id, chunk) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        svc.delete_question(
            bookmark_id,
            chunk,
            DeleteQuestionRequest {
                question: "What is it".to_string(),
                answer: "A thing.".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(store.chunks_for(bookmark_id, strategy::QA_V2_PASSAGE).is_empty());
        let observations = store.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].observation_type.as_deref(), Some("qa-delete"));
        assert_eq!(observations[0].source.as_deref(), Some("user-delete"));
        assert_eq!(observations[0].tags.as_deref(), Some("delete,question,answer"));
        assert_eq!(observations[0].data["question"], "What is it");
    }

    #[tokio::test]
    async fn test_delete_missing_chunk_is_not_found() {
        let (store, bookmark_id, _) = seeded();
        let svc = service(&store, Arc::new(LengthEmbedder));

        let err = svc
            .delete_question(bookmark_id, Uuid::now_v7(), DeleteQuestionRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.observations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_chunk_of_other_bookmark_is_not_found() {
        let (store, _, chunk) = seeded();
        let other = store.add_bookmark("https://example.com/other");
        let svc = service(&store, Arc::new(LengthEmbedder));

        let err = svc
            .delete_question(other.id, chunk, DeleteQuestionRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
