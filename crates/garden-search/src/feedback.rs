//! Feedback sink for retrieved Q&A fragments.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use garden_core::{
    observation, EmbeddingChunkRepository, FeedbackData, FeedbackStats, NewObservation,
    Observation, ObservationRepository, Result, StoreFeedbackRequest,
};

/// Records user reactions as `qa-feedback` observations.
#[derive(Clone)]
pub struct FeedbackService {
    observations: Arc<dyn ObservationRepository>,
    chunks: Arc<dyn EmbeddingChunkRepository>,
}

impl FeedbackService {
    pub fn new(
        observations: Arc<dyn ObservationRepository>,
        chunks: Arc<dyn EmbeddingChunkRepository>,
    ) -> Self {
        Self {
            observations,
            chunks,
        }
    }

    /// Store feedback and return the observation id.
    ///
    /// With `delete_ref` and a `reference_id`, the referenced chunk is also
    /// removed; a failed removal is logged and does not fail the call.
    #[instrument(skip(self, req), fields(subsystem = "search", component = "feedback", op = "store_feedback", bookmark_id = %req.bookmark_id, feedback_type = %req.feedback_type))]
    pub async fn store_feedback(&self, req: StoreFeedbackRequest) -> Result<Uuid> {
        let data = FeedbackData {
            question: req.question,
            answer: req.answer,
            bookmark_id: req.bookmark_id,
            user_question: req.user_question,
            similarity: req.similarity,
            feedback_type: req.feedback_type,
            timestamp: Utc::now(),
        };

        let id = self
            .observations
            .insert(NewObservation {
                data: serde_json::to_value(&data)?,
                observation_type: observation::TYPE_QA_FEEDBACK.to_string(),
                source: observation::SOURCE_USER_FEEDBACK.to_string(),
                tags: req.feedback_type.tags(),
                parent: None,
                ref_id: Some(req.bookmark_id),
            })
            .await?;
        info!(observation_id = %id, "Feedback stored");

        if req.delete_ref {
            if let Some(reference_id) = req.reference_id {
                match self.chunks.delete_chunk(req.bookmark_id, reference_id).await {
                    Ok(true) => info!(chunk_id = %reference_id, "Deleted referenced chunk"),
                    Ok(false) => warn!(chunk_id = %reference_id, "Referenced chunk not found"),
                    Err(e) => {
                        warn!(chunk_id = %reference_id, error = %e, "Failed to delete referenced chunk")
                    }
                }
            }
        }

        Ok(id)
    }

    pub async fn stats(&self, bookmark_id: Uuid) -> Result<FeedbackStats> {
        self.observations.feedback_stats(bookmark_id).await
    }

    /// Every observation that refers to `ref_id`, newest first.
    pub async fn observations_for(&self, ref_id: Uuid) -> Result<Vec<Observation>> {
        self.observations.list_by_ref(ref_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_core::memory::InMemoryStore;
    use garden_core::{strategy, FeedbackType, Vector};

    fn request(bookmark_id: Uuid, feedback_type: FeedbackType) -> StoreFeedbackRequest {
        StoreFeedbackRequest {
            question: "What is X?".to_string(),
            answer: "X is Y.".to_string(),
            bookmark_id,
            reference_id: None,
            user_question: "tell me about X".to_string(),
            similarity: 0.82,
            feedback_type,
            delete_ref: false,
        }
    }

    fn service(store: &InMemoryStore) -> FeedbackService {
        FeedbackService::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_trash_with_delete_ref_removes_chunk() {
        let store = InMemoryStore::new();
        let bookmark = store.add_bookmark("https://example.com/x");
        let chunk = store.add_chunk(
            bookmark.id,
            strategy::QA_V2_PASSAGE,
            "What is X?\nX is Y.",
            Vector::from(vec![1.0, 0.0]),
        );

        let mut req = request(bookmark.id, FeedbackType::Trash);
        req.reference_id = Some(chunk);
        req.delete_ref = true;
        service(&store).store_feedback(req).await.unwrap();

        let observations = store.observations();
        assert_eq!(observations.len(), 1);
        let obs = &observations[0];
        assert_eq!(obs.observation_type.as_deref(), Some("qa-feedback"));
        assert_eq!(obs.source.as_deref(), Some("user-feedback"));
        assert_eq!(obs.tags.as_deref(), Some("feedback,trash"));
        assert_eq!(obs.ref_id, Some(bookmark.id));
        assert_eq!(obs.data["feedbackType"], "trash");
        assert_eq!(obs.data["userQuestion"], "tell me about X");
        assert!(store.chunks_for(bookmark.id, strategy::QA_V2_PASSAGE).is_empty());
    }

    #[tokio::test]
    async fn test_delete_ref_without_reference_keeps_chunks() {
        let store = InMemoryStore::new();
        let bookmark = store.add_bookmark("https://example.com/x");
        store.add_chunk(bookmark.id, strategy::QA_V2_PASSAGE, "q?\na", Vector::from(vec![1.0]));

        let mut req = request(bookmark.id, FeedbackType::Downvote);
        req.delete_ref = true;
        service(&store).store_feedback(req).await.unwrap();

        assert_eq!(store.chunks_for(bookmark.id, strategy::QA_V2_PASSAGE).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_reference_does_not_fail() {
        let store = InMemoryStore::new();
        let bookmark = store.add_bookmark("https://example.com/x");

        let mut req = request(bookmark.id, FeedbackType::Trash);
        req.reference_id = Some(Uuid::now_v7());
        req.delete_ref = true;
        assert!(service(&store).store_feedback(req).await.is_ok());
    }

    #[tokio::test]
    async fn test_observation_failure_is_an_error() {
        let store = InMemoryStore::new().with_failing_observations();
        let bookmark = store.add_bookmark("https://example.com/x");
        let result = service(&store)
            .store_feedback(request(bookmark.id, FeedbackType::Upvote))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stats_count_by_type() {
        let store = InMemoryStore::new();
        let bookmark = store.add_bookmark("https://example.com/x");
        let svc = service(&store);
        for feedback_type in [
            FeedbackType::Upvote,
            FeedbackType::Upvote,
            FeedbackType::Downvote,
            FeedbackType::Trash,
        ] {
            svc.store_feedback(request(bookmark.id, feedback_type)).await.unwrap();
        }

        let stats = svc.stats(bookmark.id).await.unwrap();
        assert_eq!(
            stats,
            FeedbackStats {
                upvotes: 2,
                downvotes: 1,
                trash: 1
            }
        );
        assert_eq!(svc.observations_for(bookmark.id).await.unwrap().len(), 4);
    }
}
