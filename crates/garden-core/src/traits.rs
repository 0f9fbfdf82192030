//! Core traits for garden abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// BOOKMARK REPOSITORY TRAITS
// =============================================================================

/// Repository for bookmarks and the artifacts derived from them.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Insert a new bookmark.
    async fn insert(&self, req: CreateBookmarkRequest) -> Result<Bookmark>;

    /// Fetch a bookmark by id.
    async fn get(&self, id: Uuid) -> Result<Option<Bookmark>>;

    /// Fetch a bookmark with its canonical title and summary.
    async fn get_with_title(&self, id: Uuid) -> Result<Option<BookmarkWithTitle>>;

    /// List bookmarks newest first, returning the page and the total count.
    async fn list(&self, req: ListBookmarksRequest) -> Result<(Vec<BookmarkWithTitle>, i64)>;

    /// Id of a uniformly chosen bookmark.
    async fn random_id(&self) -> Result<Option<Uuid>>;

    /// Everything derived for one bookmark.
    async fn get_details(&self, id: Uuid) -> Result<Option<BookmarkDetails>>;

    /// Bookmarks that have never been fetched.
    async fn list_missing_http_responses(&self, limit: i64) -> Result<Vec<Bookmark>>;

    /// Bookmarks without `reader` processed content.
    async fn list_missing_reader_content(&self, limit: i64) -> Result<Vec<Bookmark>>;

    /// Append a fetched response.
    async fn insert_http_response(
        &self,
        bookmark_id: Uuid,
        response: &FetchResponse,
    ) -> Result<HttpResponseRecord>;

    /// Newest response by fetch date.
    async fn get_latest_http_response(&self, bookmark_id: Uuid)
        -> Result<Option<HttpResponseRecord>>;

    /// Append processed content under a strategy name.
    async fn insert_processed_content(
        &self,
        bookmark_id: Uuid,
        strategy: &str,
        content: &str,
    ) -> Result<Uuid>;

    /// Latest processed content for a strategy.
    async fn get_processed_content(&self, bookmark_id: Uuid, strategy: &str)
        -> Result<Option<String>>;

    /// Existing title, reader content, and raw HTML in one read.
    async fn get_title_data(&self, bookmark_id: Uuid) -> Result<TitleData>;

    /// Record a title. The first write for a bookmark wins.
    async fn insert_title(&self, bookmark_id: Uuid, title: &str, source: &TitleSource)
        -> Result<()>;
}

// =============================================================================
// EMBEDDING INDEX TRAITS
// =============================================================================

/// The vector index of `(bookmark, strategy, text, vector)` rows.
#[async_trait]
pub trait EmbeddingChunkRepository: Send + Sync {
    /// Persist chunks for a bookmark under a strategy. Rejects vectors whose
    /// dimension does not match the index.
    async fn insert_chunks(
        &self,
        bookmark_id: Uuid,
        strategy: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<Vec<Uuid>>;

    /// Q&A pairs of a bookmark.
    async fn list_questions(&self, bookmark_id: Uuid) -> Result<Vec<BookmarkQuestion>>;

    /// Replace content and vector of one chunk in a single statement.
    async fn update_chunk(
        &self,
        bookmark_id: Uuid,
        chunk_id: Uuid,
        content: &str,
        vector: &Vector,
    ) -> Result<()>;

    /// Delete one chunk of a bookmark. Returns false when nothing matched.
    async fn delete_chunk(&self, bookmark_id: Uuid, chunk_id: Uuid) -> Result<bool>;

    /// Nearest Q&A fragments to the query vector.
    async fn similar_questions(&self, query: &Vector, limit: i64) -> Result<Vec<RetrievedItem>>;

    /// Nearest bookmarks to the query vector among chunks of one strategy.
    async fn similar_bookmarks(
        &self,
        query: &Vector,
        strategy: &str,
        limit: i64,
    ) -> Result<Vec<SimilarBookmark>>;
}

// =============================================================================
// OBSERVATION REPOSITORY TRAITS
// =============================================================================

/// Append-only observation log.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Append an observation.
    async fn insert(&self, observation: NewObservation) -> Result<Uuid>;

    /// Observations referring to the given id, newest first.
    async fn list_by_ref(&self, ref_id: Uuid) -> Result<Vec<Observation>>;

    /// Feedback counts for a bookmark.
    async fn feedback_stats(&self, bookmark_id: Uuid) -> Result<FeedbackStats>;
}

// =============================================================================
// ENTITY REPOSITORY TRAITS
// =============================================================================

/// Repository for entities and the references pointing at them.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn create(&self, req: CreateEntityRequest) -> Result<Entity>;

    /// Fetch a non-deleted entity by id.
    async fn get(&self, id: Uuid) -> Result<Option<Entity>>;

    /// Fetch a non-deleted entity by exact name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Entity>>;

    /// Non-deleted entities with the given ids.
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Entity>>;

    /// Non-deleted entities, newest first, with the total count.
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Entity>, i64)>;

    /// Soft delete. Returns false when the entity does not exist.
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;

    /// References pointing at an entity.
    async fn list_references(&self, entity_id: Uuid) -> Result<Vec<EntityReference>>;
}

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Repository for notes. Writes resolve `[[...]]` references transactionally.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn create(&self, req: CreateNoteRequest) -> Result<NoteFull>;

    async fn get(&self, id: Uuid) -> Result<Option<NoteFull>>;

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<NoteListItem>, i64)>;

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<NoteFull>;

    /// Delete a note with its references and tag bindings.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// References recorded for a note.
    async fn list_references(&self, note_id: Uuid) -> Result<Vec<EntityReference>>;
}

// =============================================================================
// REFERENCE RESOLUTION
// =============================================================================

/// Entity lookups used while rewriting `[[...]]` tokens.
///
/// Implementations are request-scoped: the database implementation borrows
/// the transaction that also writes the rewritten body.
#[async_trait]
pub trait EntityLookup: Send {
    /// True when a non-deleted entity with this id exists.
    async fn entity_exists(&mut self, id: Uuid) -> Result<bool>;

    /// Id of the non-deleted entity with this exact name.
    async fn find_entity_by_name(&mut self, name: &str) -> Result<Option<Uuid>>;

    /// Create an entity and return its id.
    async fn create_entity(&mut self, name: &str, entity_type: &str) -> Result<Uuid>;
}

// =============================================================================
// CONFIGURATION REPOSITORY TRAITS
// =============================================================================

/// Runtime key/value configuration.
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ConfigurationEntry>>;

    /// Upsert a value.
    async fn set_value(&self, key: &str, value: &str, is_secret: bool)
        -> Result<ConfigurationEntry>;

    /// Entries whose key starts with `prefix`, ordered by key.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ConfigurationEntry>>;

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key).await?.map(|e| e.value))
    }

    /// `"true"`/`"1"` are true, `"false"`/`"0"` are false.
    async fn get_bool_value(&self, key: &str) -> Result<Option<bool>> {
        match self.get_value(key).await? {
            None => Ok(None),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                other => Err(Error::Config(format!(
                    "{} is not a boolean: {}",
                    key, other
                ))),
            },
        }
    }

    async fn get_number_value(&self, key: &str) -> Result<Option<f64>> {
        match self.get_value(key).await? {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| Error::Config(format!("{} is not a number: {}", key, e))),
        }
    }

    async fn get_json_value(&self, key: &str) -> Result<Option<JsonValue>> {
        match self.get_value(key).await? {
            None => Ok(None),
            Some(v) => serde_json::from_str(&v)
                .map(Some)
                .map_err(|e| Error::Config(format!("{} is not valid JSON: {}", key, e))),
        }
    }
}

// =============================================================================
// SEARCH TRAITS
// =============================================================================

/// Hybrid scoring across artifact kinds.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Score bookmarks, notes, and entities against the query and return the
    /// top `limit` rows by descending score.
    async fn hybrid_search(
        &self,
        query: &str,
        query_vector: &Vector,
        weights: &SearchWeights,
        limit: i64,
    ) -> Result<Vec<UnifiedSearchResult>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend mapping a text to ordered `{chunk, vector}` pairs.
#[async_trait]
pub trait ChunkedEmbeddingBackend: Send + Sync {
    /// Embed `text`, splitting it into chunks first. Order follows the text.
    async fn embed_chunks(&self, text: &str) -> Result<Vec<EmbeddedChunk>>;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// CONTENT ACQUISITION TRAITS
// =============================================================================

/// Retrieves a URL into a raw response.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse>;
}

/// Turns a fetched page into plain text.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Strategy name the output is stored under.
    fn strategy(&self) -> ExtractionStrategy;

    /// Extract text from the raw body fetched from `url`.
    async fn extract(&self, body: &[u8], url: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapConfig(Mutex<HashMap<String, String>>);

    impl MapConfig {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self(Mutex::new(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ))
        }
    }

    #[async_trait]
    impl ConfigurationRepository for MapConfig {
        async fn get(&self, key: &str) -> Result<Option<ConfigurationEntry>> {
            let now = chrono::Utc::now();
            Ok(self.0.lock().unwrap().get(key).map(|v| ConfigurationEntry {
                key: key.to_string(),
                value: v.clone(),
                is_secret: false,
                created_at: now,
                updated_at: now,
            }))
        }

        async fn set_value(
            &self,
            key: &str,
            value: &str,
            _is_secret: bool,
        ) -> Result<ConfigurationEntry> {
            self.0
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(self.get(key).await?.unwrap())
        }

        async fn list_by_prefix(&self, _prefix: &str) -> Result<Vec<ConfigurationEntry>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_get_bool_value_parses_common_forms() {
        let config = MapConfig::with(&[("a", "true"), ("b", "0"), ("c", "maybe")]);
        assert_eq!(config.get_bool_value("a").await.unwrap(), Some(true));
        assert_eq!(config.get_bool_value("b").await.unwrap(), Some(false));
        assert_eq!(config.get_bool_value("missing").await.unwrap(), None);
        assert!(matches!(
            config.get_bool_value("c").await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_get_number_value() {
        let config = MapConfig::with(&[("n", " 2.5 "), ("bad", "two")]);
        assert_eq!(config.get_number_value("n").await.unwrap(), Some(2.5));
        assert!(config.get_number_value("bad").await.is_err());
    }

    #[tokio::test]
    async fn test_get_json_value() {
        let config = MapConfig::with(&[("j", r#"{"k":[1,2]}"#)]);
        let value = config.get_json_value("j").await.unwrap().unwrap();
        assert_eq!(value["k"][1], 2);
    }

    #[tokio::test]
    async fn test_set_then_get_value() {
        let config = MapConfig::with(&[]);
        config.set_value("x", "y", false).await.unwrap();
        assert_eq!(config.get_value("x").await.unwrap().as_deref(), Some("y"));
    }
}
