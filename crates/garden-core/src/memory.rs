//! In-memory repository implementations for service-level tests.
//!
//! [`InMemoryStore`] implements the bookmark, chunk index, observation,
//! configuration, and search repositories over one mutex-guarded state, so
//! services in other crates can be exercised without PostgreSQL.
//!
//! Enabled with the `testing` feature.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;
use crate::Vector;

#[derive(Debug, Clone)]
struct StoredChunk {
    id: Uuid,
    bookmark_id: Uuid,
    strategy: String,
    content: String,
    vector: Vector,
}

#[derive(Debug, Clone)]
struct StoredTitle {
    bookmark_id: Uuid,
    title: String,
    source: TitleSource,
}

#[derive(Default)]
struct State {
    bookmarks: Vec<Bookmark>,
    responses: Vec<HttpResponseRecord>,
    processed: Vec<(Uuid, String, String)>,
    titles: Vec<StoredTitle>,
    chunks: Vec<StoredChunk>,
    observations: Vec<Observation>,
    configuration: HashMap<String, ConfigurationEntry>,
}

impl State {
    fn title(&self, bookmark_id: Uuid) -> Option<String> {
        let mut best: Option<&StoredTitle> = None;
        for t in self.titles.iter().filter(|t| t.bookmark_id == bookmark_id) {
            // Earliest write wins within a source.
            if best.map_or(true, |b| t.source.rank() > b.source.rank()) {
                best = Some(t);
            }
        }
        best.map(|t| t.title.clone())
    }

    fn summary(&self, bookmark_id: Uuid) -> Option<String> {
        self.chunks
            .iter()
            .rev()
            .find(|c| c.bookmark_id == bookmark_id && c.strategy == strategy::SUMMARY_READER)
            .map(|c| c.content.clone())
    }

    fn processed(&self, bookmark_id: Uuid, strategy_name: &str) -> Option<String> {
        self.processed
            .iter()
            .rev()
            .find(|(id, s, _)| *id == bookmark_id && s == strategy_name)
            .map(|(_, _, c)| c.clone())
    }

    fn latest_response(&self, bookmark_id: Uuid) -> Option<HttpResponseRecord> {
        self.responses
            .iter()
            .rev()
            .find(|r| r.bookmark_id == bookmark_id)
            .cloned()
    }

    fn with_title(&self, bookmark: &Bookmark) -> BookmarkWithTitle {
        BookmarkWithTitle {
            id: bookmark.id,
            url: bookmark.url.clone(),
            creation_date: bookmark.creation_date,
            title: self.title(bookmark.id),
            summary: self.summary(bookmark.id),
        }
    }

    fn questions(&self, bookmark_id: Uuid) -> Vec<BookmarkQuestion> {
        self.chunks
            .iter()
            .filter(|c| c.bookmark_id == bookmark_id && c.strategy.starts_with("qa-"))
            .map(|c| BookmarkQuestion {
                id: c.id,
                content: c.content.clone(),
            })
            .collect()
    }
}

/// Cosine similarity, 0 when either side is a zero vector or dimensions differ.
pub fn cosine_similarity(a: &Vector, b: &Vector) -> f64 {
    let (a, b) = (a.as_slice(), b.as_slice());
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Shared in-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    dimension: Option<usize>,
    fail_observations: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject chunk vectors whose dimension differs from `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Make every observation insert fail.
    pub fn with_failing_observations(mut self) -> Self {
        self.fail_observations = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        match self.dimension {
            Some(expected) if vector.as_slice().len() != expected => {
                Err(Error::Embedding(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    expected,
                    vector.as_slice().len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Insert a bookmark with a fixed URL and return it.
    pub fn add_bookmark(&self, url: &str) -> Bookmark {
        let bookmark = Bookmark {
            id: Uuid::now_v7(),
            url: url.to_string(),
            creation_date: Utc::now(),
        };
        self.lock().bookmarks.push(bookmark.clone());
        bookmark
    }

    /// Insert a chunk directly, bypassing dimension checks.
    pub fn add_chunk(&self, bookmark_id: Uuid, strategy_name: &str, content: &str, vector: Vector) -> Uuid {
        let id = Uuid::now_v7();
        self.lock().chunks.push(StoredChunk {
            id,
            bookmark_id,
            strategy: strategy_name.to_string(),
            content: content.to_string(),
            vector,
        });
        id
    }

    /// `(id, content)` of every chunk stored under a strategy for a bookmark.
    pub fn chunks_for(&self, bookmark_id: Uuid, strategy_name: &str) -> Vec<(Uuid, String)> {
        self.lock()
            .chunks
            .iter()
            .filter(|c| c.bookmark_id == bookmark_id && c.strategy == strategy_name)
            .map(|c| (c.id, c.content.clone()))
            .collect()
    }

    /// Vector stored for a chunk.
    pub fn chunk_vector(&self, chunk_id: Uuid) -> Option<Vector> {
        self.lock()
            .chunks
            .iter()
            .find(|c| c.id == chunk_id)
            .map(|c| c.vector.clone())
    }

    /// Every stored observation, oldest first.
    pub fn observations(&self) -> Vec<Observation> {
        self.lock().observations.clone()
    }

    /// `(title, source)` rows recorded for a bookmark, in write order.
    pub fn titles_for(&self, bookmark_id: Uuid) -> Vec<(String, TitleSource)> {
        self.lock()
            .titles
            .iter()
            .filter(|t| t.bookmark_id == bookmark_id)
            .map(|t| (t.title.clone(), t.source.clone()))
            .collect()
    }

    /// Number of stored HTTP responses for a bookmark.
    pub fn response_count(&self, bookmark_id: Uuid) -> usize {
        self.lock()
            .responses
            .iter()
            .filter(|r| r.bookmark_id == bookmark_id)
            .count()
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryStore {
    async fn insert(&self, req: CreateBookmarkRequest) -> Result<Bookmark> {
        if req.url.trim().is_empty() {
            return Err(Error::InvalidInput("url is required".to_string()));
        }
        Ok(self.add_bookmark(req.url.trim()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bookmark>> {
        Ok(self.lock().bookmarks.iter().find(|b| b.id == id).cloned())
    }

    async fn get_with_title(&self, id: Uuid) -> Result<Option<BookmarkWithTitle>> {
        let state = self.lock();
        Ok(state
            .bookmarks
            .iter()
            .find(|b| b.id == id)
            .map(|b| state.with_title(b)))
    }

    async fn list(&self, req: ListBookmarksRequest) -> Result<(Vec<BookmarkWithTitle>, i64)> {
        let state = self.lock();
        let needle = req.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<BookmarkWithTitle> = state
            .bookmarks
            .iter()
            .map(|b| state.with_title(b))
            .filter(|b| match &needle {
                None => true,
                Some(n) => {
                    b.url.to_lowercase().contains(n)
                        || b.title.as_deref().is_some_and(|t| t.to_lowercase().contains(n))
                }
            })
            .collect();
        matching.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(req.offset.max(0) as usize)
            .take(req.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn random_id(&self) -> Result<Option<Uuid>> {
        Ok(self.lock().bookmarks.first().map(|b| b.id))
    }

    async fn get_details(&self, id: Uuid) -> Result<Option<BookmarkDetails>> {
        let state = self.lock();
        let Some(bookmark) = state.bookmarks.iter().find(|b| b.id == id) else {
            return Ok(None);
        };
        let response = state.latest_response(id);
        Ok(Some(BookmarkDetails {
            id,
            url: bookmark.url.clone(),
            creation_date: bookmark.creation_date,
            title: state.title(id),
            lynx: state.processed(id, strategy::LYNX),
            reader: state.processed(id, strategy::READER),
            summary: state.summary(id),
            status_code: response.as_ref().map(|r| r.status_code),
            headers: response.as_ref().map(|r| r.headers.clone()),
            content: response
                .as_ref()
                .map(|r| String::from_utf8_lossy(&r.content).into_owned()),
            fetch_date: response.as_ref().map(|r| r.fetch_date),
            questions: state.questions(id),
        }))
    }

    async fn list_missing_http_responses(&self, limit: i64) -> Result<Vec<Bookmark>> {
        let state = self.lock();
        Ok(state
            .bookmarks
            .iter()
            .filter(|b| !state.responses.iter().any(|r| r.bookmark_id == b.id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_missing_reader_content(&self, limit: i64) -> Result<Vec<Bookmark>> {
        let state = self.lock();
        Ok(state
            .bookmarks
            .iter()
            .filter(|b| state.processed(b.id, strategy::READER).is_none())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_http_response(
        &self,
        bookmark_id: Uuid,
        response: &FetchResponse,
    ) -> Result<HttpResponseRecord> {
        let record = HttpResponseRecord {
            id: Uuid::now_v7(),
            bookmark_id,
            status_code: response.status_code,
            headers: response.headers.clone(),
            content: response.content.clone(),
            fetch_date: Utc::now(),
        };
        self.lock().responses.push(record.clone());
        Ok(record)
    }

    async fn get_latest_http_response(
        &self,
        bookmark_id: Uuid,
    ) -> Result<Option<HttpResponseRecord>> {
        Ok(self.lock().latest_response(bookmark_id))
    }

    async fn insert_processed_content(
        &self,
        bookmark_id: Uuid,
        strategy_name: &str,
        content: &str,
    ) -> Result<Uuid> {
        self.lock().processed.push((
            bookmark_id,
            strategy_name.to_string(),
            content.to_string(),
        ));
        Ok(Uuid::now_v7())
    }

    async fn get_processed_content(
        &self,
        bookmark_id: Uuid,
        strategy_name: &str,
    ) -> Result<Option<String>> {
        Ok(self.lock().processed(bookmark_id, strategy_name))
    }

    async fn get_title_data(&self, bookmark_id: Uuid) -> Result<TitleData> {
        let state = self.lock();
        if !state.bookmarks.iter().any(|b| b.id == bookmark_id) {
            return Err(Error::BookmarkNotFound(bookmark_id));
        }
        Ok(TitleData {
            existing_title: state.title(bookmark_id),
            reader_content: state.processed(bookmark_id, strategy::READER),
            raw_content: state.latest_response(bookmark_id).map(|r| r.content),
        })
    }

    async fn insert_title(
        &self,
        bookmark_id: Uuid,
        title: &str,
        source: &TitleSource,
    ) -> Result<()> {
        let mut state = self.lock();
        let exists = state
            .titles
            .iter()
            .any(|t| t.bookmark_id == bookmark_id && t.source == *source);
        if !exists {
            state.titles.push(StoredTitle {
                bookmark_id,
                title: title.to_string(),
                source: source.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingChunkRepository for InMemoryStore {
    async fn insert_chunks(
        &self,
        bookmark_id: Uuid,
        strategy_name: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<Vec<Uuid>> {
        for chunk in chunks {
            self.check_dimension(&chunk.vector)?;
        }
        Ok(chunks
            .iter()
            .map(|c| self.add_chunk(bookmark_id, strategy_name, &c.text, c.vector.clone()))
            .collect())
    }

    async fn list_questions(&self, bookmark_id: Uuid) -> Result<Vec<BookmarkQuestion>> {
        Ok(self.lock().questions(bookmark_id))
    }

    async fn update_chunk(
        &self,
        bookmark_id: Uuid,
        chunk_id: Uuid,
        content: &str,
        vector: &Vector,
    ) -> Result<()> {
        self.check_dimension(vector)?;
        let mut state = self.lock();
        let chunk = state
            .chunks
            .iter_mut()
            .find(|c| c.id == chunk_id && c.bookmark_id == bookmark_id)
            .ok_or_else(|| Error::NotFound(format!("chunk {}", chunk_id)))?;
        chunk.content = content.to_string();
        chunk.vector = vector.clone();
        Ok(())
    }

    async fn delete_chunk(&self, bookmark_id: Uuid, chunk_id: Uuid) -> Result<bool> {
        let mut state = self.lock();
        let before = state.chunks.len();
        state
            .chunks
            .retain(|c| !(c.id == chunk_id && c.bookmark_id == bookmark_id));
        Ok(state.chunks.len() < before)
    }

    async fn similar_questions(&self, query: &Vector, limit: i64) -> Result<Vec<RetrievedItem>> {
        self.check_dimension(query)?;
        let state = self.lock();
        let mut scored: Vec<(&StoredChunk, f64)> = state
            .chunks
            .iter()
            .filter(|c| c.strategy.starts_with("qa-"))
            .map(|c| (c, cosine_similarity(&c.vector, query)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(limit.max(0) as usize)
            .enumerate()
            .map(|(i, (chunk, similarity))| {
                let (question, answer) = split_question_answer(&chunk.content);
                let url = state
                    .bookmarks
                    .iter()
                    .find(|b| b.id == chunk.bookmark_id)
                    .map(|b| b.url.clone())
                    .unwrap_or_default();
                let title = state.title(chunk.bookmark_id).unwrap_or_default();
                RetrievedItem {
                    id: i + 1,
                    question: question.to_string(),
                    answer: answer.to_string(),
                    bookmark_id: chunk.bookmark_id,
                    bookmark_title: title.clone(),
                    bookmark_url: url.clone(),
                    title,
                    url,
                    summary: state.summary(chunk.bookmark_id).unwrap_or_default(),
                    similarity,
                    strategy: chunk.strategy.clone(),
                }
            })
            .collect())
    }

    async fn similar_bookmarks(
        &self,
        query: &Vector,
        strategy_name: &str,
        limit: i64,
    ) -> Result<Vec<SimilarBookmark>> {
        self.check_dimension(query)?;
        let state = self.lock();
        let mut best: HashMap<Uuid, f64> = HashMap::new();
        for chunk in state.chunks.iter().filter(|c| c.strategy == strategy_name) {
            let similarity = cosine_similarity(&chunk.vector, query);
            let entry = best.entry(chunk.bookmark_id).or_insert(f64::MIN);
            *entry = entry.max(similarity);
        }
        let mut ranked: Vec<(Uuid, f64)> = best.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .filter_map(|(id, similarity)| {
                state
                    .bookmarks
                    .iter()
                    .find(|b| b.id == id)
                    .map(|b| SimilarBookmark {
                        bookmark: state.with_title(b),
                        similarity,
                    })
            })
            .collect())
    }
}

#[async_trait]
impl ObservationRepository for InMemoryStore {
    async fn insert(&self, observation: NewObservation) -> Result<Uuid> {
        if self.fail_observations {
            return Err(Error::Internal("observation store unavailable".to_string()));
        }
        let id = Uuid::now_v7();
        self.lock().observations.push(Observation {
            id,
            data: observation.data,
            observation_type: Some(observation.observation_type),
            source: Some(observation.source),
            tags: Some(observation.tags),
            parent: observation.parent,
            ref_id: observation.ref_id,
            creation_date: Utc::now(),
        });
        Ok(id)
    }

    async fn list_by_ref(&self, ref_id: Uuid) -> Result<Vec<Observation>> {
        let mut found: Vec<Observation> = self
            .lock()
            .observations
            .iter()
            .filter(|o| o.ref_id == Some(ref_id))
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn feedback_stats(&self, bookmark_id: Uuid) -> Result<FeedbackStats> {
        let state = self.lock();
        let count = |feedback: FeedbackType| {
            let tags = feedback.tags();
            state
                .observations
                .iter()
                .filter(|o| {
                    o.ref_id == Some(bookmark_id)
                        && o.observation_type.as_deref() == Some(observation::TYPE_QA_FEEDBACK)
                        && o.tags.as_deref() == Some(tags.as_str())
                })
                .count() as i64
        };
        Ok(FeedbackStats {
            upvotes: count(FeedbackType::Upvote),
            downvotes: count(FeedbackType::Downvote),
            trash: count(FeedbackType::Trash),
        })
    }
}

#[async_trait]
impl ConfigurationRepository for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<ConfigurationEntry>> {
        Ok(self.lock().configuration.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str, is_secret: bool) -> Result<ConfigurationEntry> {
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("key is required".to_string()));
        }
        let now = Utc::now();
        let mut state = self.lock();
        let entry = state
            .configuration
            .entry(key.to_string())
            .or_insert_with(|| ConfigurationEntry {
                key: key.to_string(),
                value: String::new(),
                is_secret,
                created_at: now,
                updated_at: now,
            });
        entry.value = value.to_string();
        entry.is_secret = is_secret;
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ConfigurationEntry>> {
        let mut entries: Vec<ConfigurationEntry> = self
            .lock()
            .configuration
            .values()
            .filter(|e| e.key.starts_with(prefix))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[async_trait]
impl SearchRepository for InMemoryStore {
    /// Bookmarks only; recency is `exp(-age_days / 30)`.
    async fn hybrid_search(
        &self,
        query: &str,
        query_vector: &Vector,
        weights: &SearchWeights,
        limit: i64,
    ) -> Result<Vec<UnifiedSearchResult>> {
        let state = self.lock();
        let needle = query.to_lowercase();
        let now = Utc::now();

        let mut results: Vec<UnifiedSearchResult> = state
            .bookmarks
            .iter()
            .filter_map(|b| {
                let title = state.title(b.id);
                let exact = match &title {
                    Some(t) if t.to_lowercase().contains(&needle) => 1.0,
                    _ => 0.0,
                };
                let similarity = state
                    .chunks
                    .iter()
                    .filter(|c| c.bookmark_id == b.id)
                    .map(|c| cosine_similarity(&c.vector, query_vector))
                    .fold(0.0, f64::max);
                if exact <= 0.0 && similarity <= 0.0 {
                    return None;
                }
                let age_days = (now - b.creation_date).num_seconds().max(0) as f64 / 86_400.0;
                let recency = (-age_days / crate::defaults::SEARCH_RECENCY_DECAY_DAYS).exp();
                Some(UnifiedSearchResult {
                    item_type: "bookmark".to_string(),
                    item_id: b.id,
                    item_title: title.unwrap_or_else(|| b.url.clone()),
                    last_activity: b.creation_date,
                    search_score: weights.exact_match * exact
                        + weights.similarity * similarity
                        + weights.recency * recency,
                })
            })
            .collect();
        results.sort_by(|a, b| b.search_score.total_cmp(&a.search_score));
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }
}
