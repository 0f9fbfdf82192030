//! Hybrid search across bookmarks, notes, and entities.
//!
//! Each row scores
//! `exact·[query ⊆ title] + similarity·cosine + recency·decay(age)`; the
//! repository computes the score, this layer validates the request and
//! embeds the query.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use garden_core::defaults;
use garden_core::{Error, Result, SearchRepository, SearchWeights, UnifiedSearchResult};
use garden_inference::VectorEmbedder;

/// Searches above this duration are logged as slow.
const SLOW_SEARCH_MS: u64 = 2_000;

/// Hybrid search engine over a [`SearchRepository`].
#[derive(Clone)]
pub struct HybridSearchEngine {
    repository: Arc<dyn SearchRepository>,
    embedder: VectorEmbedder,
}

impl HybridSearchEngine {
    pub fn new(repository: Arc<dyn SearchRepository>, embedder: VectorEmbedder) -> Self {
        Self {
            repository,
            embedder,
        }
    }

    /// Run a hybrid search.
    ///
    /// A missing limit falls back to [`defaults::SEARCH_LIMIT`]; zero or
    /// negative limits are rejected.
    #[instrument(skip(self, weights), fields(
        subsystem = "search",
        component = "hybrid_search",
        op = "search",
        exact_weight = weights.exact_match,
        similarity_weight = weights.similarity,
        recency_weight = weights.recency,
    ))]
    pub async fn search(
        &self,
        query: &str,
        weights: &SearchWeights,
        limit: Option<i64>,
    ) -> Result<Vec<UnifiedSearchResult>> {
        let limit = resolve_limit(limit)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Search query is required".to_string()));
        }

        let start = Instant::now();
        let query_vector = self.embedder.embed(query).await?;
        let results = self
            .repository
            .hybrid_search(query, &query_vector, weights, limit)
            .await?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(result_count = results.len(), duration_ms = elapsed, "Hybrid search complete");
        if elapsed > SLOW_SEARCH_MS {
            warn!(duration_ms = elapsed, slow = true, "Slow hybrid search");
        }
        Ok(results)
    }
}

fn resolve_limit(limit: Option<i64>) -> Result<i64> {
    match limit {
        None => Ok(defaults::SEARCH_LIMIT),
        Some(l) if l <= 0 => Err(Error::InvalidInput(format!(
            "limit must be positive, got {}",
            l
        ))),
        Some(l) => Ok(l),
    }
}

/// Builder for hybrid search requests.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    weights: SearchWeights,
    limit: Option<i64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            weights: SearchWeights::default(),
            limit: None,
        }
    }

    pub fn with_weights(mut self, weights: SearchWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub async fn execute(&self, engine: &HybridSearchEngine) -> Result<Vec<UnifiedSearchResult>> {
        engine.search(&self.query, &self.weights, self.limit).await
    }
}
