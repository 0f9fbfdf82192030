//! Centralized default constants for the garden system.
//!
//! **This module is the single source of truth** for all shared default values.
//! Crates reference these constants instead of defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section.

// =============================================================================
// FETCHING
// =============================================================================

/// Overall deadline for one bookmark fetch (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 25;

/// Maximum number of automatic redirects followed by the fetcher.
pub const FETCH_MAX_REDIRECTS: usize = 10;

/// Desktop-browser user agent sent with every fetch.
pub const FETCH_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/136.0";

/// `Accept` header sent with every fetch.
pub const FETCH_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// `Accept-Language` header sent with every fetch.
pub const FETCH_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Status code recorded when a fetch fails before any response arrives.
pub const FETCH_FAILURE_STATUS: i32 = 500;

/// Headers recorded when a fetch fails before any response arrives.
pub const FETCH_FAILURE_HEADERS: &str = "{}";

// =============================================================================
// EXTRACTION
// =============================================================================

/// Base URL used by the reader when the bookmark URL is missing or invalid.
pub const READER_FALLBACK_URL: &str = "https://example.com";

/// User agent passed to the terminal renderer.
pub const LYNX_USER_AGENT: &str = "Mozilla/5.0";

/// Timeout for one terminal renderer invocation (seconds).
pub const LYNX_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per chunk for the chunked embedder.
pub const CHUNK_SIZE: usize = 8000;

/// Characters of reader content considered by the embed-chunks stage.
pub const EMBED_INPUT_MAX_CHARS: usize = 15_000;

/// Maximum number of chunks persisted by the embed-chunks stage.
pub const EMBED_MAX_CHUNKS: usize = 20;

/// Warning attached when the chunk cap applies.
pub const CONTENT_TOO_LARGE_WARNING: &str =
    "The content was too large, only the first ~10000 characters were processed";

// =============================================================================
// SUMMARIZATION
// =============================================================================

/// Word budget of a summary requested without an explicit one.
pub const SUMMARY_DEFAULT_WORDS: usize = 400;

/// First word budget tried by the summary-embedding stage.
pub const SUMMARY_START_WORDS: usize = 300;

/// The summary-embedding loop stops once the budget would reach this floor.
pub const SUMMARY_MIN_WORDS: usize = 200;

/// Word budget decrement between summary attempts.
pub const SUMMARY_WORD_STEP: usize = 10;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "qwen3:8b";

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Embedding calls slower than this are logged with `slow = true` (ms).
pub const SLOW_EMBED_MS: u64 = 5_000;

/// Generation calls slower than this are logged with `slow = true` (ms).
pub const SLOW_GEN_MS: u64 = 30_000;

// =============================================================================
// SEARCH
// =============================================================================

/// Hybrid search: weight of the case-insensitive title substring match.
pub const SEARCH_EXACT_MATCH_WEIGHT: f64 = 5.0;

/// Hybrid search: weight of the similarity term.
pub const SEARCH_SIMILARITY_WEIGHT: f64 = 2.0;

/// Hybrid search: weight of the recency term.
pub const SEARCH_RECENCY_WEIGHT: f64 = 1.0;

/// Hybrid search: default result count.
pub const SEARCH_LIMIT: i64 = 50;

/// Recency decay time constant in days (score halves roughly every 21 days).
pub const SEARCH_RECENCY_DECAY_DAYS: f64 = 30.0;

/// Number of Q&A fragments retrieved for advanced search.
pub const SIMILAR_QA_LIMIT: i64 = 10;

/// Number of bookmarks returned by similar-bookmark search.
pub const SIMILAR_BOOKMARKS_LIMIT: i64 = 10;

/// Configuration key holding an override of the advanced-search prompt.
pub const SEARCH_PROMPT_TEMPLATE_KEY: &str = "search.prompt.template";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 20;

/// Largest page size accepted by list endpoints.
pub const PAGE_LIMIT_MAX: i64 = 200;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP port.
pub const SERVER_PORT: u16 = 3000;

/// Grace period for in-flight requests on shutdown (seconds).
pub const SHUTDOWN_DRAIN_SECS: u64 = 30;

/// Value shown in place of secret configuration entries.
pub const SECRET_MASK: &str = "********";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_loop_bounds_are_consistent() {
        const {
            assert!(SUMMARY_DEFAULT_WORDS >= SUMMARY_START_WORDS);
            assert!(SUMMARY_START_WORDS > SUMMARY_MIN_WORDS);
            assert!(SUMMARY_WORD_STEP > 0);
        }
    }

    #[test]
    fn embed_truncation_is_smaller_than_chunk_cap() {
        const {
            assert!(EMBED_INPUT_MAX_CHARS < CHUNK_SIZE * EMBED_MAX_CHUNKS);
        }
    }

    #[test]
    fn default_weights_are_ordered() {
        let weights = [
            SEARCH_EXACT_MATCH_WEIGHT,
            SEARCH_SIMILARITY_WEIGHT,
            SEARCH_RECENCY_WEIGHT,
        ];
        assert!(weights.windows(2).all(|w| w[0] > w[1]));
    }
}
