//! # garden-search
//!
//! Retrieval for garden.
//!
//! This crate provides:
//! - Hybrid search across bookmarks, notes, and entities (exact title match,
//!   vector similarity, and recency)
//! - Similar Q&A fragment and similar bookmark lookups
//! - LLM-backed advanced search over retrieved fragments
//! - The feedback sink for retrieved fragments
//!
//! ## Example
//!
//! ```ignore
//! use garden_search::{HybridSearchEngine, SearchRequest};
//!
//! let engine = HybridSearchEngine::new(Arc::new(db.search.clone()), embedder);
//! let results = SearchRequest::new("rust lifetimes")
//!     .with_limit(20)
//!     .execute(&engine)
//!     .await?;
//! ```

pub mod feedback;
pub mod hybrid;
pub mod rag;
pub mod similar;

pub use garden_core::{Error, Result};

pub use feedback::FeedbackService;
pub use hybrid::{HybridSearchEngine, SearchRequest};
pub use rag::{prompt_bindings, query_text, AdvancedSearch, DEFAULT_PROMPT_TEMPLATE};
pub use similar::SimilaritySearch;
