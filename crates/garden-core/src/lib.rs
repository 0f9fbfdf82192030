//! # garden-core
//!
//! Core types, traits, and abstractions for the garden knowledge retrieval
//! service.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other garden crates depend on.
//!
//! ## Logging fields
//!
//! Spans and events across the workspace share one field vocabulary:
//! `subsystem` (`api`, `ingest`, `search`, `db`, `inference`), `component`,
//! `op`, entity ids (`bookmark_id`, `note_id`, `entity_id`), and measurements
//! (`duration_ms`, `result_count`, `chunk_count`, `status_code`). Operations
//! over their latency threshold log at WARN with `slow = true`.

pub mod defaults;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod models;
pub mod references;
pub mod template;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use pgvector::Vector;
pub use references::{
    parse_references, referenced_ids, render_for_display, resolve_for_storage, ReferenceMatch,
    ReferenceToken, ResolvedContent,
};
pub use template::{render_template, PromptTemplate};
pub use traits::*;
