//! # garden-api
//!
//! HTTP surface for garden: bookmark ingestion stages, Q&A edits, hybrid and
//! advanced search, feedback, notes, entities, and runtime configuration.
//!
//! The binary in `main.rs` wires Postgres and the inference backends into
//! [`AppState`]; tests build the same router over in-memory repositories.

pub mod error;
pub mod handlers;
pub mod logging;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use handlers::{ListResponse, PaginationMeta};
pub use router::build_router;
pub use state::{AppState, Backends, Repositories};
