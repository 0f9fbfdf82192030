//! # garden-ingest
//!
//! Bookmark ingestion for garden: outbound fetching, content extraction
//! (`reader` markdown and `lynx` text dumps), title resolution, the staged
//! ingestion pipeline, and audited Q&A edits.
//!
//! Stages are idempotent in effect: re-running one appends a new row and
//! readers always take the latest.

pub mod fetcher;
pub mod lynx;
pub mod pipeline;
pub mod questions;
pub mod reader;
pub mod title;

pub use garden_core::{Error, Result};

pub use fetcher::HttpFetcher;
pub use lynx::LynxExtractor;
pub use pipeline::{FetchOutcome, IngestionPipeline};
pub use questions::QuestionService;
pub use reader::{extract_markdown, ReaderExtractor};
pub use title::{html_title, reader_title};
