//! Per-bookmark ingestion pipeline.
//!
//! Five independent, re-runnable stages keyed by bookmark id:
//! fetch, process (`lynx` | `reader`), embed chunks, embed summary, and
//! resolve title. Each stage reads what earlier stages committed and writes
//! its own rows; nothing spans stages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use garden_core::defaults;
use garden_core::{
    strategy, Bookmark, BookmarkRepository, CatchUpOutcome, ChunkedEmbeddingBackend,
    ContentExtractor, EmbeddedChunk, EmbeddingChunkRepository, EmbeddingResult, Error,
    ExtractionStrategy, FetchResponse, FetchResult, PageFetcher, ProcessingResult, Result,
    SummaryEmbeddingResult, TitleResolution, TitleSource,
};
use garden_inference::Summarizer;

use crate::lynx::LynxExtractor;
use crate::reader::ReaderExtractor;
use crate::title::{html_title, reader_title};

pub const FETCH_SUCCESS_MESSAGE: &str = "Fetch finished";
pub const FETCH_FAILURE_MESSAGE: &str = "Fetch failed";
pub const PROCESS_SUCCESS_MESSAGE: &str = "Bookmark processed successfully";
pub const NOT_HTML_MESSAGE: &str = "Content is not HTML and cannot be processed";

/// Outcome of the fetch stage.
///
/// A failed fetch still persists a diagnostic response, which is returned
/// alongside the error.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(FetchResult),
    Failed { error: Error, response: FetchResult },
}

fn fetch_result(response: &FetchResponse, message: &str) -> FetchResult {
    FetchResult {
        status_code: response.status_code,
        headers: response.headers.clone(),
        content: String::from_utf8_lossy(&response.content).into_owned(),
        message: message.to_string(),
    }
}

/// First `max_chars` characters of `text`.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Ingestion stages over the bookmark store and the chunk index.
#[derive(Clone)]
pub struct IngestionPipeline {
    bookmarks: Arc<dyn BookmarkRepository>,
    chunks: Arc<dyn EmbeddingChunkRepository>,
    fetcher: Arc<dyn PageFetcher>,
    embedder: Arc<dyn ChunkedEmbeddingBackend>,
    summarizer: Summarizer,
    extractors: HashMap<ExtractionStrategy, Arc<dyn ContentExtractor>>,
    fetch_timeout: Duration,
}

impl IngestionPipeline {
    /// Pipeline with the default `reader` and `lynx` extractors.
    pub fn new(
        bookmarks: Arc<dyn BookmarkRepository>,
        chunks: Arc<dyn EmbeddingChunkRepository>,
        fetcher: Arc<dyn PageFetcher>,
        embedder: Arc<dyn ChunkedEmbeddingBackend>,
        summarizer: Summarizer,
    ) -> Self {
        let pipeline = Self {
            bookmarks,
            chunks,
            fetcher,
            embedder,
            summarizer,
            extractors: HashMap::new(),
            fetch_timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECS),
        };
        pipeline
            .with_extractor(Arc::new(ReaderExtractor::new()))
            .with_extractor(Arc::new(LynxExtractor::new()))
    }

    /// Register (or replace) the extractor for its strategy.
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractors.insert(extractor.strategy(), extractor);
        self
    }

    async fn bookmark(&self, bookmark_id: Uuid) -> Result<Bookmark> {
        self.bookmarks
            .get(bookmark_id)
            .await?
            .ok_or(Error::BookmarkNotFound(bookmark_id))
    }

    async fn reader_content(&self, bookmark_id: Uuid) -> Result<String> {
        self.bookmarks
            .get_processed_content(bookmark_id, strategy::READER)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("reader content for bookmark {}", bookmark_id))
            })
    }

    // =========================================================================
    // STAGE 1: FETCH
    // =========================================================================

    /// Fetch the bookmark URL and persist the response.
    ///
    /// On failure a `500` response with the error message as body is
    /// persisted and returned in [`FetchOutcome::Failed`].
    #[instrument(skip(self), fields(subsystem = "ingest", component = "pipeline", op = "fetch"))]
    pub async fn fetch(&self, bookmark_id: Uuid) -> Result<FetchOutcome> {
        let bookmark = self.bookmark(bookmark_id).await?;
        let start = Instant::now();

        match self.fetcher.fetch(&bookmark.url, self.fetch_timeout).await {
            Ok(response) => {
                self.bookmarks
                    .insert_http_response(bookmark_id, &response)
                    .await?;
                info!(
                    status_code = response.status_code,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Bookmark fetched"
                );
                Ok(FetchOutcome::Fetched(fetch_result(
                    &response,
                    FETCH_SUCCESS_MESSAGE,
                )))
            }
            Err(error) => {
                warn!(url = %bookmark.url, error = %error, "Fetch failed, recording diagnostic response");
                let response = FetchResponse {
                    status_code: defaults::FETCH_FAILURE_STATUS,
                    headers: defaults::FETCH_FAILURE_HEADERS.to_string(),
                    content: error.to_string().into_bytes(),
                };
                self.bookmarks
                    .insert_http_response(bookmark_id, &response)
                    .await?;
                Ok(FetchOutcome::Failed {
                    error,
                    response: fetch_result(&response, FETCH_FAILURE_MESSAGE),
                })
            }
        }
    }

    // =========================================================================
    // STAGE 2: PROCESS
    // =========================================================================

    /// Extract the latest response with `extraction` and persist the result
    /// under the strategy name. Non-textual content is a no-op.
    #[instrument(skip(self), fields(subsystem = "ingest", component = "pipeline", op = "process"))]
    pub async fn process(
        &self,
        bookmark_id: Uuid,
        extraction: ExtractionStrategy,
    ) -> Result<ProcessingResult> {
        let bookmark = self.bookmark(bookmark_id).await?;
        let response = self
            .bookmarks
            .get_latest_http_response(bookmark_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("HTTP response for bookmark {}", bookmark_id))
            })?;

        if !response.is_textual()? {
            debug!(content_type = ?response.content_type().ok().flatten(), "Skipping non-HTML content");
            return Ok(ProcessingResult {
                message: NOT_HTML_MESSAGE.to_string(),
                content: None,
            });
        }

        let extractor = self.extractors.get(&extraction).ok_or_else(|| {
            Error::Config(format!("no extractor registered for {}", extraction))
        })?;
        let content = extractor.extract(&response.content, &bookmark.url).await?;

        self.bookmarks
            .insert_processed_content(bookmark_id, extraction.name(), &content)
            .await?;
        info!(strategy = %extraction, content_len = content.len(), "Bookmark processed");

        Ok(ProcessingResult {
            message: PROCESS_SUCCESS_MESSAGE.to_string(),
            content: Some(content),
        })
    }

    // =========================================================================
    // STAGE 3: EMBED CHUNKS
    // =========================================================================

    /// Embed the reader content as `chunked-reader` chunks.
    ///
    /// Input is truncated to [`defaults::EMBED_INPUT_MAX_CHARS`] characters
    /// and at most [`defaults::EMBED_MAX_CHUNKS`] chunks are stored.
    #[instrument(skip(self), fields(subsystem = "ingest", component = "pipeline", op = "embed_chunks"))]
    pub async fn embed_chunks(&self, bookmark_id: Uuid) -> Result<EmbeddingResult> {
        self.bookmark(bookmark_id).await?;
        let content = self.reader_content(bookmark_id).await?;
        let input = truncate_chars(&content, defaults::EMBED_INPUT_MAX_CHARS);

        let mut chunks = self.embedder.embed_chunks(input).await?;
        let mut warning = None;
        if chunks.len() >= defaults::EMBED_MAX_CHUNKS {
            warn!(
                chunk_count = chunks.len(),
                max_chunks = defaults::EMBED_MAX_CHUNKS,
                "Content too large, capping chunk count"
            );
            chunks.truncate(defaults::EMBED_MAX_CHUNKS);
            warning = Some(defaults::CONTENT_TOO_LARGE_WARNING.to_string());
        }

        let ids = self
            .chunks
            .insert_chunks(bookmark_id, strategy::CHUNKED_READER, &chunks)
            .await?;
        info!(chunk_count = ids.len(), "Stored reader chunks");
        Ok(EmbeddingResult { ids, warning })
    }

    // =========================================================================
    // STAGE 4: EMBED SUMMARY
    // =========================================================================

    /// Summarize the reader content until the summary fits one chunk, then
    /// store it as a single `summary-reader` chunk.
    ///
    /// The word budget starts at [`defaults::SUMMARY_START_WORDS`] and drops
    /// by [`defaults::SUMMARY_WORD_STEP`]; the loop gives up once the next
    /// budget would reach [`defaults::SUMMARY_MIN_WORDS`] and stores the last
    /// summary with a warning. Dropping the returned future aborts the loop
    /// between calls.
    #[instrument(skip(self), fields(subsystem = "ingest", component = "pipeline", op = "embed_summary"))]
    pub async fn embed_summary(&self, bookmark_id: Uuid) -> Result<SummaryEmbeddingResult> {
        let bookmark = self.bookmark(bookmark_id).await?;
        let content = self.reader_content(bookmark_id).await?;

        let mut words = defaults::SUMMARY_START_WORDS;
        let (summary, chunks) = loop {
            let summary = self
                .summarizer
                .summarize(&content, &bookmark.url, words)
                .await?;
            let chunks = self.embedder.embed_chunks(&summary).await?;
            debug!(word_count = words, chunk_count = chunks.len(), "Summary attempt");

            if chunks.len() == 1
                || words - defaults::SUMMARY_WORD_STEP <= defaults::SUMMARY_MIN_WORDS
            {
                break (summary, chunks);
            }
            words -= defaults::SUMMARY_WORD_STEP;
        };

        let single = chunks.len() == 1;
        let first = chunks
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned for summary".to_string()))?;
        let warning = if !single {
            warn!(word_count = words, "Summary still spans several chunks");
            Some(format!(
                "The summary could not be reduced to a single chunk (last attempt: {} words)",
                words
            ))
        } else {
            None
        };

        let ids = self
            .chunks
            .insert_chunks(
                bookmark_id,
                strategy::SUMMARY_READER,
                &[EmbeddedChunk {
                    text: summary.clone(),
                    vector: first.vector,
                }],
            )
            .await?;
        info!(word_count = words, "Stored summary embedding");
        Ok(SummaryEmbeddingResult {
            ids,
            summary,
            warning,
        })
    }

    // =========================================================================
    // STAGE 5: RESOLVE TITLE
    // =========================================================================

    /// Existing title, else the reader title (recorded as `reader-title`),
    /// else the HTML `<title>` (recorded as `html-title`), else none.
    #[instrument(skip(self), fields(subsystem = "ingest", component = "pipeline", op = "resolve_title"))]
    pub async fn resolve_title(&self, bookmark_id: Uuid) -> Result<TitleResolution> {
        let bookmark = self.bookmark(bookmark_id).await?;
        let data = self.bookmarks.get_title_data(bookmark_id).await?;

        if let Some(title) = data.existing_title {
            return Ok(TitleResolution {
                bookmark,
                title: Some(title),
                source: None,
            });
        }

        let candidate = data
            .reader_content
            .as_deref()
            .and_then(reader_title)
            .map(|t| (t, TitleSource::Reader))
            .or_else(|| {
                data.raw_content
                    .as_deref()
                    .and_then(html_title)
                    .map(|t| (t, TitleSource::Html))
            });

        match candidate {
            Some((title, source)) => {
                self.bookmarks
                    .insert_title(bookmark_id, &title, &source)
                    .await?;
                debug!(source = source.as_str(), "Recorded bookmark title");
                Ok(TitleResolution {
                    bookmark,
                    title: Some(title),
                    source: Some(source),
                })
            }
            None => Ok(TitleResolution {
                bookmark,
                title: None,
                source: None,
            }),
        }
    }

    // =========================================================================
    // BATCH CATCH-UP
    // =========================================================================

    /// Fetch bookmarks that were never fetched, then run reader processing
    /// and chunk embedding for bookmarks without reader content.
    ///
    /// Runs sequentially; a failing bookmark is reported and skipped.
    #[instrument(skip(self), fields(subsystem = "ingest", component = "pipeline", op = "catch_up"))]
    pub async fn catch_up(&self, limit: i64) -> Result<Vec<CatchUpOutcome>> {
        let mut outcomes = Vec::new();

        for bookmark in self.bookmarks.list_missing_http_responses(limit).await? {
            let outcome = match self.fetch(bookmark.id).await {
                Ok(FetchOutcome::Fetched(_)) => Ok(()),
                Ok(FetchOutcome::Failed { error, .. }) => Err(error),
                Err(e) => Err(e),
            };
            outcomes.push(catch_up_outcome(bookmark.id, "fetch", outcome));
        }

        for bookmark in self.bookmarks.list_missing_reader_content(limit).await? {
            match self.process(bookmark.id, ExtractionStrategy::Reader).await {
                Ok(result) if result.content.is_some() => {
                    outcomes.push(catch_up_outcome(bookmark.id, "process", Ok(())));
                    let embedded = self.embed_chunks(bookmark.id).await.map(|_| ());
                    outcomes.push(catch_up_outcome(bookmark.id, "embed_chunks", embedded));
                }
                Ok(result) => outcomes.push(catch_up_outcome(
                    bookmark.id,
                    "process",
                    Err(Error::Extraction(result.message)),
                )),
                Err(e) => outcomes.push(catch_up_outcome(bookmark.id, "process", Err(e))),
            }
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(
            result_count = outcomes.len(),
            failed_count = failed,
            "Catch-up complete"
        );
        Ok(outcomes)
    }
}

fn catch_up_outcome(bookmark_id: Uuid, stage: &str, result: Result<()>) -> CatchUpOutcome {
    if let Err(e) = &result {
        warn!(bookmark_id = %bookmark_id, stage, error = %e, "Catch-up stage failed");
    }
    CatchUpOutcome {
        bookmark_id,
        stage: stage.to_string(),
        success: result.is_ok(),
        error: result.err().map(|e| e.to_string()),
    }
}
