//! Shared application state.

use std::sync::Arc;

use garden_core::{
    BookmarkRepository, ChunkedEmbeddingBackend, ConfigurationRepository,
    EmbeddingBackend, EmbeddingChunkRepository, EntityRepository, GenerationBackend,
    NoteRepository, ObservationRepository, PageFetcher, SearchRepository,
};
use garden_db::Database;
use garden_inference::{Summarizer, VectorEmbedder};
use garden_ingest::{IngestionPipeline, QuestionService};
use garden_search::{AdvancedSearch, FeedbackService, HybridSearchEngine, SimilaritySearch};

/// Repository handles the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub chunks: Arc<dyn EmbeddingChunkRepository>,
    pub observations: Arc<dyn ObservationRepository>,
    pub entities: Arc<dyn EntityRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub configuration: Arc<dyn ConfigurationRepository>,
    pub search: Arc<dyn SearchRepository>,
}

impl Repositories {
    pub fn from_database(db: &Database) -> Self {
        Self {
            bookmarks: Arc::new(db.bookmarks.clone()),
            chunks: Arc::new(db.chunks.clone()),
            observations: Arc::new(db.observations.clone()),
            entities: Arc::new(db.entities.clone()),
            notes: Arc::new(db.notes.clone()),
            configuration: Arc::new(db.configuration.clone()),
            search: Arc::new(db.search.clone()),
        }
    }
}

/// Inference and network backends.
#[derive(Clone)]
pub struct Backends {
    pub embedding: Arc<dyn EmbeddingBackend>,
    pub chunked: Arc<dyn ChunkedEmbeddingBackend>,
    pub generation: Arc<dyn GenerationBackend>,
    pub fetcher: Arc<dyn PageFetcher>,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub pipeline: IngestionPipeline,
    pub questions: QuestionService,
    pub hybrid: HybridSearchEngine,
    pub similar: SimilaritySearch,
    pub advanced: AdvancedSearch,
    pub feedback: FeedbackService,
}

impl AppState {
    pub fn new(repos: Repositories, backends: Backends) -> Self {
        let embedder = VectorEmbedder::new(backends.embedding.clone());
        let pipeline = IngestionPipeline::new(
            repos.bookmarks.clone(),
            repos.chunks.clone(),
            backends.fetcher.clone(),
            backends.chunked.clone(),
            Summarizer::new(backends.generation.clone()),
        );
        let questions = QuestionService::new(
            repos.bookmarks.clone(),
            repos.chunks.clone(),
            repos.observations.clone(),
            backends.chunked.clone(),
        );
        let hybrid = HybridSearchEngine::new(repos.search.clone(), embedder.clone());
        let similar = SimilaritySearch::new(repos.chunks.clone(), embedder.clone());
        let advanced = AdvancedSearch::new(
            repos.chunks.clone(),
            repos.configuration.clone(),
            embedder,
            backends.generation.clone(),
        );
        let feedback = FeedbackService::new(repos.observations.clone(), repos.chunks.clone());

        Self {
            repos,
            pipeline,
            questions,
            hybrid,
            similar,
            advanced,
            feedback,
        }
    }
}
