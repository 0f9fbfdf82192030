//! # garden-db
//!
//! PostgreSQL database layer for garden.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for bookmarks, the chunk index,
//!   observations, entities, notes, and runtime configuration
//! - Hybrid (lexical + vector + recency) search
//! - Vector search with pgvector
//!
//! ## Example
//!
//! ```rust,ignore
//! use garden_db::{BookmarkRepository, CreateBookmarkRequest, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/garden").await?;
//!
//!     let bookmark = db.bookmarks.insert(CreateBookmarkRequest {
//!         url: "https://example.com/article".to_string(),
//!     }).await?;
//!
//!     println!("Created bookmark: {}", bookmark.id);
//!     Ok(())
//! }
//! ```
pub mod bookmarks;
pub mod chunks;
pub mod configuration;
pub mod entities;
pub mod notes;
pub mod observations;
pub mod pool;
pub mod search;

// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use garden_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use bookmarks::PgBookmarkRepository;
pub use chunks::{check_dimension, PgEmbeddingChunkRepository, QUESTION_STRATEGY_PATTERN};
pub use configuration::PgConfigurationRepository;
pub use entities::{PgEntityRepository, TxEntityLookup};
pub use notes::{slugify, PgNoteRepository};
pub use observations::PgObservationRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use search::PgHybridSearch;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub bookmarks: PgBookmarkRepository,
    /// Chunk index, including Q&A fragments.
    pub chunks: PgEmbeddingChunkRepository,
    pub observations: PgObservationRepository,
    pub entities: PgEntityRepository,
    pub notes: PgNoteRepository,
    pub configuration: PgConfigurationRepository,
    pub search: PgHybridSearch,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            bookmarks: PgBookmarkRepository::new(pool.clone()),
            chunks: PgEmbeddingChunkRepository::new(pool.clone()),
            observations: PgObservationRepository::new(pool.clone()),
            entities: PgEntityRepository::new(pool.clone()),
            notes: PgNoteRepository::new(pool.clone()),
            configuration: PgConfigurationRepository::new(pool.clone()),
            search: PgHybridSearch::new(pool.clone()),
            pool,
        }
    }

    /// Enforce `dimension` on every vector written to or queried from the
    /// chunk index.
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.chunks = PgEmbeddingChunkRepository::with_dimension(self.pool.clone(), dimension);
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
