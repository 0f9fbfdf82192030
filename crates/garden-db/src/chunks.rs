//! Chunk index: embedding vectors over bookmark text fragments.
//!
//! Q&A fragments live in the same table under `qa-*` strategies, with
//! content shaped `"question?\nanswer"`.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use garden_core::{
    defaults, split_question_answer, BookmarkQuestion, BookmarkWithTitle, EmbeddedChunk,
    EmbeddingChunkRepository, Error, Result, RetrievedItem, SimilarBookmark,
};

use crate::bookmarks::{summary_subquery, title_subquery};

/// Strategy pattern matching every Q&A fragment strategy.
pub const QUESTION_STRATEGY_PATTERN: &str = "qa-%";

pub(crate) async fn list_questions_with(
    pool: &Pool<Postgres>,
    bookmark_id: Uuid,
) -> Result<Vec<BookmarkQuestion>> {
    let rows = sqlx::query(
        "SELECT id, content FROM bookmark_content_references \
         WHERE bookmark_id = $1 AND strategy LIKE $2 ORDER BY created_at",
    )
    .bind(bookmark_id)
    .bind(QUESTION_STRATEGY_PATTERN)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)?;

    Ok(rows
        .into_iter()
        .map(|row| BookmarkQuestion {
            id: row.get("id"),
            content: row.get("content"),
        })
        .collect())
}

/// PostgreSQL implementation of EmbeddingChunkRepository.
#[derive(Clone)]
pub struct PgEmbeddingChunkRepository {
    pool: Pool<Postgres>,
    dimension: usize,
}

impl PgEmbeddingChunkRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_dimension(pool, defaults::EMBED_DIMENSION)
    }

    /// Repository enforcing vectors of exactly `dimension` floats.
    pub fn with_dimension(pool: Pool<Postgres>, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        check_dimension(self.dimension, vector)
    }
}

/// Reject a vector whose length differs from the configured dimension.
pub fn check_dimension(expected: usize, vector: &Vector) -> Result<()> {
    let actual = vector.as_slice().len();
    if actual != expected {
        return Err(Error::Embedding(format!(
            "embedding dimension mismatch: expected {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}

#[async_trait]
impl EmbeddingChunkRepository for PgEmbeddingChunkRepository {
    #[instrument(skip(self, chunks), fields(subsystem = "db", component = "chunks", op = "insert_chunks", chunk_count = chunks.len()))]
    async fn insert_chunks(
        &self,
        bookmark_id: Uuid,
        strategy: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<Vec<Uuid>> {
        for chunk in chunks {
            self.check_dimension(&chunk.vector)?;
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let row = sqlx::query(
                "INSERT INTO bookmark_content_references (bookmark_id, content, strategy, embedding) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(bookmark_id)
            .bind(&chunk.text)
            .bind(strategy)
            .bind(&chunk.vector)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
            ids.push(row.get("id"));
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(chunk_count = ids.len(), "Stored embedding chunks");
        Ok(ids)
    }

    async fn list_questions(&self, bookmark_id: Uuid) -> Result<Vec<BookmarkQuestion>> {
        list_questions_with(&self.pool, bookmark_id).await
    }

    #[instrument(skip(self, content, vector), fields(subsystem = "db", component = "chunks", op = "update_chunk"))]
    async fn update_chunk(
        &self,
        bookmark_id: Uuid,
        chunk_id: Uuid,
        content: &str,
        vector: &Vector,
    ) -> Result<()> {
        self.check_dimension(vector)?;
        // Content and vector change in one statement.
        let result = sqlx::query(
            "UPDATE bookmark_content_references SET content = $1, embedding = $2 \
             WHERE id = $3 AND bookmark_id = $4",
        )
        .bind(content)
        .bind(vector)
        .bind(chunk_id)
        .bind(bookmark_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "question {} for bookmark {}",
                chunk_id, bookmark_id
            )));
        }
        Ok(())
    }

    async fn delete_chunk(&self, bookmark_id: Uuid, chunk_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM bookmark_content_references WHERE id = $1 AND bookmark_id = $2",
        )
        .bind(chunk_id)
        .bind(bookmark_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, query), fields(subsystem = "db", component = "chunks", op = "similar_questions"))]
    async fn similar_questions(&self, query: &Vector, limit: i64) -> Result<Vec<RetrievedItem>> {
        self.check_dimension(query)?;
        let sql = format!(
            "SELECT c.content, c.strategy, b.bookmark_id, b.url, \
                    COALESCE({title}, '') AS title, COALESCE({summary}, '') AS summary, \
                    (1 - (c.embedding <=> $1::vector))::float8 AS similarity \
             FROM bookmark_content_references c \
             JOIN bookmarks b ON b.bookmark_id = c.bookmark_id \
             WHERE c.strategy LIKE $2 AND vector_dims(c.embedding) = vector_dims($1::vector) \
             ORDER BY c.embedding <=> $1::vector \
             LIMIT $3",
            title = title_subquery("b"),
            summary = summary_subquery("b"),
        );
        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(QUESTION_STRATEGY_PATTERN)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let items: Vec<RetrievedItem> = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let content: String = row.get("content");
                let (question, answer) = split_question_answer(&content);
                let title: String = row.get("title");
                let url: String = row.get("url");
                RetrievedItem {
                    id: i + 1,
                    question: question.to_string(),
                    answer: answer.to_string(),
                    bookmark_id: row.get("bookmark_id"),
                    bookmark_title: title.clone(),
                    bookmark_url: url.clone(),
                    title,
                    url,
                    summary: row.get("summary"),
                    similarity: row.get("similarity"),
                    strategy: row.get("strategy"),
                }
            })
            .collect();

        debug!(result_count = items.len(), "Similar questions retrieved");
        Ok(items)
    }

    #[instrument(skip(self, query), fields(subsystem = "db", component = "chunks", op = "similar_bookmarks"))]
    async fn similar_bookmarks(
        &self,
        query: &Vector,
        strategy: &str,
        limit: i64,
    ) -> Result<Vec<SimilarBookmark>> {
        self.check_dimension(query)?;
        let sql = format!(
            "SELECT b.bookmark_id, b.url, b.creation_date, {title} AS title, {summary} AS summary, \
                    s.similarity \
             FROM ( \
                 SELECT c.bookmark_id, MAX(1 - (c.embedding <=> $1::vector))::float8 AS similarity \
                 FROM bookmark_content_references c \
                 WHERE c.strategy = $2 AND vector_dims(c.embedding) = vector_dims($1::vector) \
                 GROUP BY c.bookmark_id \
                 ORDER BY similarity DESC \
                 LIMIT $3 \
             ) s \
             JOIN bookmarks b ON b.bookmark_id = s.bookmark_id \
             ORDER BY s.similarity DESC",
            title = title_subquery("b"),
            summary = summary_subquery("b"),
        );
        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(strategy)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| SimilarBookmark {
                bookmark: BookmarkWithTitle {
                    id: row.get("bookmark_id"),
                    url: row.get("url"),
                    creation_date: row.get("creation_date"),
                    title: row.get("title"),
                    summary: row.get("summary"),
                },
                similarity: row.get("similarity"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimension_accepts_matching_vector() {
        let v = Vector::from(vec![0.0; 4]);
        assert!(check_dimension(4, &v).is_ok());
    }

    #[test]
    fn test_check_dimension_rejects_mismatch() {
        let v = Vector::from(vec![0.0; 3]);
        let err = check_dimension(768, &v).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("expected 768, got 3"));
    }

    #[test]
    fn test_question_strategy_pattern_matches_passage_strategy() {
        let prefix = QUESTION_STRATEGY_PATTERN.trim_end_matches('%');
        assert!(garden_core::strategy::QA_V2_PASSAGE.starts_with(prefix));
        assert!(!garden_core::strategy::CHUNKED_READER.starts_with(prefix));
    }
}
