//! Hybrid search across bookmarks, notes, and entities.
//!
//! Each row scores
//! `exact * [query in title] + similarity * sim + recency * exp(-age_days / decay)`.
//! Bookmarks take `sim` from their best chunk vector; notes and entities
//! from a normalized full-text rank.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument, warn};

use garden_core::{
    defaults, Error, Result, SearchRepository, SearchWeights, UnifiedSearchResult,
};

use crate::bookmarks::title_subquery;
use crate::escape_like;

/// Searches above this duration are logged as slow.
const SLOW_SEARCH_MS: u64 = 1_000;

fn hybrid_sql() -> String {
    format!(
        r#"
        WITH params AS (
            SELECT $1::text AS pattern,
                   plainto_tsquery('english', $2::text) AS tsq,
                   $3::vector AS qvec
        ),
        candidates AS (
            SELECT 'bookmark' AS item_type,
                   b.bookmark_id AS item_id,
                   COALESCE({bookmark_title}, b.url) AS item_title,
                   b.creation_date AS last_activity,
                   CASE WHEN COALESCE({bookmark_title}, '') ILIKE p.pattern THEN 1.0::float8 ELSE 0.0::float8 END AS exact_score,
                   COALESCE((
                       SELECT MAX(1 - (c.embedding <=> p.qvec))
                       FROM bookmark_content_references c
                       WHERE c.bookmark_id = b.bookmark_id
                         AND vector_dims(c.embedding) = vector_dims(p.qvec)
                   ), 0.0)::float8 AS similarity_score
            FROM bookmarks b, params p

            UNION ALL

            SELECT 'note',
                   n.id,
                   COALESCE(n.title, ''),
                   n.modified,
                   CASE WHEN COALESCE(n.title, '') ILIKE p.pattern THEN 1.0::float8 ELSE 0.0::float8 END,
                   ts_rank(
                       to_tsvector('english', COALESCE(n.title, '') || ' ' || COALESCE(n.contents, '')),
                       p.tsq, 32)::float8
            FROM notes n, params p

            UNION ALL

            SELECT 'entity',
                   e.entity_id,
                   e.name,
                   e.updated_at,
                   CASE WHEN e.name ILIKE p.pattern THEN 1.0::float8 ELSE 0.0::float8 END,
                   ts_rank(
                       to_tsvector('english', e.name || ' ' || COALESCE(e.description, '')),
                       p.tsq, 32)::float8
            FROM entities e, params p
            WHERE e.deleted_at IS NULL
        )
        SELECT item_type, item_id, item_title, last_activity,
               ($4::float8 * exact_score
                + $5::float8 * similarity_score
                + $6::float8 * exp(-GREATEST(EXTRACT(EPOCH FROM (now() - last_activity))::float8, 0) / 86400.0 / $7::float8)
               )::float8 AS search_score
        FROM candidates
        WHERE exact_score > 0 OR similarity_score > 0
        ORDER BY search_score DESC
        LIMIT $8
        "#,
        bookmark_title = title_subquery("b"),
    )
}

/// PostgreSQL implementation of SearchRepository.
#[derive(Clone)]
pub struct PgHybridSearch {
    pool: Pool<Postgres>,
    recency_decay_days: f64,
}

impl PgHybridSearch {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            recency_decay_days: defaults::SEARCH_RECENCY_DECAY_DAYS,
        }
    }
}

#[async_trait]
impl SearchRepository for PgHybridSearch {
    #[instrument(skip(self, query_vector, weights), fields(subsystem = "db", component = "search", op = "hybrid_search", query_len = query.len()))]
    async fn hybrid_search(
        &self,
        query: &str,
        query_vector: &Vector,
        weights: &SearchWeights,
        limit: i64,
    ) -> Result<Vec<UnifiedSearchResult>> {
        let start = std::time::Instant::now();
        let pattern = format!("%{}%", escape_like(query));

        let rows = sqlx::query(&hybrid_sql())
            .bind(&pattern)
            .bind(query)
            .bind(query_vector)
            .bind(weights.exact_match)
            .bind(weights.similarity)
            .bind(weights.recency)
            .bind(self.recency_decay_days)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let results: Vec<UnifiedSearchResult> = rows
            .into_iter()
            .map(|row| UnifiedSearchResult {
                item_type: row.get("item_type"),
                item_id: row.get("item_id"),
                item_title: row.get("item_title"),
                last_activity: row.get("last_activity"),
                search_score: row.get("search_score"),
            })
            .collect();

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(result_count = results.len(), duration_ms = elapsed, "Hybrid search complete");
        if elapsed > SLOW_SEARCH_MS {
            warn!(duration_ms = elapsed, slow = true, "Slow hybrid search");
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_sql_covers_every_kind() {
        let sql = hybrid_sql();
        for kind in ["'bookmark'", "'note'", "'entity'"] {
            assert!(sql.contains(kind), "missing {}", kind);
        }
    }

    #[test]
    fn test_hybrid_sql_binds_weights_and_limit() {
        let sql = hybrid_sql();
        for param in ["$4::float8", "$5::float8", "$6::float8", "$7::float8", "LIMIT $8"] {
            assert!(sql.contains(param), "missing {}", param);
        }
    }

    #[test]
    fn test_hybrid_sql_excludes_deleted_entities() {
        assert!(hybrid_sql().contains("e.deleted_at IS NULL"));
    }
}
