//! Observation log repository (append-only).

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use garden_core::{
    observation, Error, FeedbackStats, FeedbackType, NewObservation, Observation,
    ObservationRepository, Result,
};

fn observation_from_row(row: &PgRow) -> Observation {
    Observation {
        id: row.get("observation_id"),
        data: row.get("data"),
        observation_type: row.get("type"),
        source: row.get("source"),
        tags: row.get("tags"),
        parent: row.get("parent"),
        ref_id: row.get("ref"),
        creation_date: row.get("creation_date"),
    }
}

/// PostgreSQL implementation of ObservationRepository.
#[derive(Clone)]
pub struct PgObservationRepository {
    pool: Pool<Postgres>,
}

impl PgObservationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObservationRepository for PgObservationRepository {
    #[instrument(skip(self, observation), fields(subsystem = "db", component = "observations", op = "insert", observation_type = %observation.observation_type))]
    async fn insert(&self, observation: NewObservation) -> Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO observations (data, type, source, tags, parent, ref) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING observation_id",
        )
        .bind(&observation.data)
        .bind(&observation.observation_type)
        .bind(&observation.source)
        .bind(&observation.tags)
        .bind(observation.parent)
        .bind(observation.ref_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("observation_id"))
    }

    async fn list_by_ref(&self, ref_id: Uuid) -> Result<Vec<Observation>> {
        let rows = sqlx::query(
            "SELECT observation_id, data, type, source, tags, parent, ref, creation_date \
             FROM observations WHERE ref = $1 ORDER BY creation_date DESC",
        )
        .bind(ref_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(observation_from_row).collect())
    }

    async fn feedback_stats(&self, bookmark_id: Uuid) -> Result<FeedbackStats> {
        let row = sqlx::query(
            "SELECT \
                 COUNT(*) FILTER (WHERE tags = $3) AS upvotes, \
                 COUNT(*) FILTER (WHERE tags = $4) AS downvotes, \
                 COUNT(*) FILTER (WHERE tags = $5) AS trash \
             FROM observations WHERE ref = $1 AND type = $2",
        )
        .bind(bookmark_id)
        .bind(observation::TYPE_QA_FEEDBACK)
        .bind(FeedbackType::Upvote.tags())
        .bind(FeedbackType::Downvote.tags())
        .bind(FeedbackType::Trash.tags())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(FeedbackStats {
            upvotes: row.get("upvotes"),
            downvotes: row.get("downvotes"),
            trash: row.get("trash"),
        })
    }
}
