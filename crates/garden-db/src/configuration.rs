//! Runtime key/value configuration repository.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::instrument;

use garden_core::{ConfigurationEntry, ConfigurationRepository, Error, Result};

use crate::escape_like;

fn entry_from_row(row: &PgRow) -> ConfigurationEntry {
    ConfigurationEntry {
        key: row.get("key"),
        value: row.get("value"),
        is_secret: row.get("is_secret"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of ConfigurationRepository.
#[derive(Clone)]
pub struct PgConfigurationRepository {
    pool: Pool<Postgres>,
}

impl PgConfigurationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigurationRepository for PgConfigurationRepository {
    async fn get(&self, key: &str) -> Result<Option<ConfigurationEntry>> {
        let row = sqlx::query(
            "SELECT key, value, is_secret, created_at, updated_at FROM configurations WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(entry_from_row))
    }

    #[instrument(skip(self, value), fields(subsystem = "db", component = "configuration", op = "set_value"))]
    async fn set_value(
        &self,
        key: &str,
        value: &str,
        is_secret: bool,
    ) -> Result<ConfigurationEntry> {
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("key is required".to_string()));
        }
        let row = sqlx::query(
            "INSERT INTO configurations (key, value, is_secret) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, \
                 is_secret = EXCLUDED.is_secret, updated_at = now() \
             RETURNING key, value, is_secret, created_at, updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(is_secret)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(entry_from_row(&row))
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ConfigurationEntry>> {
        let rows = sqlx::query(
            "SELECT key, value, is_secret, created_at, updated_at FROM configurations \
             WHERE key LIKE $1 ORDER BY key",
        )
        .bind(format!("{}%", escape_like(prefix)))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(entry_from_row).collect())
    }
}
