//! Entity repository and the transaction-scoped entity lookup used by the
//! reference resolver.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use garden_core::{
    CreateEntityRequest, Entity, EntityLookup, EntityReference, EntityRepository, Error,
    NewEntityReference, Result,
};

const ENTITY_COLUMNS: &str =
    "entity_id, name, type, description, properties, created_at, updated_at, deleted_at";

const REFERENCE_COLUMNS: &str =
    "id, source_type, source_id, entity_id, reference_text, position, created_at";

fn entity_from_row(row: &PgRow) -> Entity {
    Entity {
        id: row.get("entity_id"),
        name: row.get("name"),
        entity_type: row.get("type"),
        description: row.get("description"),
        properties: row.get("properties"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

pub(crate) fn reference_from_row(row: &PgRow) -> EntityReference {
    EntityReference {
        id: row.get("id"),
        source_type: row.get("source_type"),
        source_id: row.get("source_id"),
        entity_id: row.get("entity_id"),
        reference_text: row.get("reference_text"),
        position: row.get("position"),
        created_at: row.get("created_at"),
    }
}

/// PostgreSQL implementation of EntityRepository.
#[derive(Clone)]
pub struct PgEntityRepository {
    pool: Pool<Postgres>,
}

impl PgEntityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create an entity inside an existing transaction.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        entity_type: &str,
        description: Option<&str>,
        properties: &JsonValue,
    ) -> Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO entities (name, type, description, properties) \
             VALUES ($1, $2, $3, $4) RETURNING entity_id",
        )
        .bind(name)
        .bind(entity_type)
        .bind(description)
        .bind(properties)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("entity_id"))
    }

    /// Record a relationship between an entity and another item.
    pub async fn create_relationship_tx(
        tx: &mut Transaction<'_, Postgres>,
        entity_id: Uuid,
        related_type: &str,
        related_id: Uuid,
        relationship_type: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO entity_relationships (entity_id, related_type, related_id, relationship_type) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(entity_id)
        .bind(related_type)
        .bind(related_id)
        .bind(relationship_type)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Replace every reference recorded for one source.
    pub async fn replace_references_tx(
        tx: &mut Transaction<'_, Postgres>,
        source_type: &str,
        source_id: Uuid,
        references: &[NewEntityReference],
    ) -> Result<()> {
        sqlx::query("DELETE FROM entity_references WHERE source_type = $1 AND source_id = $2")
            .bind(source_type)
            .bind(source_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        for reference in references {
            sqlx::query(
                "INSERT INTO entity_references (source_type, source_id, entity_id, reference_text, position) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(source_type)
            .bind(source_id)
            .bind(reference.entity_id)
            .bind(&reference.reference_text)
            .bind(reference.position)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    #[instrument(skip(self, req), fields(subsystem = "db", component = "entities", op = "create"))]
    async fn create(&self, req: CreateEntityRequest) -> Result<Entity> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name is required".to_string()));
        }
        if req.entity_type.trim().is_empty() {
            return Err(Error::InvalidInput("type is required".to_string()));
        }

        let sql = format!(
            "INSERT INTO entities (name, type, description, properties) \
             VALUES ($1, $2, $3, $4) RETURNING {ENTITY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(req.entity_type.trim())
            .bind(req.description.as_deref())
            .bind(req.properties.unwrap_or_else(|| json!({})))
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(entity_from_row(&row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Entity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(entity_from_row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Entity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE name = $1 AND deleted_at IS NULL \
             ORDER BY created_at LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(entity_from_row))
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ANY($1) AND deleted_at IS NULL"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(entity_from_row).collect())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Entity>, i64)> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE deleted_at IS NULL \
             ORDER BY updated_at DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        let total: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM entities WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?
                .get("total");
        Ok((rows.iter().map(entity_from_row).collect(), total))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE entities SET deleted_at = now(), updated_at = now() \
             WHERE entity_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_references(&self, entity_id: Uuid) -> Result<Vec<EntityReference>> {
        let sql = format!(
            "SELECT {REFERENCE_COLUMNS} FROM entity_references WHERE entity_id = $1 \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(reference_from_row).collect())
    }
}

/// [`EntityLookup`] over an open transaction, so reference resolution
/// commits or rolls back with the content write.
pub struct TxEntityLookup<'a, 'c> {
    tx: &'a mut Transaction<'c, Postgres>,
}

impl<'a, 'c> TxEntityLookup<'a, 'c> {
    pub fn new(tx: &'a mut Transaction<'c, Postgres>) -> Self {
        Self { tx }
    }

    async fn execute(&mut self, statement: &str) -> Result<()> {
        sqlx::query(statement)
            .execute(&mut **self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Close the savepoint opened before a lookup statement. A failed
    /// statement is rolled back to it so the enclosing transaction stays usable.
    async fn close_savepoint(&mut self, succeeded: bool) -> Result<()> {
        if succeeded {
            self.execute(RELEASE_SAVEPOINT).await
        } else {
            self.execute(ROLLBACK_TO_SAVEPOINT).await
        }
    }
}

const SAVEPOINT: &str = "SAVEPOINT entity_lookup";
const RELEASE_SAVEPOINT: &str = "RELEASE SAVEPOINT entity_lookup";
const ROLLBACK_TO_SAVEPOINT: &str = "ROLLBACK TO SAVEPOINT entity_lookup";

#[async_trait]
impl<'a, 'c> EntityLookup for TxEntityLookup<'a, 'c> {
    async fn entity_exists(&mut self, id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM entities WHERE entity_id = $1 AND deleted_at IS NULL) AS found",
        )
        .bind(id)
        .fetch_one(&mut **self.tx)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("found"))
    }

    async fn find_entity_by_name(&mut self, name: &str) -> Result<Option<Uuid>> {
        self.execute(SAVEPOINT).await?;
        let found = sqlx::query(
            "SELECT entity_id FROM entities WHERE name = $1 AND deleted_at IS NULL \
             ORDER BY created_at LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&mut **self.tx)
        .await
        .map(|row| row.map(|r| r.get("entity_id")))
        .map_err(Error::Database);
        self.close_savepoint(found.is_ok()).await?;
        found
    }

    async fn create_entity(&mut self, name: &str, entity_type: &str) -> Result<Uuid> {
        self.execute(SAVEPOINT).await?;
        let created =
            PgEntityRepository::create_tx(self.tx, name, entity_type, None, &json!({})).await;
        self.close_savepoint(created.is_ok()).await?;
        created
    }
}
