//! Note repository.
//!
//! Content writes resolve `[[...]]` references inside the same transaction
//! that stores the rewritten body and replaces the note's reference rows,
//! so a failure leaves neither half behind.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use garden_core::{
    referenced_ids, render_for_display, resolve_for_storage, CreateNoteRequest, EntityReference,
    Error, Note, NoteFull, NoteListItem, NoteRepository, Result, UpdateNoteRequest,
    ENTITY_TYPE_NOTE, SOURCE_TYPE_NOTE,
};

use crate::entities::{reference_from_row, PgEntityRepository, TxEntityLookup};

/// Relationship linking a note to its companion entity.
const RELATED_TYPE_ITEM: &str = "item";
const RELATIONSHIP_IDENTITY: &str = "identity";

/// URL-friendly slug derived from a note title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn note_from_row(row: &PgRow) -> Note {
    Note {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        contents: row.get("contents"),
        created: row.get("created"),
        modified: row.get("modified"),
    }
}

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Resolve references in `contents`, store the rewritten body, and
    /// replace the note's reference rows.
    async fn write_contents_tx(
        tx: &mut Transaction<'_, Postgres>,
        note_id: Uuid,
        contents: &str,
    ) -> Result<String> {
        let resolved = {
            let mut lookup = TxEntityLookup::new(tx);
            resolve_for_storage(&mut lookup, contents).await?
        };

        sqlx::query("UPDATE notes SET contents = $1, modified = now() WHERE id = $2")
            .bind(&resolved.content)
            .bind(note_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        PgEntityRepository::replace_references_tx(
            tx,
            SOURCE_TYPE_NOTE,
            note_id,
            &resolved.references,
        )
        .await?;

        debug!(
            note_id = %note_id,
            reference_count = resolved.references.len(),
            "Stored note contents with resolved references"
        );
        Ok(resolved.content)
    }

    /// Upsert each tag by name and bind it to the note.
    async fn bind_tags_tx(
        tx: &mut Transaction<'_, Postgres>,
        note_id: Uuid,
        tags: &[String],
    ) -> Result<()> {
        for name in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let row = sqlx::query(
                "INSERT INTO tags (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET modified = now() RETURNING id",
            )
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
            let tag_id: Uuid = row.get("id");

            sqlx::query(
                "INSERT INTO note_tags (note_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(note_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    async fn companion_entity_id(&self, note_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT r.entity_id FROM entity_relationships r \
             JOIN entities e ON e.entity_id = r.entity_id AND e.deleted_at IS NULL \
             WHERE r.related_type = $1 AND r.related_id = $2 AND r.relationship_type = $3 \
             ORDER BY r.created_at LIMIT 1",
        )
        .bind(RELATED_TYPE_ITEM)
        .bind(note_id)
        .bind(RELATIONSHIP_IDENTITY)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("entity_id")))
    }

    async fn tags_for(&self, note_id: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT t.name FROM note_tags nt JOIN tags t ON t.id = nt.tag_id \
             WHERE nt.note_id = $1 ORDER BY t.name",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|r| r.get("name")).collect())
    }

    /// Display form of stored contents: resolved tokens become links.
    async fn display_contents(&self, contents: &str) -> Result<String> {
        let ids = referenced_ids(contents);
        if ids.is_empty() {
            return Ok(contents.to_string());
        }
        let rows = sqlx::query(
            "SELECT entity_id, name FROM entities WHERE entity_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        let names: HashMap<Uuid, String> = rows
            .into_iter()
            .map(|r| (r.get("entity_id"), r.get("name")))
            .collect();
        Ok(render_for_display(contents, &names))
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    #[instrument(skip(self, req), fields(subsystem = "db", component = "notes", op = "create", tag_count = req.tags.len()))]
    async fn create(&self, req: CreateNoteRequest) -> Result<NoteFull> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("title is required".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            "INSERT INTO notes (title, slug, contents) VALUES ($1, $2, '') RETURNING id",
        )
        .bind(title)
        .bind(slugify(title))
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let note_id: Uuid = row.get("id");

        if !req.contents.is_empty() {
            Self::write_contents_tx(&mut tx, note_id, &req.contents).await?;
        }

        let entity_id =
            PgEntityRepository::create_tx(&mut tx, title, ENTITY_TYPE_NOTE, None, &json!({}))
                .await?;
        PgEntityRepository::create_relationship_tx(
            &mut tx,
            entity_id,
            RELATED_TYPE_ITEM,
            note_id,
            RELATIONSHIP_IDENTITY,
        )
        .await?;

        Self::bind_tags_tx(&mut tx, note_id, &req.tags).await?;
        tx.commit().await.map_err(Error::Database)?;

        self.get(note_id).await?.ok_or(Error::NoteNotFound(note_id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<NoteFull>> {
        let Some(row) = sqlx::query(
            "SELECT id, title, slug, contents, created, modified FROM notes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        else {
            return Ok(None);
        };

        let note = note_from_row(&row);
        let display_contents = match note.contents.as_deref() {
            Some(contents) => Some(self.display_contents(contents).await?),
            None => None,
        };

        Ok(Some(NoteFull {
            tags: self.tags_for(id).await?,
            entity_id: self.companion_entity_id(id).await?,
            display_contents,
            note,
        }))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<NoteListItem>, i64)> {
        let rows = sqlx::query(
            "SELECT n.id, n.title, n.created, n.modified, \
                    COALESCE(array_agg(t.name ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL), '{}') AS tags \
             FROM notes n \
             LEFT JOIN note_tags nt ON nt.note_id = n.id \
             LEFT JOIN tags t ON t.id = nt.tag_id \
             GROUP BY n.id \
             ORDER BY n.modified DESC \
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM notes")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get("total");

        let items = rows
            .into_iter()
            .map(|row| NoteListItem {
                id: row.get("id"),
                title: row.get("title"),
                tags: row.get("tags"),
                created: row.get("created"),
                modified: row.get("modified"),
            })
            .collect();
        Ok((items, total))
    }

    #[instrument(skip(self, req), fields(subsystem = "db", component = "notes", op = "update"))]
    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<NoteFull> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing = sqlx::query("SELECT title FROM notes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;
        let current_title: Option<String> = existing.get("title");

        let title = req
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or(current_title);
        sqlx::query("UPDATE notes SET title = $1, slug = $2, modified = now() WHERE id = $3")
            .bind(title.as_deref())
            .bind(title.as_deref().map(slugify))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if let Some(contents) = req.contents.as_deref() {
            Self::write_contents_tx(&mut tx, id, contents).await?;
        }

        if let Some(tags) = req.tags.as_deref() {
            sqlx::query("DELETE FROM note_tags WHERE note_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            Self::bind_tags_tx(&mut tx, id, tags).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        self.get(id).await?.ok_or(Error::NoteNotFound(id))
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "notes", op = "delete"))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let companion = self.companion_entity_id(id).await?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM note_tags WHERE note_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        PgEntityRepository::replace_references_tx(&mut tx, SOURCE_TYPE_NOTE, id, &[]).await?;

        if let Some(entity_id) = companion {
            sqlx::query(
                "UPDATE entities SET deleted_at = now(), updated_at = now() WHERE entity_id = $1",
            )
            .bind(entity_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            sqlx::query("DELETE FROM entity_relationships WHERE entity_id = $1")
                .bind(entity_id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_references(&self, note_id: Uuid) -> Result<Vec<EntityReference>> {
        let rows = sqlx::query(
            "SELECT id, source_type, source_id, entity_id, reference_text, position, created_at \
             FROM entity_references WHERE source_type = $1 AND source_id = $2 \
             ORDER BY position NULLS LAST, created_at",
        )
        .bind(SOURCE_TYPE_NOTE)
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(reference_from_row).collect())
    }
}
