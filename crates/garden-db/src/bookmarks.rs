//! Bookmark repository: bookmarks, fetched responses, processed content,
//! and titles.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use garden_core::{
    strategy, Bookmark, BookmarkDetails, BookmarkRepository, BookmarkWithTitle,
    CreateBookmarkRequest, Error, FetchResponse, HttpResponseRecord, ListBookmarksRequest, Result,
    TitleData, TitleSource,
};

use crate::chunks::list_questions_with;
use crate::escape_like;

/// Canonical title of the bookmark aliased `alias`: the most trusted source
/// wins, and within one source the first write wins.
pub(crate) fn title_subquery(alias: &str) -> String {
    format!(
        "(SELECT t.title FROM bookmark_titles t WHERE t.bookmark_id = {alias}.bookmark_id \
         ORDER BY CASE t.source WHEN 'html-title' THEN 0 WHEN 'reader-title' THEN 1 ELSE 2 END DESC, \
         t.created_at ASC LIMIT 1)"
    )
}

/// Latest `summary-reader` chunk text of the bookmark aliased `alias`.
pub(crate) fn summary_subquery(alias: &str) -> String {
    format!(
        "(SELECT s.content FROM bookmark_content_references s WHERE s.bookmark_id = {alias}.bookmark_id \
         AND s.strategy = '{}' ORDER BY s.created_at DESC LIMIT 1)",
        strategy::SUMMARY_READER
    )
}

/// Latest processed content of one strategy for the bookmark aliased `alias`.
fn processed_subquery(alias: &str, strategy_name: &str) -> String {
    format!(
        "(SELECT p.processed_content FROM processed_contents p WHERE p.bookmark_id = {alias}.bookmark_id \
         AND p.strategy_used = '{strategy_name}' ORDER BY p.created_at DESC LIMIT 1)"
    )
}

fn bookmark_from_row(row: &PgRow) -> Bookmark {
    Bookmark {
        id: row.get("bookmark_id"),
        url: row.get("url"),
        creation_date: row.get("creation_date"),
    }
}

fn bookmark_with_title_from_row(row: &PgRow) -> BookmarkWithTitle {
    BookmarkWithTitle {
        id: row.get("bookmark_id"),
        url: row.get("url"),
        creation_date: row.get("creation_date"),
        title: row.get("title"),
        summary: row.get("summary"),
    }
}

fn http_response_from_row(row: &PgRow) -> HttpResponseRecord {
    HttpResponseRecord {
        id: row.get("response_id"),
        bookmark_id: row.get("bookmark_id"),
        status_code: row.get("status_code"),
        headers: row.get("headers"),
        content: row.get("content"),
        fetch_date: row.get("fetch_date"),
    }
}

/// PostgreSQL implementation of BookmarkRepository.
#[derive(Clone)]
pub struct PgBookmarkRepository {
    pool: Pool<Postgres>,
}

impl PgBookmarkRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn list_missing(&self, condition: &str, limit: i64) -> Result<Vec<Bookmark>> {
        let sql = format!(
            "SELECT b.bookmark_id, b.url, b.creation_date FROM bookmarks b \
             WHERE {condition} ORDER BY b.creation_date DESC LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(bookmark_from_row).collect())
    }
}

#[async_trait]
impl BookmarkRepository for PgBookmarkRepository {
    #[instrument(skip(self), fields(subsystem = "db", component = "bookmarks", op = "insert"))]
    async fn insert(&self, req: CreateBookmarkRequest) -> Result<Bookmark> {
        let url = req.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("url is required".to_string()));
        }
        let row = sqlx::query(
            "INSERT INTO bookmarks (url) VALUES ($1) RETURNING bookmark_id, url, creation_date",
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(bookmark_from_row(&row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bookmark>> {
        let row = sqlx::query(
            "SELECT bookmark_id, url, creation_date FROM bookmarks WHERE bookmark_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(bookmark_from_row))
    }

    async fn get_with_title(&self, id: Uuid) -> Result<Option<BookmarkWithTitle>> {
        let sql = format!(
            "SELECT b.bookmark_id, b.url, b.creation_date, {} AS title, {} AS summary \
             FROM bookmarks b WHERE b.bookmark_id = $1",
            title_subquery("b"),
            summary_subquery("b")
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(bookmark_with_title_from_row))
    }

    #[instrument(skip(self, req), fields(subsystem = "db", component = "bookmarks", op = "list", limit = req.limit, offset = req.offset))]
    async fn list(&self, req: ListBookmarksRequest) -> Result<(Vec<BookmarkWithTitle>, i64)> {
        let pattern = req
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let base = format!(
            "SELECT b.bookmark_id, b.url, b.creation_date, {} AS title, {} AS summary FROM bookmarks b",
            title_subquery("b"),
            summary_subquery("b")
        );
        let filter = "WHERE $1::text IS NULL OR x.url ILIKE $1 OR COALESCE(x.title, '') ILIKE $1";

        let list_sql = format!(
            "SELECT * FROM ({base}) x {filter} ORDER BY x.creation_date DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&list_sql)
            .bind(pattern.as_deref())
            .bind(req.limit)
            .bind(req.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let count_sql = format!("SELECT COUNT(*) AS total FROM ({base}) x {filter}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get("total");

        debug!(result_count = rows.len(), total, "Listed bookmarks");
        Ok((rows.iter().map(bookmark_with_title_from_row).collect(), total))
    }

    async fn random_id(&self) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT bookmark_id FROM bookmarks ORDER BY random() LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("bookmark_id")))
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "bookmarks", op = "get_details"))]
    async fn get_details(&self, id: Uuid) -> Result<Option<BookmarkDetails>> {
        let sql = format!(
            "SELECT b.bookmark_id, b.url, b.creation_date, {title} AS title, \
                    {lynx} AS lynx, {reader} AS reader, {summary} AS summary, \
                    h.status_code, h.headers, h.content, h.fetch_date \
             FROM bookmarks b \
             LEFT JOIN LATERAL ( \
                 SELECT r.status_code, r.headers, r.content, r.fetch_date FROM http_responses r \
                 WHERE r.bookmark_id = b.bookmark_id ORDER BY r.fetch_date DESC LIMIT 1 \
             ) h ON true \
             WHERE b.bookmark_id = $1",
            title = title_subquery("b"),
            lynx = processed_subquery("b", strategy::LYNX),
            reader = processed_subquery("b", strategy::READER),
            summary = summary_subquery("b"),
        );
        let Some(row) = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
        else {
            return Ok(None);
        };

        let content: Option<Vec<u8>> = row.get("content");
        let questions = list_questions_with(&self.pool, id).await?;

        Ok(Some(BookmarkDetails {
            id: row.get("bookmark_id"),
            url: row.get("url"),
            creation_date: row.get("creation_date"),
            title: row.get("title"),
            lynx: row.get("lynx"),
            reader: row.get("reader"),
            summary: row.get("summary"),
            status_code: row.get("status_code"),
            headers: row.get("headers"),
            content: content.map(|c| String::from_utf8_lossy(&c).into_owned()),
            fetch_date: row.get("fetch_date"),
            questions,
        }))
    }

    async fn list_missing_http_responses(&self, limit: i64) -> Result<Vec<Bookmark>> {
        self.list_missing(
            "NOT EXISTS (SELECT 1 FROM http_responses r WHERE r.bookmark_id = b.bookmark_id)",
            limit,
        )
        .await
    }

    async fn list_missing_reader_content(&self, limit: i64) -> Result<Vec<Bookmark>> {
        let condition = format!(
            "NOT EXISTS (SELECT 1 FROM processed_contents p WHERE p.bookmark_id = b.bookmark_id \
             AND p.strategy_used = '{}')",
            strategy::READER
        );
        self.list_missing(&condition, limit).await
    }

    #[instrument(skip(self, response), fields(subsystem = "db", component = "bookmarks", op = "insert_http_response", status_code = response.status_code))]
    async fn insert_http_response(
        &self,
        bookmark_id: Uuid,
        response: &FetchResponse,
    ) -> Result<HttpResponseRecord> {
        let row = sqlx::query(
            "INSERT INTO http_responses (bookmark_id, status_code, headers, content, fetch_date) \
             VALUES ($1, $2, $3, $4, clock_timestamp()) \
             RETURNING response_id, bookmark_id, status_code, headers, content, fetch_date",
        )
        .bind(bookmark_id)
        .bind(response.status_code)
        .bind(&response.headers)
        .bind(&response.content)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(http_response_from_row(&row))
    }

    async fn get_latest_http_response(
        &self,
        bookmark_id: Uuid,
    ) -> Result<Option<HttpResponseRecord>> {
        let row = sqlx::query(
            "SELECT response_id, bookmark_id, status_code, headers, content, fetch_date \
             FROM http_responses WHERE bookmark_id = $1 ORDER BY fetch_date DESC LIMIT 1",
        )
        .bind(bookmark_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(http_response_from_row))
    }

    #[instrument(skip(self, content), fields(subsystem = "db", component = "bookmarks", op = "insert_processed_content", content_len = content.len()))]
    async fn insert_processed_content(
        &self,
        bookmark_id: Uuid,
        strategy: &str,
        content: &str,
    ) -> Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO processed_contents (bookmark_id, strategy_used, processed_content) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(bookmark_id)
        .bind(strategy)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("id"))
    }

    async fn get_processed_content(
        &self,
        bookmark_id: Uuid,
        strategy: &str,
    ) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT processed_content FROM processed_contents \
             WHERE bookmark_id = $1 AND strategy_used = $2 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(bookmark_id)
        .bind(strategy)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(|r| r.get("processed_content")))
    }

    async fn get_title_data(&self, bookmark_id: Uuid) -> Result<TitleData> {
        let sql = format!(
            "SELECT {title} AS existing_title, {reader} AS reader_content, \
                    (SELECT r.content FROM http_responses r WHERE r.bookmark_id = b.bookmark_id \
                     ORDER BY r.fetch_date DESC LIMIT 1) AS raw_content \
             FROM bookmarks b WHERE b.bookmark_id = $1",
            title = title_subquery("b"),
            reader = processed_subquery("b", strategy::READER),
        );
        let row = sqlx::query(&sql)
            .bind(bookmark_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::BookmarkNotFound(bookmark_id))?;

        Ok(TitleData {
            existing_title: row.get("existing_title"),
            reader_content: row.get("reader_content"),
            raw_content: row.get("raw_content"),
        })
    }

    async fn insert_title(&self, bookmark_id: Uuid, title: &str, source: &TitleSource) -> Result<()> {
        // First write per source wins; the read path orders sources by trust.
        sqlx::query(
            "INSERT INTO bookmark_titles (bookmark_id, title, source) \
             SELECT $1, $2, $3 WHERE NOT EXISTS ( \
                 SELECT 1 FROM bookmark_titles WHERE bookmark_id = $1 AND source = $3)",
        )
        .bind(bookmark_id)
        .bind(title)
        .bind(source.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
