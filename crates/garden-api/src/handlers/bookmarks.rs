//! Bookmark reads, ingestion stages, and Q&A edits.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use garden_core::defaults;
use garden_core::{
    CreateBookmarkRequest, DeleteQuestionRequest, Error, ExtractionStrategy,
    ListBookmarksRequest, UpdateQuestionRequest,
};
use garden_ingest::FetchOutcome;

use super::{list_response, PageQuery};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListBookmarksQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Substring over URL and title.
    pub search: Option<String>,
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Query(query): Query<ListBookmarksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve()?;
    let search = query.search.filter(|s| !s.trim().is_empty());

    let (bookmarks, total) = state
        .repos
        .bookmarks
        .list(ListBookmarksRequest {
            search,
            limit,
            offset,
        })
        .await?;
    Ok(Json(list_response(bookmarks, total, limit, offset)))
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    Json(body): Json<CreateBookmarkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url is required".into()));
    }
    let bookmark = state.repos.bookmarks.insert(body).await?;
    Ok((StatusCode::CREATED, Json(bookmark)))
}

/// Redirects (302) to the details of a random bookmark.
pub async fn random_bookmark(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .repos
        .bookmarks
        .random_id()
        .await?
        .ok_or_else(|| ApiError::NotFound("no bookmarks".into()))?;
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, format!("/api/bookmarks/{}", id))],
    ))
}

#[derive(Debug, Deserialize)]
pub struct SimilarBookmarksQuery {
    pub query: Option<String>,
    pub strategy: Option<String>,
    pub limit: Option<i64>,
}

pub async fn search_bookmarks(
    State(state): State<AppState>,
    Query(query): Query<SimilarBookmarksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let text = query
        .query
        .ok_or_else(|| ApiError::BadRequest("query is required".into()))?;
    let hits = state
        .similar
        .similar_bookmarks(&text, query.strategy.as_deref(), query.limit)
        .await?;
    Ok(Json(hits))
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    pub limit: Option<i64>,
}

impl BatchQuery {
    fn limit(&self) -> i64 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(defaults::PAGE_LIMIT_MAX)
    }
}

pub async fn missing_http(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bookmarks = state
        .repos
        .bookmarks
        .list_missing_http_responses(query.limit())
        .await?;
    Ok(Json(bookmarks))
}

pub async fn missing_reader(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bookmarks = state
        .repos
        .bookmarks
        .list_missing_reader_content(query.limit())
        .await?;
    Ok(Json(bookmarks))
}

pub async fn catch_up(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let outcomes = state.pipeline.catch_up(query.limit()).await?;
    let failed = outcomes.iter().filter(|o| !o.success).count();
    Ok(Json(json!({
        "processed": outcomes.len(),
        "failed": failed,
        "results": outcomes,
    })))
}

pub async fn get_bookmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .repos
        .bookmarks
        .get_details(id)
        .await?
        .ok_or(Error::BookmarkNotFound(id))?;
    Ok(Json(details))
}

// =============================================================================
// INGESTION STAGES
// =============================================================================

pub async fn fetch_bookmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.pipeline.fetch(id).await? {
        FetchOutcome::Fetched(result) => Ok(Json(result)),
        FetchOutcome::Failed { error, response } => Err(ApiError::FetchFailed {
            message: error.to_string(),
            response,
        }),
    }
}

pub async fn process_lynx(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.pipeline.process(id, ExtractionStrategy::Lynx).await?;
    Ok(Json(result))
}

pub async fn process_reader(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.pipeline.process(id, ExtractionStrategy::Reader).await?;
    Ok(Json(result))
}

pub async fn embed_chunks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.pipeline.embed_chunks(id).await?;
    Ok(Json(result))
}

pub async fn embed_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.pipeline.embed_summary(id).await?;
    Ok(Json(result))
}

pub async fn resolve_title(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.pipeline.resolve_title(id).await?;
    Ok(Json(result))
}

// =============================================================================
// Q&A EDITS
// =============================================================================

pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.questions.update_question(id, body).await?;
    Ok(Json(json!({ "message": "Question updated successfully" })))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Path((id, ref_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<DeleteQuestionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    state.questions.delete_question(id, ref_id, body).await?;
    Ok(Json(json!({ "message": "Question deleted successfully" })))
}

pub async fn feedback_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.feedback.stats(id).await?;
    Ok(Json(stats))
}
