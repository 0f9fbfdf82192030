//! Notes. Reference resolution happens inside the repository writes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use garden_core::{CreateNoteRequest, Error, UpdateNoteRequest};

use super::{list_response, PageQuery};
use crate::{ApiError, AppState};

pub async fn list_notes(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page.resolve()?;
    let (notes, total) = state.repos.notes.list(limit, offset).await?;
    Ok(Json(list_response(notes, total, limit, offset)))
}

pub async fn create_note(
    State(state): State<AppState>,
    Json(body): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.repos.notes.create(body).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state
        .repos
        .notes
        .get(id)
        .await?
        .ok_or(Error::NoteNotFound(id))?;
    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.repos.notes.update(id, body).await?;
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if state.repos.notes.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NoteNotFound(id).into())
    }
}
