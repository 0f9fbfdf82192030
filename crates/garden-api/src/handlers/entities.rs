use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use garden_core::{CreateEntityRequest, Error};

use super::{list_response, PageQuery};
use crate::{ApiError, AppState};

/// Lists live entities; soft-deleted rows are excluded.
pub async fn list_entities(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page.resolve()?;
    let (entities, total) = state.repos.entities.list(limit, offset).await?;
    Ok(Json(list_response(entities, total, limit, offset)))
}

pub async fn create_entity(
    State(state): State<AppState>,
    Json(body): Json<CreateEntityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entity = state.repos.entities.create(body).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

pub async fn get_entity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entity = state
        .repos
        .entities
        .get(id)
        .await?
        .ok_or(Error::EntityNotFound(id))?;
    Ok(Json(entity))
}

pub async fn delete_entity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if state.repos.entities.soft_delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::EntityNotFound(id).into())
    }
}

pub async fn entity_references(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let references = state.repos.entities.list_references(id).await?;
    Ok(Json(references))
}
