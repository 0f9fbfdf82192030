use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use garden_core::StoreFeedbackRequest;

use crate::{ApiError, AppState};

pub async fn store_feedback(
    State(state): State<AppState>,
    Json(body): Json<StoreFeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.feedback.store_feedback(body).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub struct ObservationsQuery {
    #[serde(rename = "ref")]
    pub ref_id: Uuid,
}

pub async fn list_observations(
    State(state): State<AppState>,
    Query(query): Query<ObservationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let observations = state.feedback.observations_for(query.ref_id).await?;
    Ok(Json(observations))
}
