//! Runtime configuration. Secret values never leave the server unmasked.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use garden_core::{ConfigurationEntry, SetConfigurationRequest};

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct PrefixQuery {
    #[serde(default)]
    pub prefix: String,
}

pub async fn list_configuration(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries: Vec<ConfigurationEntry> = state
        .repos
        .configuration
        .list_by_prefix(&query.prefix)
        .await?
        .into_iter()
        .map(ConfigurationEntry::masked)
        .collect();
    Ok(Json(entries))
}

pub async fn get_configuration(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .repos
        .configuration
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Configuration not found: {}", key)))?;
    Ok(Json(entry.masked()))
}

pub async fn set_configuration(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SetConfigurationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .repos
        .configuration
        .set_value(&key, &body.value, body.is_secret)
        .await?;
    Ok(Json(entry.masked()))
}
