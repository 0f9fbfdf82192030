//! Hybrid and advanced search.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use garden_core::SearchWeights;
use garden_search::query_text;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct HybridSearchQuery {
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub exact_match_weight: Option<f64>,
    pub similarity_weight: Option<f64>,
    pub recency_weight: Option<f64>,
}

impl HybridSearchQuery {
    fn weights(&self) -> SearchWeights {
        let defaults = SearchWeights::default();
        SearchWeights {
            exact_match: self.exact_match_weight.unwrap_or(defaults.exact_match),
            similarity: self.similarity_weight.unwrap_or(defaults.similarity),
            recency: self.recency_weight.unwrap_or(defaults.recency),
        }
    }
}

pub async fn hybrid_search(
    State(state): State<AppState>,
    Query(params): Query<HybridSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let weights = params.weights();
    let query = params
        .query
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("query is required".into()))?;

    let results = state.hybrid.search(query, &weights, params.limit).await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct AdvancedSearchBody {
    #[serde(default)]
    pub query: JsonValue,
}

pub async fn advanced_search(
    State(state): State<AppState>,
    Json(body): Json<AdvancedSearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let query = query_text(&body.query)?;
    let result = state.advanced.search(&query).await?;
    Ok(Json(result))
}
