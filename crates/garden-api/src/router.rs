//! Route table and middleware stack.

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use crate::handlers::{
    bookmarks, configuration, entities, health, notes, observations, search,
};
use crate::AppState;

/// Request body cap. Bookmark and note payloads are small.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Generates UUIDv7 request IDs (time-ordered).
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Origins from `CORS_ALLOWED_ORIGINS`. `None` when unset or empty.
fn parse_allowed_origins() -> Option<Vec<HeaderValue>> {
    let origins_str = std::env::var("CORS_ALLOWED_ORIGINS").ok()?;
    if origins_str.trim().is_empty() {
        return None;
    }

    let origins = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();
    Some(origins)
}

fn cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .max_age(Duration::from_secs(3600));

    match parse_allowed_origins() {
        Some(origins) => base
            .allow_origin(AllowOrigin::list(origins))
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        None => base.allow_origin(Any).allow_headers(Any),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Bookmarks
        .route(
            "/api/bookmarks",
            get(bookmarks::list_bookmarks).post(bookmarks::create_bookmark),
        )
        .route("/api/bookmarks/random", get(bookmarks::random_bookmark))
        .route("/api/bookmarks/search", get(bookmarks::search_bookmarks))
        .route("/api/bookmarks/missing/http", get(bookmarks::missing_http))
        .route("/api/bookmarks/missing/reader", get(bookmarks::missing_reader))
        .route("/api/bookmarks/catch-up", post(bookmarks::catch_up))
        .route("/api/bookmarks/:id", get(bookmarks::get_bookmark))
        .route("/api/bookmarks/:id/fetch", post(bookmarks::fetch_bookmark))
        .route("/api/bookmarks/:id/process/lynx", post(bookmarks::process_lynx))
        .route(
            "/api/bookmarks/:id/process/reader",
            post(bookmarks::process_reader),
        )
        .route("/api/bookmarks/:id/embeddings", post(bookmarks::embed_chunks))
        .route(
            "/api/bookmarks/:id/summary-embedding",
            post(bookmarks::embed_summary),
        )
        .route("/api/bookmarks/:id/title", get(bookmarks::resolve_title))
        .route("/api/bookmarks/:id/question", put(bookmarks::update_question))
        .route(
            "/api/bookmarks/:id/question/:ref_id",
            axum::routing::delete(bookmarks::delete_question),
        )
        .route(
            "/api/bookmarks/:id/feedback/stats",
            get(bookmarks::feedback_stats),
        )
        // Search
        .route("/api/search", get(search::hybrid_search))
        .route("/api/search/advanced", post(search::advanced_search))
        // Observations
        .route("/api/observations", get(observations::list_observations))
        .route("/api/observations/feedback", post(observations::store_feedback))
        // Notes
        .route("/api/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/api/notes/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        // Entities
        .route(
            "/api/entities",
            get(entities::list_entities).post(entities::create_entity),
        )
        .route(
            "/api/entities/:id",
            get(entities::get_entity).delete(entities::delete_entity),
        )
        .route(
            "/api/entities/:id/references",
            get(entities::entity_references),
        )
        // Configuration
        .route("/api/configuration", get(configuration::list_configuration))
        .route(
            "/api/configuration/:key",
            get(configuration::get_configuration).put(configuration::set_configuration),
        )
        // Middleware
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
