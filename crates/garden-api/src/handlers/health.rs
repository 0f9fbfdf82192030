use std::time::Instant;

use axum::response::IntoResponse;
use axum::Json;
use once_cell::sync::Lazy;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Pins the uptime origin. Called once at boot.
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": STARTED_AT.elapsed().as_secs(),
    }))
}
