//! garden-api - HTTP API server for garden.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use garden_api::handlers::health;
use garden_api::logging::init_tracing;
use garden_api::{build_router, AppState, Backends, Repositories};
use garden_core::{defaults, ChunkedEmbeddingBackend, EmbeddingBackend};
use garden_db::{log_pool_metrics, Database, PoolConfig};
use garden_inference::{ChunkedEmbedder, EmbeddingServiceBackend, OllamaBackend};
use garden_ingest::HttpFetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    health::mark_started();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    let backends = select_backends()?;
    let dimension = backends.embedding.dimension();

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env())
        .await?
        .with_embedding_dimension(dimension);
    db.migrate().await?;
    log_pool_metrics(db.pool());

    let state = AppState::new(Repositories::from_database(&db), backends);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    let drain = async {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(Duration::from_secs(defaults::SHUTDOWN_DRAIN_SECS)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        _ = drain => warn!(
            drain_secs = defaults::SHUTDOWN_DRAIN_SECS,
            "Drain window elapsed with requests still in flight"
        ),
    }
    db.pool().close().await;
    info!("Server stopped");

    Ok(())
}

/// Build inference backends from `EMBEDDING_BACKEND` (`ollama` or `service`).
fn select_backends() -> anyhow::Result<Backends> {
    let ollama = Arc::new(OllamaBackend::from_env());
    let choice = std::env::var("EMBEDDING_BACKEND").unwrap_or_else(|_| "ollama".to_string());

    let (embedding, chunked): (Arc<dyn EmbeddingBackend>, Arc<dyn ChunkedEmbeddingBackend>) =
        match choice.as_str() {
            "service" => {
                let service = Arc::new(EmbeddingServiceBackend::from_env()?);
                (service.clone(), service)
            }
            "ollama" => (
                ollama.clone(),
                Arc::new(ChunkedEmbedder::new(ollama.clone())),
            ),
            other => anyhow::bail!("Unknown EMBEDDING_BACKEND '{}': expected ollama or service", other),
        };
    info!(backend = %choice, dimension = embedding.dimension(), "Embedding backend selected");

    Ok(Backends {
        embedding,
        chunked,
        generation: ollama,
        fetcher: Arc::new(HttpFetcher::new()?),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
