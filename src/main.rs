use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod delivery;
mod download;
mod error;
mod fetch;
mod models;
mod qr;
mod scratch;
mod signal;
mod store;
#[cfg(test)]
mod testing;

use fetch::{Fetcher, HttpFetcher};
use models::AppConfig;
use scratch::ScratchClient;
use signal::{with_drain_deadline, ShutdownSignal};
use store::EphemeralStore;

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<EphemeralStore>,
    fetcher: Arc<dyn Fetcher>,
    scratch: Arc<ScratchClient>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<EphemeralStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        let scratch = Arc::new(ScratchClient::new(Arc::clone(&fetcher), &config));
        Self {
            config: Arc::new(config),
            store,
            fetcher,
            scratch,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .route("/health", get(health))
        .merge(download::routes())
        .merge(scratch::routes())
        .merge(qr::routes())
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolberry_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Clear artifacts orphaned by a previous run before accepting requests
    let store = Arc::new(EphemeralStore::new(&config.temp_dir));
    store.init().await?;

    let shutdown = ShutdownSignal::register();
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.max_redirects)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let grace = config.shutdown_grace;
    info!("Serving static files from {}", config.public_dir.display());

    let app = router(AppState::new(config, Arc::clone(&store), fetcher));

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            store.shutdown().await;
            return Err(e.into());
        }
    };
    info!("listening on {}", addr);

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().recv());
    let served = with_drain_deadline(serve.into_future(), shutdown, grace).await;

    store.shutdown().await;
    match served {
        Some(result) => result?,
        None => warn!("Connections still open after {:?}, stopped draining", grace),
    }

    info!("Server stopped");
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
