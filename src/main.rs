mod cache;
mod data;
mod dates;
mod error;
mod fetcher;
mod filters;
mod geo;
mod handlers;
mod models;
mod state;
mod stats;

use anyhow::Context as _;
use axum::{routing::get, Router};
use std::sync::Arc;
use tera::Tera;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cache::OutageCache;
use crate::fetcher::EnelFeatureService;
use crate::state::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("outage_map=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    info!("Starting with {:?}", config);

    let tera = Tera::new(&config.templates_glob).context("failed to parse templates")?;

    let source = EnelFeatureService::new(&config.feature_service_url, config.query_delay)?;
    let cache = OutageCache::new(Arc::new(source), config.cache_ttl);

    // Warm the cache in the background so the first request is fast.
    let preload = cache.clone();
    tokio::spawn(async move {
        let outages = preload.get_outages().await;
        info!("Preloaded {} outages", outages.len());
    });

    let scheduler = start_refresh_job(&config.refresh_cron, cache.clone()).await?;

    let state = Arc::new(AppState::new(tera, cache));
    let app = app(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    drop(scheduler);
    Ok(())
}

fn app(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/outages", get(handlers::api_outages))
        .route("/api/outages/{id}", get(handlers::api_outage))
        .route("/api/stats", get(handlers::api_stats))
        .route("/api/health", get(handlers::health))
        .route("/ping", get(handlers::ping))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Schedules a job that keeps the cache warm. The cache only hits the
/// feature service when its data is stale.
async fn start_refresh_job(cron: &str, cache: OutageCache) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_id, _scheduler| {
        let cache = cache.clone();
        Box::pin(async move {
            let outages = cache.get_outages().await;
            info!("Scheduled warm-up: {} outages available", outages.len());
        })
    })
    .map_err(|e| {
        error!("Invalid REFRESH_CRON '{}': {}", cron, e);
        e
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Cache warm-up scheduled with cron '{}'", cron);
    Ok(scheduler)
}
