use std::env;
use std::str::FromStr;
use std::time::Duration;
use tera::Tera;

use crate::cache::OutageCache;
use crate::fetcher::DEFAULT_QUERY_URL;

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind_address: String,
    /// Cron expression for the cache warm-up job.
    pub refresh_cron: String,
    /// How long a fetched result set is served before refreshing.
    pub cache_ttl: Duration,
    /// ArcGIS query endpoint of the outage layer.
    pub feature_service_url: String,
    /// Pause between tiled queries.
    pub query_delay: Duration,
    /// Glob of the Tera templates.
    pub templates_glob: String,
    /// Directory served under `/static`.
    pub static_dir: String,
}

impl Config {
    /// Creates Config from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".into()),
            refresh_cron: env::var("REFRESH_CRON").unwrap_or_else(|_| "0 */5 * * * *".into()),
            cache_ttl: Duration::from_secs(env_or("CACHE_TTL_SECS", 300)),
            feature_service_url: env::var("FEATURE_SERVICE_URL")
                .unwrap_or_else(|_| DEFAULT_QUERY_URL.into()),
            query_delay: Duration::from_millis(env_or("QUERY_DELAY_MS", 150)),
            templates_glob: env::var("TEMPLATES_GLOB")
                .unwrap_or_else(|_| "templates/**/*.html".into()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "public".into()),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Shared application state passed to all request handlers.
pub struct AppState {
    /// Template engine for rendering HTML pages.
    pub tera: Tera,
    /// Outage cache in front of the feature service.
    pub cache: OutageCache,
}

impl AppState {
    pub fn new(tera: Tera, cache: OutageCache) -> Self {
        Self { tera, cache }
    }
}
