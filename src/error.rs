//! Error types for the outage map service.
//!
//! Only the adapter and the analytics layer produce these. The cache absorbs
//! adapter errors into its fallback chain, so HTTP handlers never see a
//! remote-fetch failure.

use thiserror::Error;

/// Errors raised while fetching, decoding or aggregating outage data.
#[derive(Debug, Error)]
pub enum OutageError {
    /// Error parsing JSON data.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Error making HTTP requests to the feature service.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The configured feature service URL could not be parsed.
    #[error("Invalid feature service URL: {0}")]
    InvalidUrl(String),

    /// The feature service answered with something other than a feature set,
    /// e.g. an ArcGIS `{"error": {...}}` envelope or a non-2xx status.
    #[error("Invalid API response: {0}")]
    InvalidApiResponse(String),

    /// Neither the full query nor any of the tiled queries returned a feature.
    #[error("feature service returned no features")]
    NoFeatures,

    /// Error while aggregating statistics with polars.
    #[error("Analytics error: {0}")]
    Analytics(#[from] polars::prelude::PolarsError),
}
