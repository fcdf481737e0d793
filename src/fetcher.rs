//! Feature service adapter: queries the Enel power-cut layer and turns its
//! features into [`Outage`] records.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::normalize_feature;
use crate::error::OutageError;
use crate::geo::{Envelope, ITALY_TILES};
use crate::models::{Feature, FeatureSet, Outage};

/// Default query endpoint of the Enel power-cut map layer.
pub const DEFAULT_QUERY_URL: &str = "https://ineuportalgis.enel.com/server/rest/services/Hosted/ITA_power_cut_map_layer_View/FeatureServer/0/query";

const REFERER_URL: &str = "https://ineuportalgis.enel.com/portal/apps/instant/media/index.html?appid=7d832c0db96c4bfe9cf9ca7b7782f200";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// Source of outage records.
///
/// The cache only depends on this trait, so tests can swap the remote
/// service for an in-memory source.
#[async_trait]
pub trait OutageSource: Send + Sync {
    /// Fetches and normalizes the current outages.
    ///
    /// # Errors
    ///
    /// Returns [`OutageError::NoFeatures`] when the source has nothing to
    /// offer, or another variant when it cannot be reached at all.
    async fn fetch_outages(&self) -> Result<Vec<Outage>, OutageError>;
}

/// ArcGIS `FeatureServer` client for the Enel outage layer.
#[derive(Debug, Clone)]
pub struct EnelFeatureService {
    client: reqwest::Client,
    query_url: Url,
    /// Pause between consecutive tile queries, to stay under rate limits.
    tile_delay: Duration,
}

impl EnelFeatureService {
    /// Builds a client for the given query endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// constructed.
    pub fn new(query_url: &str, tile_delay: Duration) -> Result<Self, OutageError> {
        let query_url =
            Url::parse(query_url).map_err(|e| OutageError::InvalidUrl(format!("{query_url}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("it-IT,it;q=0.6"));
        headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            query_url,
            tile_delay,
        })
    }

    /// Unbounded `where=1=1` query over the whole layer.
    async fn query_all(&self) -> Result<Vec<Feature>, OutageError> {
        self.query(&[
            ("f", "json"),
            ("where", "1=1"),
            ("outFields", "*"),
            ("returnGeometry", "true"),
            ("resultRecordCount", "1000"),
        ])
        .await
    }

    /// Envelope-filtered query, geometry returned in Web Mercator.
    async fn query_tile(&self, tile: &Envelope) -> Result<Vec<Feature>, OutageError> {
        let geometry = tile.to_esri_geometry().to_string();
        self.query(&[
            ("f", "json"),
            ("geometry", geometry.as_str()),
            ("geometryType", "esriGeometryEnvelope"),
            ("maxRecordCountFactor", "3"),
            ("orderByFields", "objectid1 ASC"),
            ("outFields", "*"),
            ("outSR", "102100"),
            ("returnGeometry", "true"),
            ("spatialRel", "esriSpatialRelIntersects"),
            ("where", "1=1"),
        ])
        .await
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Vec<Feature>, OutageError> {
        let url = Url::parse_with_params(self.query_url.as_str(), params)
            .map_err(|e| OutageError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OutageError::InvalidApiResponse(format!("HTTP {status}")));
        }

        let body = response.text().await?;
        let set: FeatureSet = serde_json::from_str(&body)?;
        if let Some(error) = set.error {
            return Err(OutageError::InvalidApiResponse(error.to_string()));
        }
        Ok(set.features)
    }

    /// Full query first; the six tiles only if it came back empty.
    async fn collect_features(&self) -> Vec<Feature> {
        info!("Querying all features from {}", self.query_url);
        match self.query_all().await {
            Ok(features) if !features.is_empty() => {
                info!("Full query returned {} features", features.len());
                return features;
            }
            Ok(_) => info!("Full query returned no features, trying tiled queries"),
            Err(e) => warn!("Full query failed, trying tiled queries: {}", e),
        }

        let mut features = Vec::new();
        for (i, tile) in ITALY_TILES.iter().enumerate() {
            if i > 0 && !self.tile_delay.is_zero() {
                tokio::time::sleep(self.tile_delay).await;
            }
            debug!("Tile query {}/{} ({})", i + 1, ITALY_TILES.len(), tile.name);
            match self.query_tile(tile).await {
                Ok(found) => {
                    if !found.is_empty() {
                        info!("Tile '{}' returned {} features", tile.name, found.len());
                    }
                    features.extend(found);
                }
                Err(e) => warn!("Tile '{}' query failed: {}", tile.name, e),
            }
        }
        features
    }
}

#[async_trait]
impl OutageSource for EnelFeatureService {
    async fn fetch_outages(&self) -> Result<Vec<Outage>, OutageError> {
        let features = self.collect_features().await;
        if features.is_empty() {
            return Err(OutageError::NoFeatures);
        }

        let now = Utc::now();
        let outages: Vec<Outage> = features
            .iter()
            .enumerate()
            .map(|(i, feature)| normalize_feature(feature, i, now))
            .collect();
        info!("Normalized {} outages", outages.len());
        Ok(outages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn service(server: &MockServer) -> EnelFeatureService {
        EnelFeatureService::new(&server.url("/FeatureServer/0/query"), Duration::ZERO).unwrap()
    }

    fn feature_set(ids: &[i64]) -> serde_json::Value {
        let features: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "attributes": {
                        "objectid1": id,
                        "descrizione_territoriale": "CS-RENDE",
                        "provincia": "Cosenza",
                        "regione": "Calabria",
                        "num_cli_disalim": 10,
                        "causa_disalimentazione": "Guasto",
                    },
                    "geometry": { "x": 1_809_420.4, "y": 4_764_534.2 }
                })
            })
            .collect();
        json!({ "features": features })
    }

    #[tokio::test]
    async fn test_full_query_skips_tiles() {
        let server = MockServer::start_async().await;
        let full = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/FeatureServer/0/query")
                    .query_param("where", "1=1")
                    .query_param("resultRecordCount", "1000");
                then.status(200).json_body(feature_set(&[1, 2]));
            })
            .await;
        let tiles = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/FeatureServer/0/query")
                    .query_param_exists("geometry");
                then.status(200).json_body(json!({ "features": [] }));
            })
            .await;

        let outages = service(&server).fetch_outages().await.unwrap();

        assert_eq!(outages.len(), 2);
        assert_eq!(outages[0].id, "enel-real-1");
        assert_eq!(outages[0].municipality, "RENDE");
        full.assert_hits_async(1).await;
        tiles.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_empty_full_query_falls_back_to_tiles() {
        let server = MockServer::start_async().await;
        let full = server
            .mock_async(|when, then| {
                when.method(GET).query_param("resultRecordCount", "1000");
                then.status(200).json_body(json!({ "features": [] }));
            })
            .await;
        let tiles = server
            .mock_async(|when, then| {
                when.method(GET)
                    .query_param_exists("geometry")
                    .query_param("outSR", "102100");
                then.status(200).json_body(feature_set(&[7]));
            })
            .await;

        let outages = service(&server).fetch_outages().await.unwrap();

        full.assert_hits_async(1).await;
        tiles.assert_hits_async(6).await;
        assert_eq!(outages.len(), 6);
        assert!(outages.iter().all(|o| o.id == "enel-real-7"));
    }

    #[tokio::test]
    async fn test_failed_full_query_falls_back_to_tiles() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).query_param("resultRecordCount", "1000");
                then.status(500).body("boom");
            })
            .await;
        let tiles = server
            .mock_async(|when, then| {
                when.method(GET).query_param_exists("geometry");
                then.status(200)
                    .json_body(json!({ "error": { "code": 400, "message": "bad" } }));
            })
            .await;

        let result = service(&server).fetch_outages().await;

        tiles.assert_hits_async(6).await;
        assert!(matches!(result, Err(OutageError::NoFeatures)));
    }

    #[tokio::test]
    async fn test_tile_queries_are_spaced_by_delay() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).query_param("resultRecordCount", "1000");
                then.status(200).json_body(json!({ "features": [] }));
            })
            .await;
        let tiles = server
            .mock_async(|when, then| {
                when.method(GET).query_param_exists("geometry");
                then.status(200).json_body(feature_set(&[3]));
            })
            .await;
        let delay = Duration::from_millis(20);
        let service =
            EnelFeatureService::new(&server.url("/FeatureServer/0/query"), delay).unwrap();

        let started = std::time::Instant::now();
        let outages = service.fetch_outages().await.unwrap();

        assert!(started.elapsed() >= delay * 5);
        tiles.assert_hits_async(6).await;
        assert_eq!(outages.len(), 6);
    }

    #[tokio::test]
    async fn test_no_features_anywhere() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({ "features": [] }));
            })
            .await;

        let result = service(&server).fetch_outages().await;
        assert!(matches!(result, Err(OutageError::NoFeatures)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = EnelFeatureService::new("not a url", Duration::ZERO);
        assert!(matches!(result, Err(OutageError::InvalidUrl(_))));
    }
}
