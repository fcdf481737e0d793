use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tera::Context;
use tracing::error;

use crate::filters::OutageFilter;
use crate::models::Outage;
use crate::state::AppState;
use crate::stats::compute_stats;

/// Rows shown in the dashboard table.
const DASHBOARD_ROWS: usize = 200;

fn render_template(
    tera: &tera::Tera,
    template: &str,
    context: &Context,
) -> Result<Html<String>, (StatusCode, &'static str)> {
    tera.render(template, context).map(Html).map_err(|e| {
        error!("Template render error for '{}': {}", template, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Render error")
    })
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// GET / - Dashboard; the cards and the table both follow the filter.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OutageFilter>,
) -> Response {
    let now = Utc::now();
    let outages = state.cache.get_outages().await;
    let filtered: Vec<Outage> = filter.apply(&outages, now).into_iter().cloned().collect();

    let stats = match compute_stats(&filtered, now) {
        Ok(stats) => stats,
        Err(e) => {
            error!("Failed to compute dashboard stats: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Stats error").into_response();
        }
    };

    let mut context = Context::new();
    context.insert("stats", &stats);
    context.insert("total_filtered", &filtered.len());
    context.insert("outages", &filtered[..filtered.len().min(DASHBOARD_ROWS)]);
    for (key, value) in [
        ("status_filter", &filter.status),
        ("cause_filter", &filter.cause),
        ("duration_filter", &filter.duration),
        ("date_range_filter", &filter.date_range),
        ("zone_filter", &filter.zone),
        ("q", &filter.q),
    ] {
        context.insert(key, value.as_deref().unwrap_or_default());
    }
    context.insert("generated_at", &now.to_rfc3339());

    render_template(&state.tera, "dashboard.html", &context).into_response()
}

/// GET /api/outages - JSON outage list with optional filters.
pub async fn api_outages(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OutageFilter>,
) -> impl IntoResponse {
    let outages = state.cache.get_outages().await;
    Json(
        filter
            .apply(&outages, Utc::now())
            .into_iter()
            .cloned()
            .collect::<Vec<_>>(),
    )
}

/// GET /api/outages/{id} - A single outage.
pub async fn api_outage(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let outages = state.cache.get_outages().await;
    match outages.iter().find(|o| o.id == id) {
        Some(outage) => Json(outage).into_response(),
        None => message(StatusCode::NOT_FOUND, "Outage not found"),
    }
}

/// GET /api/stats - JSON statistics for the (optionally filtered) outages.
pub async fn api_stats(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OutageFilter>,
) -> Response {
    let now = Utc::now();
    let outages = state.cache.get_outages().await;
    let filtered: Vec<_> = filter.apply(&outages, now).into_iter().cloned().collect();
    match compute_stats(&filtered, now) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to compute stats: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to compute stats")
        }
    }
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "refreshing": state.cache.is_refreshing(),
    }))
}

/// GET /ping - liveness probe for external monitors.
pub async fn ping() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
