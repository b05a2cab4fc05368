//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::services::CacheStats;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<String>,
    pub cache: CacheStats,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = state.aggregation.provider_ids();
    let status = if providers.is_empty() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers,
        cache: state.aggregation.cache_stats().await,
    })
}
