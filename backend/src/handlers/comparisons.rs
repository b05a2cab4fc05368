//! HTTP handlers for multi-location views

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use shared::MetricKind;

use super::resolve_place;
use crate::error::{AppError, AppResult};
use crate::services::aggregation::LocationComparison;
use crate::services::trending::TrendingLocation;
use crate::AppState;

/// Upper bound on locations in one comparison
pub const MAX_COMPARE_LOCATIONS: usize = 10;

/// Upper bound on the trending list size
pub const MAX_TRENDING_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    /// Place names or "lat,lon" pairs separated by `;`
    pub locations: String,
    pub metric: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricKind>,
    pub results: Vec<LocationComparison>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<usize>,
}

/// Current conditions side by side, in request order
pub async fn compare_locations(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> AppResult<Json<CompareResponse>> {
    let metric = query
        .metric
        .as_deref()
        .map(str::parse::<MetricKind>)
        .transpose()
        .map_err(|e| AppError::validation("metric", e.to_string()))?;

    let names = shared::split_locations(&query.locations);
    if names.is_empty() {
        return Err(AppError::validation(
            "locations",
            "At least one location is required",
        ));
    }
    if names.len() > MAX_COMPARE_LOCATIONS {
        return Err(AppError::validation(
            "locations",
            format!("At most {} locations can be compared", MAX_COMPARE_LOCATIONS),
        ));
    }

    let locations = try_join_all(names.iter().map(|name| resolve_place(&state, name))).await?;

    let results = state.aggregation.compare(&locations, metric).await;
    Ok(Json(CompareResponse { metric, results }))
}

/// Most requested locations in the trending window
pub async fn get_trending_locations(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> AppResult<Json<Vec<TrendingLocation>>> {
    if let Some(limit) = query.limit {
        if limit == 0 || limit > MAX_TRENDING_LIMIT {
            return Err(AppError::validation(
                "limit",
                format!("limit must be between 1 and {}", MAX_TRENDING_LIMIT),
            ));
        }
    }
    Ok(Json(state.aggregation.trending(query.limit, Utc::now()).await))
}
