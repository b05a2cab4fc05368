//! HTTP handlers for weather query endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared::{Consensus, Location, MetricKind};

use super::{resolve_location, LocationQuery};
use crate::error::AppResult;
use crate::middleware::OptionalUser;
use crate::services::aggregation::{
    ClimateSummary, PredictionConfidence, RealtimeWeather, SeasonalChange,
};
use crate::AppState;

/// Days in the weekly outlook
const WEEK_DAYS: u32 = 7;

/// Query parameters for forecast horizons
#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

/// Query parameters for historical lookups
#[derive(Debug, Deserialize)]
pub struct HistoricalQuery {
    pub date: NaiveDate,
}

/// One day of the summary forecast
#[derive(Debug, Serialize)]
pub struct ForecastDay {
    pub date: Option<NaiveDate>,
    pub temperature_c: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub wind_speed_kph: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub confidence: f64,
    pub low_confidence: bool,
}

impl From<&Consensus> for ForecastDay {
    fn from(consensus: &Consensus) -> Self {
        Self {
            date: consensus.bucket.date(),
            temperature_c: consensus.value(MetricKind::Temperature),
            precipitation_probability: consensus.value(MetricKind::PrecipitationProbability),
            wind_speed_kph: consensus.value(MetricKind::WindSpeed),
            humidity_percent: consensus.value(MetricKind::Humidity),
            confidence: consensus.overall_confidence(),
            low_confidence: consensus.has_low_confidence(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ForecastSummary {
    pub location: Location,
    pub days: Vec<ForecastDay>,
}

#[derive(Debug, Serialize)]
pub struct DetailedForecast {
    pub location: Location,
    pub days: Vec<Consensus>,
}

async fn forecast_summary(state: &AppState, location: Location, days: u32) -> AppResult<ForecastSummary> {
    let days = state.aggregation.forecast(&location, days).await?;
    Ok(ForecastSummary {
        days: days.iter().map(ForecastDay::from).collect(),
        location,
    })
}

/// Current consensus conditions
pub async fn get_current_weather(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<Consensus>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    let consensus = state
        .aggregation
        .current_weather(&location, Utc::now())
        .await?;
    Ok(Json(consensus))
}

/// Daily forecast summary
pub async fn get_forecast(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
    Query(days): Query<DaysQuery>,
) -> AppResult<Json<ForecastSummary>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    let days = days
        .days
        .unwrap_or(state.aggregation.forecast_limits().default_horizon_days);
    Ok(Json(forecast_summary(&state, location, days).await?))
}

/// Current conditions with the age of the consensus
pub async fn get_realtime_weather(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<RealtimeWeather>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    Ok(Json(state.aggregation.realtime(&location).await?))
}

/// Forecast summary for the coming week
pub async fn get_next_seven_days(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<ForecastSummary>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    Ok(Json(forecast_summary(&state, location, WEEK_DAYS).await?))
}

/// Full per-day consensus with per-metric confidence
pub async fn get_detailed_forecast(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
    Query(days): Query<DaysQuery>,
) -> AppResult<Json<DetailedForecast>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    let days = state
        .aggregation
        .detailed_forecast(&location, days.days)
        .await?;
    Ok(Json(DetailedForecast { location, days }))
}

/// Consensus for a past date
pub async fn get_historical_weather(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
    Query(historical): Query<HistoricalQuery>,
) -> AppResult<Json<Consensus>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    let consensus = state
        .aggregation
        .historical(&location, historical.date)
        .await?;
    Ok(Json(consensus))
}

/// Averages over the recent past
pub async fn get_climate(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<ClimateSummary>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    Ok(Json(state.aggregation.climate(&location).await?))
}

/// Today against the same day last year
pub async fn get_seasonal_changes(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<SeasonalChange>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    Ok(Json(state.aggregation.seasonal_changes(&location).await?))
}

/// Provider agreement over the forecast horizon
pub async fn get_prediction_confidence(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<PredictionConfidence>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    Ok(Json(state.aggregation.prediction_confidence(&location).await?))
}
