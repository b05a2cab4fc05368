//! HTTP handlers for alert endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::{AlertCondition, AlertEvent, AlertPreset, AlertRule, Location, MetricKind, Operator};

use super::{resolve_location, LocationQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, OptionalUser};
use crate::services::alerts::Advisory;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AdvisoriesResponse {
    pub location: Location,
    pub advisories: Vec<Advisory>,
}

/// Subscribe to a predefined alert
#[derive(Debug, Deserialize)]
pub struct SubscribeAlertInput {
    pub alert_type: AlertPreset,
    #[serde(flatten)]
    pub location: LocationQuery,
}

#[derive(Debug, Deserialize)]
pub struct CancelAlertInput {
    pub rule_id: Uuid,
}

/// Subscribe to a user-defined condition
#[derive(Debug, Deserialize)]
pub struct CustomAlertInput {
    pub metric: String,
    pub operator: String,
    pub threshold: f64,
    #[serde(flatten)]
    pub location: LocationQuery,
}

impl CustomAlertInput {
    fn condition(&self) -> AppResult<AlertCondition> {
        let metric: MetricKind = self
            .metric
            .parse()
            .map_err(|e: shared::ParseError| AppError::validation("metric", e.to_string()))?;
        let operator: Operator = self
            .operator
            .parse()
            .map_err(|e: shared::ParseError| AppError::validation("operator", e.to_string()))?;
        Ok(AlertCondition::new(metric, operator, self.threshold))
    }
}

/// Presets the current conditions satisfy
pub async fn get_weather_alerts(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<AdvisoriesResponse>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    let advisories = state.alerts.advisories(&location).await?;
    Ok(Json(AdvisoriesResponse {
        location,
        advisories,
    }))
}

/// Subscribe to a predefined alert
pub async fn subscribe_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SubscribeAlertInput>,
) -> AppResult<(StatusCode, Json<AlertRule>)> {
    let user = current_user.0;
    let location = resolve_location(&state, &input.location, Some(&user)).await?;
    let rule = state
        .alerts
        .subscribe_preset(&user.user_id, location, input.alert_type)
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Cancel one of the caller's subscriptions
pub async fn cancel_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CancelAlertInput>,
) -> AppResult<Json<AlertRule>> {
    let rule = state
        .alerts
        .cancel(&current_user.0.user_id, input.rule_id, Utc::now())
        .await?;
    Ok(Json(rule))
}

/// Subscribe to a custom condition
pub async fn create_custom_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CustomAlertInput>,
) -> AppResult<(StatusCode, Json<AlertRule>)> {
    let user = current_user.0;
    let condition = input.condition()?;
    let location = resolve_location(&state, &input.location, Some(&user)).await?;
    let rule = state
        .alerts
        .subscribe_custom(&user.user_id, location, condition)
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Alert events sent to the caller, newest first
pub async fn list_alert_events(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<AlertEvent>>> {
    Ok(Json(state.alerts.events_for_user(&current_user.0.user_id).await))
}
