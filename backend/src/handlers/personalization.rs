//! HTTP handlers for user preferences, suggestions and feedback

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use shared::{Location, MetricKind};

use super::{resolve_location, resolve_place, LocationQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, OptionalUser};
use crate::services::profile::{
    clothing_recommendation, suggested_activities, Feedback, FeedbackSummary, SearchEntry,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub preferences: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_location: Option<Location>,
    pub recent_searches: Vec<SearchEntry>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub location: Location,
    pub temperature_c: f64,
    pub activities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub location: Location,
    pub temperature_c: f64,
    pub recommendation: &'static str,
}

/// New home location: a place name or coordinates
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationInput {
    #[validate(length(min = 1, max = 200, message = "Location must be 1 to 200 characters"))]
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

async fn current_temperature(state: &AppState, location: &Location) -> AppResult<f64> {
    state
        .aggregation
        .current_consensus(location)
        .await?
        .value(MetricKind::Temperature)
        .ok_or(AppError::InsufficientData)
}

/// Stored preferences with home location and search history
pub async fn get_preferences(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<PreferencesResponse>> {
    let user_id = &current_user.0.user_id;
    Ok(Json(PreferencesResponse {
        preferences: state.profiles.preferences(user_id).await,
        home_location: state.profiles.home_location(user_id).await,
        recent_searches: state.profiles.top_searches(user_id).await,
    }))
}

/// Merge preference updates; `null` values remove keys
pub async fn update_preferences(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(updates): Json<Value>,
) -> AppResult<Json<Value>> {
    let preferences = state
        .profiles
        .update_preferences(&current_user.0.user_id, updates)
        .await?;
    Ok(Json(preferences))
}

/// Activities suited to the current temperature
pub async fn get_suggested_activities(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<ActivitiesResponse>> {
    let location = resolve_location(&state, &query, user.as_ref()).await?;
    let temperature_c = current_temperature(&state, &location).await?;
    Ok(Json(ActivitiesResponse {
        activities: suggested_activities(temperature_c).to_vec(),
        location,
        temperature_c,
    }))
}

/// Clothing advice for the caller's location
pub async fn get_recommendation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let location = resolve_location(&state, &query, Some(&current_user.0)).await?;
    let temperature_c = current_temperature(&state, &location).await?;
    Ok(Json(RecommendationResponse {
        recommendation: clothing_recommendation(temperature_c),
        location,
        temperature_c,
    }))
}

/// Set the caller's home location
pub async fn update_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateLocationInput>,
) -> AppResult<Json<Location>> {
    input.validate()?;
    let location = match (input.lat, input.lon, input.location.as_deref()) {
        (Some(lat), Some(lon), _) => {
            shared::validate_coordinates(lat, lon)
                .map_err(|msg| AppError::validation("lat", msg))?;
            Location::new(lat, lon)
        }
        (None, None, Some(text)) if !text.trim().is_empty() => {
            resolve_place(&state, text.trim()).await?
        }
        _ => {
            return Err(AppError::validation(
                "location",
                "Provide a location name or both lat and lon",
            ))
        }
    };
    let location = state
        .profiles
        .set_home_location(&current_user.0.user_id, location)
        .await;
    tracing::info!(user_id = %current_user.0.user_id, location = %location.label(), "Home location updated");
    Ok(Json(location))
}

/// Submit app feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<FeedbackInput>,
) -> AppResult<(StatusCode, Json<Feedback>)> {
    input.validate()?;
    let feedback = state
        .profiles
        .submit_feedback(&current_user.0.user_id, input.rating, input.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// Average rating over all feedback
pub async fn get_feedback_summary(State(state): State<AppState>) -> Json<FeedbackSummary> {
    Json(state.profiles.feedback_summary().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_input_validation() {
        let ok = FeedbackInput {
            rating: 4,
            comment: Some("Accurate".into()),
        };
        assert!(ok.validate().is_ok());

        let bad = FeedbackInput {
            rating: 6,
            comment: None,
        };
        let err = AppError::from(bad.validate().unwrap_err());
        assert!(matches!(err, AppError::Validation { field, .. } if field == "rating"));
    }

    #[test]
    fn test_update_location_input_validation() {
        let input = UpdateLocationInput {
            location: Some(String::new()),
            lat: None,
            lon: None,
        };
        let err = AppError::from(input.validate().unwrap_err());
        assert!(matches!(err, AppError::Validation { field, .. } if field == "location"));
    }
}
