//! Route definitions for the Weather Aggregator

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/weather", weather_routes())
}

/// Weather routes; handlers that need a login take `CurrentUser`
fn weather_routes() -> Router<AppState> {
    Router::new()
        // Conditions and forecasts
        .route("/current", get(handlers::get_current_weather))
        .route("/real-time", get(handlers::get_realtime_weather))
        .route("/forecast", get(handlers::get_forecast))
        .route("/forecast/detailed", get(handlers::get_detailed_forecast))
        .route("/next-7-days", get(handlers::get_next_seven_days))
        .route("/historical", get(handlers::get_historical_weather))
        .route("/climate", get(handlers::get_climate))
        .route("/seasonal-changes", get(handlers::get_seasonal_changes))
        .route(
            "/prediction-confidence",
            get(handlers::get_prediction_confidence),
        )
        // Multi-location views
        .route("/compare", get(handlers::compare_locations))
        .route("/trending", get(handlers::get_trending_locations))
        // Alerts
        .nest("/alert", alert_routes())
        .route("/alerts", get(handlers::get_weather_alerts))
        .route("/custom-alert", post(handlers::create_custom_alert))
        // Personalization
        .route(
            "/preferences",
            get(handlers::get_preferences).post(handlers::update_preferences),
        )
        .route(
            "/suggested-activities",
            get(handlers::get_suggested_activities),
        )
        .route("/recommendation", get(handlers::get_recommendation))
        .route("/update-location", put(handlers::update_location))
        .route("/feedback", post(handlers::submit_feedback))
        .route("/feedback/summary", get(handlers::get_feedback_summary))
}

/// Alert subscription routes (authenticated)
fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(handlers::subscribe_alert))
        .route("/cancel", delete(handlers::cancel_alert))
        .route("/events", get(handlers::list_alert_events))
}
