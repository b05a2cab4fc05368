//! Weather Aggregator - Backend Server
//!
//! Queries several upstream weather providers in parallel, reconciles their
//! readings into a single consensus with a confidence score, caches the
//! result and evaluates user alert subscriptions against it.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;

use external::{Geocoder, WeatherProvider};
use services::{AggregationService, AlertEvaluator, NotificationSink, UserProfileService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregation: Arc<AggregationService>,
    pub alerts: Arc<AlertEvaluator>,
    pub profiles: Arc<UserProfileService>,
    pub geocoder: Arc<dyn Geocoder>,
}

impl AppState {
    /// Wire the services together around the given providers
    pub fn new(
        config: Config,
        providers: Vec<Arc<dyn WeatherProvider>>,
        geocoder: Arc<dyn Geocoder>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let aggregation = Arc::new(AggregationService::new(providers, &config));
        let alerts = Arc::new(AlertEvaluator::new(
            Arc::clone(&aggregation),
            sink,
            config.alerts.cooldown_secs,
        ));
        Self {
            config: Arc::new(config),
            aggregation,
            alerts,
            profiles: Arc::new(UserProfileService::new()),
            geocoder,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Weather Aggregator API v1.0"
}
