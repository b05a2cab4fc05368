//! Weather Aggregator - Backend Server

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_aggregator_backend::{
    create_app,
    external::{self, NominatimGeocoder},
    services::{AlertEvaluator, LogNotificationSink},
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "wxa_server=debug,weather_aggregator_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Weather Aggregator Server");
    tracing::info!("Environment: {}", config.environment);

    let client = external::http_client(&config.providers)?;
    let providers = external::build_providers(&client, &config.providers);
    if providers.is_empty() {
        anyhow::bail!("No weather providers are enabled");
    }

    let geocoder = Arc::new(NominatimGeocoder::new(
        client,
        config.providers.geocoder.base_url.clone(),
    ));
    let state = AppState::new(
        config.clone(),
        providers,
        geocoder,
        Arc::new(LogNotificationSink),
    );

    spawn_alert_scheduler(
        Arc::clone(&state.alerts),
        Duration::from_secs(config.alerts.tick_secs.max(1)),
    );

    // Build application
    let app = create_app(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Evaluate alert subscriptions on a fixed period
fn spawn_alert_scheduler(alerts: Arc<AlertEvaluator>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let report = alerts.tick(chrono::Utc::now()).await;
            tracing::debug!(
                evaluated = report.evaluated,
                triggered = report.triggered,
                "Alert scheduler tick"
            );
        }
    });
}
