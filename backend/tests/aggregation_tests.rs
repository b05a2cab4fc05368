//! Aggregation service integration tests
//!
//! Tests for the fan-out and reconcile pipeline including:
//! - Consensus across agreeing and disagreeing providers
//! - Partial and total provider failure
//! - Forecast, historical and derived views

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use common::{as_providers, oslo, test_config, values, FakeProvider};
use shared::{ConfidenceLevel, DataKind, Location, MetricKind, TimeBucket};
use weather_aggregator_backend::error::{AppError, ProviderError};
use weather_aggregator_backend::services::AggregationService;

fn service(providers: &[Arc<FakeProvider>]) -> AggregationService {
    AggregationService::new(as_providers(providers), &test_config())
}

#[tokio::test]
async fn test_outlier_is_excluded_from_consensus() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 20.0)),
        Arc::new(FakeProvider::with_temperature("b", 21.0)),
        Arc::new(FakeProvider::with_temperature("c", 35.0)),
    ];
    let consensus = service(&providers).current_consensus(&oslo()).await.unwrap();

    let temperature = consensus.metric(MetricKind::Temperature).unwrap();
    assert!((temperature.value - 20.5).abs() < 1e-9);
    assert_eq!(temperature.outliers, vec!["c".to_string()]);
    assert_eq!(temperature.level, ConfidenceLevel::Reduced);
    assert_eq!(consensus.providers, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_repeated_current_query_is_served_from_cache() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 18.0)),
        Arc::new(FakeProvider::with_temperature("b", 18.4)),
    ];
    let service = service(&providers);

    let first = service.current_consensus(&oslo()).await.unwrap();
    let second = service.current_consensus(&oslo()).await.unwrap();

    assert_eq!(first, second);
    assert!(providers.iter().all(|p| p.calls() == 1));
    let stats = service.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.refreshes, 1);
}

#[tokio::test]
async fn test_nearby_coordinates_share_a_cache_entry() {
    let providers = [Arc::new(FakeProvider::with_temperature("a", 18.0))];
    let service = service(&providers);

    service.current_consensus(&Location::new(59.911, 10.751)).await.unwrap();
    service.current_consensus(&Location::new(59.909, 10.749)).await.unwrap();

    assert_eq!(providers[0].calls(), 1);
}

#[tokio::test]
async fn test_failed_provider_is_excluded() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 18.0)),
        Arc::new(FakeProvider::failing(
            "b",
            ProviderError::Unavailable("503".into()),
        )),
        Arc::new(FakeProvider::with_temperature("c", 19.0)),
    ];
    let consensus = service(&providers).current_consensus(&oslo()).await.unwrap();

    assert_eq!(consensus.providers, vec!["a", "c"]);
    assert_eq!(
        consensus.metric(MetricKind::Temperature).unwrap().contributors,
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_is_cut_off_by_timeout() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("fast", 18.0)),
        Arc::new(FakeProvider::with_temperature("slow", 18.0).slow(Duration::from_secs(30))),
    ];
    let consensus = service(&providers).current_consensus(&oslo()).await.unwrap();

    assert_eq!(consensus.providers, vec!["fast"]);
    assert_eq!(
        consensus.metric(MetricKind::Temperature).unwrap().level,
        ConfidenceLevel::Reduced
    );
}

#[tokio::test(start_paused = true)]
async fn test_all_providers_timing_out_is_unavailable() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 18.0).slow(Duration::from_secs(30))),
        Arc::new(FakeProvider::with_temperature("b", 18.0).slow(Duration::from_secs(60))),
    ];
    let service = service(&providers);

    let result = service.current_consensus(&oslo()).await;

    assert!(matches!(result, Err(AppError::AllProvidersUnavailable)));
    assert_eq!(service.cache_stats().await.entries, 0);
}

#[tokio::test]
async fn test_forecast_returns_one_day_per_horizon_day() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 12.0)),
        Arc::new(FakeProvider::with_temperature("b", 13.0)),
    ];
    let days = service(&providers).forecast(&oslo(), 7).await.unwrap();

    assert_eq!(days.len(), 7);
    let today = Utc::now().date_naive();
    for (offset, day) in days.iter().enumerate() {
        assert_eq!(day.kind, DataKind::Forecast);
        assert_eq!(
            day.bucket,
            TimeBucket::Day(today + ChronoDuration::days(offset as i64))
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_forecast_days_are_fetched_concurrently() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 12.0).slow(Duration::from_secs(1))),
        Arc::new(FakeProvider::with_temperature("b", 13.0).slow(Duration::from_secs(1))),
    ];
    let started = tokio::time::Instant::now();

    let days = service(&providers).forecast(&oslo(), 7).await.unwrap();

    assert_eq!(days.len(), 7);
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert!(providers.iter().all(|p| p.calls() == 7));
}

#[tokio::test]
async fn test_forecast_horizon_is_validated() {
    let providers = [Arc::new(FakeProvider::with_temperature("a", 12.0))];
    let service = service(&providers);

    for days in [0, 15, 20] {
        let result = service.forecast(&oslo(), days).await;
        assert!(matches!(result, Err(AppError::Validation { .. })), "days={}", days);
    }
    assert_eq!(providers[0].calls(), 0);
}

#[tokio::test]
async fn test_future_historical_date_has_no_data() {
    let providers = [Arc::new(FakeProvider::with_temperature("a", 12.0))];
    let service = service(&providers);
    let tomorrow = Utc::now().date_naive() + ChronoDuration::days(1);

    for date in [Utc::now().date_naive(), tomorrow] {
        let result = service.historical(&oslo(), date).await;
        assert!(matches!(result, Err(AppError::NoHistoricalData(_))));
    }
    assert_eq!(providers[0].calls(), 0);
}

#[tokio::test]
async fn test_historical_without_archive_support_has_no_data() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 12.0).without(DataKind::Historical)),
        Arc::new(FakeProvider::failing("b", ProviderError::NoData)),
    ];
    let yesterday = Utc::now().date_naive() - ChronoDuration::days(1);

    let result = service(&providers).historical(&oslo(), yesterday).await;

    assert!(matches!(result, Err(AppError::NoHistoricalData(_))));
}

#[tokio::test]
async fn test_historical_outage_is_unavailable() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 12.0).without(DataKind::Historical)),
        Arc::new(FakeProvider::failing("b", ProviderError::Timeout)),
    ];
    let yesterday = Utc::now().date_naive() - ChronoDuration::days(1);

    let result = service(&providers).historical(&oslo(), yesterday).await;

    assert!(matches!(result, Err(AppError::AllProvidersUnavailable)));
}

#[tokio::test]
async fn test_historical_consensus_for_past_day() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 4.0)),
        Arc::new(FakeProvider::with_temperature("b", 5.0)),
    ];
    let date = Utc::now().date_naive() - ChronoDuration::days(30);

    let consensus = service(&providers).historical(&oslo(), date).await.unwrap();

    assert_eq!(consensus.kind, DataKind::Historical);
    assert_eq!(consensus.bucket, TimeBucket::Day(date));
    assert_eq!(consensus.value(MetricKind::Temperature), Some(4.5));
}

#[tokio::test]
async fn test_compare_keeps_request_order() {
    let providers = [Arc::new(FakeProvider::new("a", values(25.0, 5.0, 8.0, 40.0)))];
    let service = service(&providers);
    let locations = [
        Location::named(41.9, 12.5, "Rome"),
        oslo(),
        Location::named(48.86, 2.35, "Paris"),
    ];

    let results = service
        .compare(&locations, Some(MetricKind::WindSpeed))
        .await;

    let names: Vec<_> = results
        .iter()
        .map(|r| r.location.name.clone().unwrap())
        .collect();
    assert_eq!(names, vec!["Rome", "Oslo", "Paris"]);
    assert!(results.iter().all(|r| r.value == Some(8.0) && r.error.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_compare_fetches_locations_concurrently() {
    let providers = [Arc::new(
        FakeProvider::new("a", values(25.0, 5.0, 8.0, 40.0)).slow(Duration::from_secs(1)),
    )];
    let service = service(&providers);
    let locations: Vec<Location> = (0..10).map(|i| Location::new(i as f64, 0.0)).collect();
    let started = tokio::time::Instant::now();

    let results = service.compare(&locations, Some(MetricKind::WindSpeed)).await;

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    let lats: Vec<f64> = results.iter().map(|r| r.location.latitude).collect();
    assert_eq!(lats, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    assert!(results.iter().all(|r| r.value == Some(8.0)));
}

#[tokio::test]
async fn test_compare_reports_failures_per_location() {
    let providers = [Arc::new(FakeProvider::failing(
        "a",
        ProviderError::Unavailable("down".into()),
    ))];
    let results = service(&providers).compare(&[oslo()], None).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].consensus.is_none());
    assert!(results[0].error.is_some());
}

#[tokio::test]
async fn test_current_weather_feeds_trending() {
    let providers = [Arc::new(FakeProvider::with_temperature("a", 10.0))];
    let service = service(&providers);
    let now = Utc::now();
    let rome = Location::named(41.9, 12.5, "Rome");

    service.current_weather(&oslo(), now).await.unwrap();
    service.current_weather(&rome, now).await.unwrap();
    service.current_weather(&rome, now).await.unwrap();
    service.current_consensus(&oslo()).await.unwrap();

    let trending = service.trending(None, now).await;
    assert_eq!(trending.len(), 2);
    assert_eq!(trending[0].location, rome);
    assert_eq!(trending[0].requests, 2);
    assert_eq!(trending[1].requests, 1);
}

#[tokio::test]
async fn test_prediction_confidence_of_agreeing_providers() {
    let providers = [
        Arc::new(FakeProvider::with_temperature("a", 15.0)),
        Arc::new(FakeProvider::with_temperature("b", 15.0)),
    ];
    let confidence = service(&providers)
        .prediction_confidence(&oslo())
        .await
        .unwrap();

    assert_eq!(confidence.days.len(), 7);
    assert_eq!(confidence.confidence_percent, 75.0);
}

#[tokio::test]
async fn test_seasonal_change_against_last_year() {
    let providers = [Arc::new(FakeProvider::with_temperature("a", 15.0))];
    let change = service(&providers).seasonal_changes(&oslo()).await.unwrap();

    assert_eq!(change.current_temperature_c, 15.0);
    assert_eq!(change.change_c, 0.0);
    assert!(change.last_year_date < Utc::now().date_naive());
}

#[tokio::test]
async fn test_climate_averages_the_window() {
    let providers = [Arc::new(FakeProvider::new("a", values(8.0, 40.0, 15.0, 70.0)))];
    let summary = service(&providers).climate(&oslo()).await.unwrap();

    assert_eq!(summary.days_covered, 30);
    assert_eq!(summary.mean_temperature_c, Some(8.0));
    assert_eq!(summary.mean_precipitation_probability, Some(40.0));
    assert!(summary.window_end < Utc::now().date_naive());
}
