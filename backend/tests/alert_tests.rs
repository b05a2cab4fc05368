//! Alert evaluator integration tests
//!
//! Tests for alert subscriptions including:
//! - Trigger, cooldown and re-arm across scheduler ticks
//! - Duplicate and ownership rules for subscribe and cancel

mod common;

use chrono::{Duration, Utc};
use std::sync::Arc;

use common::{app_state, oslo, test_config, values, FakeProvider};
use shared::{AlertCondition, AlertPreset, AlertState, Location, MetricKind, Operator};
use weather_aggregator_backend::error::{AppError, ProviderError};
use weather_aggregator_backend::Config;

/// Every tick sees fresh provider data
fn uncached_config() -> Config {
    let mut config = test_config();
    config.cache.current_ttl_secs = 0;
    config.alerts.cooldown_secs = 3600;
    config
}

fn rainy_provider(id: &str) -> Arc<FakeProvider> {
    Arc::new(FakeProvider::new(id, values(14.0, 85.0, 10.0, 90.0)))
}

#[tokio::test]
async fn test_heavy_rain_fires_once_per_cooldown() {
    let providers = [rainy_provider("a"), rainy_provider("b")];
    let (state, sink) = app_state(uncached_config(), &providers);
    let condition = AlertCondition::new(MetricKind::PrecipitationProbability, Operator::GreaterThan, 80.0);
    let rule = state
        .alerts
        .subscribe_custom("user-1", oslo(), condition)
        .await
        .unwrap();

    let t0 = Utc::now();
    let report = state.alerts.tick(t0).await;
    assert_eq!(report.triggered, 1);
    assert_eq!(sink.events().len(), 1);
    assert_eq!(sink.events()[0].observed_value, 85.0);
    assert!(matches!(
        state.alerts.rule(rule.id).await.unwrap().state,
        AlertState::Triggered { .. }
    ));

    // Condition persists inside the cooldown: nothing new
    let report = state.alerts.tick(t0 + Duration::minutes(10)).await;
    assert_eq!(report.evaluated, 0);
    assert_eq!(sink.events().len(), 1);

    // Cooldown over: re-armed, but not evaluated on the same tick
    let report = state.alerts.tick(t0 + Duration::minutes(61)).await;
    assert_eq!(report.rearmed, 1);
    assert_eq!(report.triggered, 0);
    assert_eq!(state.alerts.rule(rule.id).await.unwrap().state, AlertState::Active);

    let report = state.alerts.tick(t0 + Duration::minutes(62)).await;
    assert_eq!(report.triggered, 1);
    assert_eq!(sink.events().len(), 2);

    let events = state.alerts.events_for_user("user-1").await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.delivered && e.rule_id == rule.id));
    assert!(events[0].triggered_at > events[1].triggered_at);
}

#[tokio::test]
async fn test_rule_stays_active_while_condition_is_false() {
    let providers = [rainy_provider("a")];
    let (state, sink) = app_state(uncached_config(), &providers);
    providers[0].set_precipitation(30.0);
    let rule = state
        .alerts
        .subscribe_preset("user-1", oslo(), AlertPreset::HeavyRain)
        .await
        .unwrap();

    let report = state.alerts.tick(Utc::now()).await;
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.triggered, 0);
    assert!(sink.events().is_empty());

    providers[0].set_precipitation(80.0);
    let report = state.alerts.tick(Utc::now()).await;
    assert_eq!(report.triggered, 1);
    assert_eq!(sink.events()[0].rule_id, rule.id);
}

#[tokio::test]
async fn test_rules_sharing_a_location_use_one_snapshot() {
    let providers = [rainy_provider("a")];
    let (state, _sink) = app_state(uncached_config(), &providers);
    for preset in [AlertPreset::HeavyRain, AlertPreset::RainLikely, AlertPreset::Cold] {
        state
            .alerts
            .subscribe_preset("user-1", oslo(), preset)
            .await
            .unwrap();
    }

    let report = state.alerts.tick(Utc::now()).await;

    assert_eq!(report.evaluated, 3);
    assert_eq!(report.triggered, 3);
    assert_eq!(providers[0].calls(), 1);
}

#[tokio::test]
async fn test_provider_outage_skips_evaluation() {
    let providers = [Arc::new(FakeProvider::failing(
        "a",
        ProviderError::Unavailable("down".into()),
    ))];
    let (state, sink) = app_state(uncached_config(), &providers);
    let rule = state
        .alerts
        .subscribe_preset("user-1", oslo(), AlertPreset::HeavyRain)
        .await
        .unwrap();

    let report = state.alerts.tick(Utc::now()).await;

    assert_eq!(report.failed, 1);
    assert!(sink.events().is_empty());
    assert_eq!(state.alerts.rule(rule.id).await.unwrap().state, AlertState::Active);
}

#[tokio::test]
async fn test_duplicate_subscription_conflicts() {
    let providers = [rainy_provider("a")];
    let (state, _sink) = app_state(test_config(), &providers);

    let rule = state
        .alerts
        .subscribe_preset("user-1", oslo(), AlertPreset::StrongWind)
        .await
        .unwrap();
    let nearby = Location::new(59.911, 10.751);
    let duplicate = state
        .alerts
        .subscribe_preset("user-1", nearby.clone(), AlertPreset::StrongWind)
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    // Another user, or the same user after cancelling, may subscribe
    assert!(state
        .alerts
        .subscribe_preset("user-2", oslo(), AlertPreset::StrongWind)
        .await
        .is_ok());
    state.alerts.cancel("user-1", rule.id, Utc::now()).await.unwrap();
    assert!(state
        .alerts
        .subscribe_preset("user-1", nearby, AlertPreset::StrongWind)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_cancel_is_owner_only_and_final() {
    let providers = [rainy_provider("a")];
    let (state, sink) = app_state(uncached_config(), &providers);
    let rule = state
        .alerts
        .subscribe_preset("user-1", oslo(), AlertPreset::HeavyRain)
        .await
        .unwrap();

    let foreign = state.alerts.cancel("user-2", rule.id, Utc::now()).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    let cancelled = state.alerts.cancel("user-1", rule.id, Utc::now()).await.unwrap();
    assert!(matches!(cancelled.state, AlertState::Cancelled { .. }));

    let again = state.alerts.cancel("user-1", rule.id, Utc::now()).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    state.alerts.tick(Utc::now()).await;
    assert!(sink.events().is_empty());
    assert_eq!(state.alerts.rules_for_user("user-1").await.len(), 1);
}

#[tokio::test]
async fn test_custom_threshold_outside_metric_range() {
    let providers = [rainy_provider("a")];
    let (state, _sink) = app_state(test_config(), &providers);
    let condition = AlertCondition::new(MetricKind::Humidity, Operator::GreaterThan, 150.0);

    let result = state.alerts.subscribe_custom("user-1", oslo(), condition).await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_advisories_list_satisfied_presets() {
    let providers = [rainy_provider("a"), rainy_provider("b")];
    let (state, _sink) = app_state(test_config(), &providers);

    let advisories = state.alerts.advisories(&oslo()).await.unwrap();
    let presets: Vec<AlertPreset> = advisories.iter().map(|a| a.preset).collect();

    assert!(presets.contains(&AlertPreset::HeavyRain));
    assert!(presets.contains(&AlertPreset::RainLikely));
    assert!(presets.contains(&AlertPreset::Cold));
    assert!(!presets.contains(&AlertPreset::StrongWind));
}
