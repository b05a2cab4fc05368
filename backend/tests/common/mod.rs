//! Test doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::{AlertEvent, DataKind, Location, MetricValues, Reading};
use weather_aggregator_backend::error::{AppError, AppResult, ProviderError};
use weather_aggregator_backend::external::{FetchRequest, Geocoder, WeatherProvider};
use weather_aggregator_backend::services::NotificationSink;
use weather_aggregator_backend::{AppState, Config};

pub const OSLO: (f64, f64) = (59.91, 10.75);

pub fn oslo() -> Location {
    Location::named(OSLO.0, OSLO.1, "Oslo")
}

pub fn values(temperature_c: f64, precipitation: f64, wind_kph: f64, humidity: f64) -> MetricValues {
    MetricValues {
        temperature_c: Some(temperature_c),
        precipitation_probability: Some(precipitation),
        wind_speed_kph: Some(wind_kph),
        humidity_percent: Some(humidity),
    }
}

/// Provider answering from a fixed set of values
pub struct FakeProvider {
    id: String,
    weight: f64,
    values: Mutex<MetricValues>,
    delay: Option<Duration>,
    failure: Option<ProviderError>,
    unsupported: Vec<DataKind>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(id: &str, values: MetricValues) -> Self {
        Self {
            id: id.to_string(),
            weight: 1.0,
            values: Mutex::new(values),
            delay: None,
            failure: None,
            unsupported: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_temperature(id: &str, temperature_c: f64) -> Self {
        Self::new(id, values(temperature_c, 10.0, 12.0, 60.0))
    }

    pub fn failing(id: &str, failure: ProviderError) -> Self {
        let mut provider = Self::new(id, MetricValues::default());
        provider.failure = Some(failure);
        provider
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn without(mut self, kind: DataKind) -> Self {
        self.unsupported.push(kind);
        self
    }

    pub fn set_precipitation(&self, probability: f64) {
        self.values.lock().unwrap().precipitation_probability = Some(probability);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn fetch(&self, location: &Location, request: &FetchRequest) -> Result<Reading, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.unsupported.contains(&request.kind) {
            return Err(ProviderError::Unsupported(request.kind));
        }
        let values = self.values.lock().unwrap().clone();
        Ok(Reading {
            location: location.clone(),
            kind: request.kind,
            bucket: request.bucket,
            provider_id: self.id.clone(),
            reported_at: Utc::now(),
            values,
            weight: self.weight,
        })
    }
}

/// Geocoder over a fixed gazetteer
#[derive(Default)]
pub struct FakeGeocoder {
    places: HashMap<String, Location>,
}

impl FakeGeocoder {
    pub fn with_places(places: &[Location]) -> Self {
        Self {
            places: places
                .iter()
                .filter_map(|l| Some((l.name.clone()?.to_lowercase(), l.clone())))
                .collect(),
        }
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn resolve(&self, query: &str) -> AppResult<Location> {
        self.places
            .get(&query.to_lowercase())
            .cloned()
            .ok_or_else(|| AppError::LocationNotFound(query.to_string()))
    }
}

/// Sink that keeps every delivered event
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AlertEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &AlertEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.providers.timeout_secs = 5;
    config.auth.jwt_secret = "test-secret".to_string();
    config
}

pub fn as_providers(providers: &[Arc<FakeProvider>]) -> Vec<Arc<dyn WeatherProvider>> {
    providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn WeatherProvider>)
        .collect()
}

pub fn app_state(config: Config, providers: &[Arc<FakeProvider>]) -> (AppState, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let state = AppState::new(
        config,
        as_providers(providers),
        Arc::new(FakeGeocoder::with_places(&[oslo()])),
        Arc::clone(&sink) as Arc<dyn NotificationSink>,
    );
    (state, sink)
}
