//! External API integrations
//!
//! Each upstream weather provider is adapted to the canonical [`Reading`]
//! schema behind the [`WeatherProvider`] trait. Adapters never cache.

pub mod geocode;
pub mod open_meteo;
pub mod open_weather_map;
pub mod weather_api;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use shared::{DataKind, Location, Reading, TimeBucket};

use crate::config::ProvidersConfig;
use crate::error::{AppError, AppResult, ProviderError};

pub use geocode::{Geocoder, NominatimGeocoder};
pub use open_meteo::OpenMeteoProvider;
pub use open_weather_map::OpenWeatherMapProvider;
pub use weather_api::WeatherApiProvider;

/// What a provider is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: DataKind,
    pub bucket: TimeBucket,
}

impl FetchRequest {
    pub fn current() -> Self {
        Self {
            kind: DataKind::Current,
            bucket: TimeBucket::Live,
        }
    }

    pub fn forecast(date: chrono::NaiveDate) -> Self {
        Self {
            kind: DataKind::Forecast,
            bucket: TimeBucket::Day(date),
        }
    }

    pub fn historical(date: chrono::NaiveDate) -> Self {
        Self {
            kind: DataKind::Historical,
            bucket: TimeBucket::Day(date),
        }
    }
}

/// One upstream weather source
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Stable identifier recorded on readings and consensus
    fn id(&self) -> &str;

    /// Static confidence weight attached to every reading
    fn weight(&self) -> f64;

    async fn fetch(
        &self,
        location: &Location,
        request: &FetchRequest,
    ) -> Result<Reading, ProviderError>;
}

/// Build the HTTP client shared by all adapters
pub fn http_client(config: &ProvidersConfig) -> AppResult<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))
}

/// Instantiate every enabled provider
pub fn build_providers(
    client: &Client,
    config: &ProvidersConfig,
) -> Vec<Arc<dyn WeatherProvider>> {
    let mut providers: Vec<Arc<dyn WeatherProvider>> = Vec::new();

    if config.open_meteo.enabled {
        providers.push(Arc::new(OpenMeteoProvider::new(
            client.clone(),
            &config.open_meteo,
        )));
    }
    if config.open_weather_map.enabled && !config.open_weather_map.api_key.is_empty() {
        providers.push(Arc::new(OpenWeatherMapProvider::new(
            client.clone(),
            &config.open_weather_map,
        )));
    }
    if config.weather_api.enabled && !config.weather_api.api_key.is_empty() {
        providers.push(Arc::new(WeatherApiProvider::new(
            client.clone(),
            &config.weather_api,
        )));
    }

    tracing::info!(
        providers = ?providers.iter().map(|p| p.id().to_string()).collect::<Vec<_>>(),
        "Weather providers registered"
    );
    providers
}

/// Send a request and decode its JSON body, classifying failures
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NoData);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Unavailable(format!("{} - {}", status, body)));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_mean() {
        assert_eq!(mean(vec![]), None);
        assert_eq!(mean(vec![1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn test_keyless_providers_are_skipped() {
        let mut config = Config::default().providers;
        config.open_weather_map.enabled = true;
        config.weather_api.enabled = true;
        config.weather_api.api_key = "secret".to_string();

        let client = Client::new();
        let providers = build_providers(&client, &config);
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["open-meteo", "weatherapi"]);
    }
}
