//! OpenWeatherMap adapter
//!
//! Current conditions from `/weather`; daily values are collapsed from the
//! 5-day / 3-hour `/forecast` list. The free API has no history.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use shared::{units, DataKind, Location, MetricValues, Reading, TimeBucket};

use super::{get_json, mean, FetchRequest, WeatherProvider};
use crate::config::KeyedProviderConfig;
use crate::error::ProviderError;

const PROVIDER_ID: &str = "openweathermap";

/// OpenWeatherMap provider
#[derive(Clone)]
pub struct OpenWeatherMapProvider {
    client: Client,
    api_key: String,
    base_url: String,
    weight: f64,
}

/// OpenWeatherMap API response for current weather
#[derive(Debug, Deserialize)]
struct OWMCurrentResponse {
    main: OWMMain,
    wind: OWMWind,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct OWMMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OWMWind {
    /// m/s with metric units
    speed: f64,
}

/// OpenWeatherMap API response for forecast
#[derive(Debug, Deserialize)]
struct OWMForecastResponse {
    list: Vec<OWMForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OWMForecastItem {
    dt: i64,
    main: OWMMain,
    wind: OWMWind,
    /// Probability of precipitation (0-1)
    #[serde(default)]
    pop: f64,
}

impl OpenWeatherMapProvider {
    pub fn new(client: Client, config: &KeyedProviderConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            weight: config.weight,
        }
    }

    /// Create a provider with custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            weight: 1.0,
        }
    }

    fn endpoint(&self, path: &str, location: &Location) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{}", self.base_url, path))
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
    }

    async fn fetch_current(&self, location: &Location) -> Result<Reading, ProviderError> {
        let data: OWMCurrentResponse = get_json(self.endpoint("weather", location)).await?;
        let (reported_at, values) = convert_current_response(data)?;
        Ok(self.reading(location, DataKind::Current, TimeBucket::Live, reported_at, values))
    }

    async fn fetch_forecast_day(
        &self,
        location: &Location,
        date: NaiveDate,
    ) -> Result<Reading, ProviderError> {
        let data: OWMForecastResponse = get_json(self.endpoint("forecast", location)).await?;
        let (reported_at, values) = collapse_forecast_day(&data, date)?;
        Ok(self.reading(
            location,
            DataKind::Forecast,
            TimeBucket::Day(date),
            reported_at,
            values,
        ))
    }

    fn reading(
        &self,
        location: &Location,
        kind: DataKind,
        bucket: TimeBucket,
        reported_at: DateTime<Utc>,
        values: MetricValues,
    ) -> Reading {
        Reading {
            location: location.clone(),
            kind,
            bucket,
            provider_id: PROVIDER_ID.to_string(),
            reported_at,
            values,
            weight: self.weight,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn fetch(
        &self,
        location: &Location,
        request: &FetchRequest,
    ) -> Result<Reading, ProviderError> {
        match (request.kind, request.bucket) {
            (DataKind::Current, _) => self.fetch_current(location).await,
            (DataKind::Forecast, TimeBucket::Day(date)) => {
                self.fetch_forecast_day(location, date).await
            }
            (kind, _) => Err(ProviderError::Unsupported(kind)),
        }
    }
}

fn timestamp(dt: i64) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::from_timestamp(dt, 0)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("timestamp {}", dt)))
}

/// Convert OpenWeatherMap current response to canonical values
fn convert_current_response(
    data: OWMCurrentResponse,
) -> Result<(DateTime<Utc>, MetricValues), ProviderError> {
    let values = MetricValues {
        temperature_c: Some(data.main.temp),
        precipitation_probability: None,
        wind_speed_kph: Some(units::mps_to_kph(data.wind.speed)),
        humidity_percent: Some(data.main.humidity),
    };
    Ok((timestamp(data.dt)?, values))
}

/// Collapse the 3-hour slots of one UTC day into a daily reading
fn collapse_forecast_day(
    data: &OWMForecastResponse,
    date: NaiveDate,
) -> Result<(DateTime<Utc>, MetricValues), ProviderError> {
    let mut slots = Vec::new();
    for item in &data.list {
        let at = timestamp(item.dt)?;
        if at.date_naive() == date {
            slots.push((at, item));
        }
    }
    let first = slots.first().map(|(at, _)| *at).ok_or(ProviderError::NoData)?;

    let values = MetricValues {
        temperature_c: mean(slots.iter().map(|(_, i)| i.main.temp)),
        precipitation_probability: slots
            .iter()
            .map(|(_, i)| units::fraction_to_percent(i.pop))
            .reduce(f64::max),
        wind_speed_kph: slots
            .iter()
            .map(|(_, i)| units::mps_to_kph(i.wind.speed))
            .reduce(f64::max),
        humidity_percent: mean(slots.iter().map(|(_, i)| i.main.humidity)),
    };
    Ok((first, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_current_units() {
        let data: OWMCurrentResponse = serde_json::from_str(
            r#"{"main":{"temp":21.5,"humidity":55},"wind":{"speed":5.0},"dt":1717243200}"#,
        )
        .unwrap();
        let (at, values) = convert_current_response(data).unwrap();
        assert_eq!(at.timestamp(), 1717243200);
        assert_eq!(values.temperature_c, Some(21.5));
        assert_eq!(values.wind_speed_kph, Some(18.0));
        assert_eq!(values.humidity_percent, Some(55.0));
        assert_eq!(values.precipitation_probability, None);
    }

    #[test]
    fn test_collapse_forecast_day() {
        // 2024-06-01 00:00, 03:00 UTC and 2024-06-02 00:00 UTC
        let data: OWMForecastResponse = serde_json::from_str(
            r#"{"list":[
                {"dt":1717200000,"main":{"temp":18.0,"humidity":60},"wind":{"speed":2.0},"pop":0.2},
                {"dt":1717210800,"main":{"temp":22.0,"humidity":50},"wind":{"speed":4.0},"pop":0.65},
                {"dt":1717286400,"main":{"temp":30.0,"humidity":40},"wind":{"speed":1.0},"pop":0.0}
            ]}"#,
        )
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (_, values) = collapse_forecast_day(&data, date).unwrap();
        assert_eq!(values.temperature_c, Some(20.0));
        assert_eq!(values.humidity_percent, Some(55.0));
        assert!((values.precipitation_probability.unwrap() - 65.0).abs() < 1e-9);
        assert!((values.wind_speed_kph.unwrap() - 14.4).abs() < 1e-9);

        let missing = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        assert_eq!(
            collapse_forecast_day(&data, missing).unwrap_err(),
            ProviderError::NoData
        );
    }
}
