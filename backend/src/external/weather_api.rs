//! WeatherAPI.com adapter

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use shared::{DataKind, Location, MetricValues, Reading, TimeBucket};

use super::{get_json, FetchRequest, WeatherProvider};
use crate::config::KeyedProviderConfig;
use crate::error::ProviderError;

const PROVIDER_ID: &str = "weatherapi";

/// Furthest day `forecast.json` can return
const MAX_FORECAST_DAYS: i64 = 14;

#[derive(Clone)]
pub struct WeatherApiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    last_updated_epoch: i64,
    temp_c: Option<f64>,
    wind_kph: Option<f64>,
    humidity: Option<f64>,
}

/// Shape shared by `forecast.json` and `history.json`
#[derive(Debug, Deserialize)]
struct DaysResponse {
    forecast: ForecastBlock,
}

#[derive(Debug, Deserialize)]
struct ForecastBlock {
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    date: NaiveDate,
    day: DaySummary,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
    avgtemp_c: Option<f64>,
    maxwind_kph: Option<f64>,
    avghumidity: Option<f64>,
    daily_chance_of_rain: Option<f64>,
}

impl WeatherApiProvider {
    pub fn new(client: Client, config: &KeyedProviderConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            weight: config.weight,
        }
    }

    /// Create a provider against a custom base URL (for testing)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            weight,
        }
    }

    fn endpoint(&self, path: &str, location: &Location) -> reqwest::RequestBuilder {
        self.client.get(format!("{}/{}", self.base_url, path)).query(&[
            ("key", self.api_key.clone()),
            ("q", format!("{},{}", location.latitude, location.longitude)),
        ])
    }

    async fn fetch_current(&self, location: &Location) -> Result<Reading, ProviderError> {
        let data: CurrentResponse = get_json(self.endpoint("current.json", location)).await?;
        let reported_at = DateTime::from_timestamp(data.current.last_updated_epoch, 0)
            .ok_or_else(|| ProviderError::MalformedResponse("last_updated_epoch".into()))?;
        let values = MetricValues {
            temperature_c: data.current.temp_c,
            precipitation_probability: None,
            wind_speed_kph: data.current.wind_kph,
            humidity_percent: data.current.humidity,
        };
        Ok(self.reading(location, DataKind::Current, TimeBucket::Live, reported_at, values))
    }

    async fn fetch_day(
        &self,
        location: &Location,
        kind: DataKind,
        date: NaiveDate,
    ) -> Result<Reading, ProviderError> {
        let request = match kind {
            DataKind::Historical => self
                .endpoint("history.json", location)
                .query(&[("dt", date.format("%Y-%m-%d").to_string())]),
            _ => {
                let ahead = (date - Utc::now().date_naive()).num_days();
                if !(0..MAX_FORECAST_DAYS).contains(&ahead) {
                    return Err(ProviderError::NoData);
                }
                self.endpoint("forecast.json", location)
                    .query(&[("days", (ahead + 1).to_string())])
            }
        };
        let data: DaysResponse = get_json(request).await?;
        let values = day_values(&data, date).ok_or(ProviderError::NoData)?;
        Ok(self.reading(location, kind, TimeBucket::Day(date), Utc::now(), values))
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
impl WeatherProvider for WeatherApiProvider {
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
            (kind, TimeBucket::Day(date)) => self.fetch_day(location, kind, date).await,
            (kind, TimeBucket::Live) => Err(ProviderError::Unsupported(kind)),
        }
    }
}

fn day_values(data: &DaysResponse, date: NaiveDate) -> Option<MetricValues> {
    let day = &data.forecast.forecastday.iter().find(|d| d.date == date)?.day;
    let values = MetricValues {
        temperature_c: day.avgtemp_c,
        precipitation_probability: day.daily_chance_of_rain,
        wind_speed_kph: day.maxwind_kph,
        humidity_percent: day.avghumidity,
    };
    (!values.is_empty()).then_some(values)
}
