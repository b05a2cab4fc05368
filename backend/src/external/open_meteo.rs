//! Open-Meteo adapter
//!
//! Keyless API. Current conditions and daily forecasts come from the
//! forecast endpoint, past days from the archive endpoint.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use shared::{DataKind, Location, MetricValues, Reading, TimeBucket};

use super::{get_json, FetchRequest, WeatherProvider};
use crate::config::OpenMeteoConfig;
use crate::error::ProviderError;

const PROVIDER_ID: &str = "open-meteo";

const CURRENT_VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation_probability";
const FORECAST_DAILY: &str = "temperature_2m_max,temperature_2m_min,precipitation_probability_max,wind_speed_10m_max,relative_humidity_2m_mean";
const ARCHIVE_DAILY: &str =
    "temperature_2m_max,temperature_2m_min,precipitation_sum,wind_speed_10m_max,relative_humidity_2m_mean";

/// Measurable rain, in mm, for an archived day to count as wet
const WET_DAY_MM: f64 = 0.1;

#[derive(Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    base_url: String,
    archive_url: String,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    precipitation_probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
}

#[derive(Debug, Default, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
}

impl OpenMeteoProvider {
    pub fn new(client: Client, config: &OpenMeteoConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            archive_url: config.archive_url.trim_end_matches('/').to_string(),
            weight: config.weight,
        }
    }

    /// Create a provider against a custom base URL (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            archive_url: base_url.clone(),
            base_url,
            weight: 1.0,
        }
    }

    async fn fetch_current(&self, location: &Location) -> Result<Reading, ProviderError> {
        let request = self.client.get(format!("{}/forecast", self.base_url)).query(&[
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current", CURRENT_VARIABLES.to_string()),
            ("timezone", "UTC".to_string()),
        ]);
        let data: CurrentResponse = get_json(request).await?;

        let reported_at = parse_time(&data.current.time)?;
        let values = MetricValues {
            temperature_c: data.current.temperature_2m,
            precipitation_probability: data.current.precipitation_probability,
            wind_speed_kph: data.current.wind_speed_10m,
            humidity_percent: data.current.relative_humidity_2m,
        };
        if values.is_empty() {
            return Err(ProviderError::NoData);
        }

        Ok(self.reading(location, DataKind::Current, TimeBucket::Live, reported_at, values))
    }

    async fn fetch_day(
        &self,
        location: &Location,
        kind: DataKind,
        date: NaiveDate,
    ) -> Result<Reading, ProviderError> {
        let (url, daily) = match kind {
            DataKind::Historical => (format!("{}/archive", self.archive_url), ARCHIVE_DAILY),
            _ => (format!("{}/forecast", self.base_url), FORECAST_DAILY),
        };
        let day = date.format("%Y-%m-%d").to_string();
        let request = self.client.get(url).query(&[
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("daily", daily.to_string()),
            ("timezone", "UTC".to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ]);
        let data: DailyResponse = get_json(request).await?;

        let values = daily_values(&data.daily, date).ok_or(ProviderError::NoData)?;
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
impl WeatherProvider for OpenMeteoProvider {
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

fn parse_time(value: &str) -> Result<DateTime<Utc>, ProviderError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .map(|t| t.and_utc())
        .map_err(|e| ProviderError::MalformedResponse(format!("time '{}': {}", value, e)))
}

/// Canonical values for `date`, or `None` when the day is absent or empty
fn daily_values(daily: &DailyBlock, date: NaiveDate) -> Option<MetricValues> {
    let wanted = date.format("%Y-%m-%d").to_string();
    let idx = daily.time.iter().position(|t| *t == wanted)?;
    let at = |series: &Vec<Option<f64>>| series.get(idx).copied().flatten();

    let temperature_c = match (at(&daily.temperature_2m_max), at(&daily.temperature_2m_min)) {
        (Some(max), Some(min)) => Some((max + min) / 2.0),
        (max, min) => max.or(min),
    };
    let precipitation_probability = at(&daily.precipitation_probability_max).or_else(|| {
        at(&daily.precipitation_sum).map(|mm| if mm >= WET_DAY_MM { 100.0 } else { 0.0 })
    });

    let values = MetricValues {
        temperature_c,
        precipitation_probability,
        wind_speed_kph: at(&daily.wind_speed_10m_max),
        humidity_percent: at(&daily.relative_humidity_2m_mean),
    };
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> DailyBlock {
        DailyBlock {
            time: vec!["2024-06-01".into(), "2024-06-02".into()],
            temperature_2m_max: vec![Some(24.0), Some(30.0)],
            temperature_2m_min: vec![Some(14.0), None],
            precipitation_probability_max: vec![Some(40.0), Some(90.0)],
            precipitation_sum: vec![],
            wind_speed_10m_max: vec![Some(18.5), None],
            relative_humidity_2m_mean: vec![Some(61.0), Some(70.0)],
        }
    }

    #[test]
    fn test_daily_temperature_is_mean_of_extremes() {
        let values = daily_values(&block(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap();
        assert_eq!(values.temperature_c, Some(19.0));
        assert_eq!(values.precipitation_probability, Some(40.0));
        assert_eq!(values.wind_speed_kph, Some(18.5));
    }

    #[test]
    fn test_daily_partial_metrics() {
        let values = daily_values(&block(), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()).unwrap();
        assert_eq!(values.temperature_c, Some(30.0));
        assert_eq!(values.wind_speed_kph, None);
    }

    #[test]
    fn test_missing_day_is_none() {
        assert!(daily_values(&block(), NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()).is_none());
    }

    #[test]
    fn test_archive_precipitation_sum_to_probability() {
        let daily = DailyBlock {
            time: vec!["2023-01-10".into()],
            precipitation_sum: vec![Some(3.2)],
            ..Default::default()
        };
        let values = daily_values(&daily, NaiveDate::from_ymd_opt(2023, 1, 10).unwrap()).unwrap();
        assert_eq!(values.precipitation_probability, Some(100.0));
    }

    #[test]
    fn test_parse_time() {
        let t = parse_time("2024-06-01T12:15").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-01T12:15:00+00:00");
        assert!(matches!(
            parse_time("yesterday"),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
