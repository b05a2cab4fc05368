//! Provider readings in the canonical schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::location::Location;
use crate::types::{DataKind, MetricKind, TimeBucket};

/// Metric values in canonical units.
///
/// A provider that cannot supply a metric leaves it unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_kph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_percent: Option<f64>,
}

impl MetricValues {
    pub fn get(&self, metric: MetricKind) -> Option<f64> {
        match metric {
            MetricKind::Temperature => self.temperature_c,
            MetricKind::PrecipitationProbability => self.precipitation_probability,
            MetricKind::WindSpeed => self.wind_speed_kph,
            MetricKind::Humidity => self.humidity_percent,
        }
    }

    pub fn set(&mut self, metric: MetricKind, value: Option<f64>) {
        match metric {
            MetricKind::Temperature => self.temperature_c = value,
            MetricKind::PrecipitationProbability => self.precipitation_probability = value,
            MetricKind::WindSpeed => self.wind_speed_kph = value,
            MetricKind::Humidity => self.humidity_percent = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        MetricKind::ALL.iter().all(|m| self.get(*m).is_none())
    }
}

/// A single provider's observation for a location and time bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub location: Location,
    pub kind: DataKind,
    pub bucket: TimeBucket,
    pub provider_id: String,
    /// When the provider produced the data
    pub reported_at: DateTime<Utc>,
    pub values: MetricValues,
    /// Static per-provider confidence weight
    pub weight: f64,
}

impl Reading {
    pub fn value(&self, metric: MetricKind) -> Option<f64> {
        self.values.get(metric)
    }
}

/// Unit conversions used by provider adapters
pub mod units {
    pub fn mps_to_kph(mps: f64) -> f64 {
        mps * 3.6
    }

    pub fn mph_to_kph(mph: f64) -> f64 {
        mph * 1.609_344
    }

    pub fn fahrenheit_to_celsius(f: f64) -> f64 {
        (f - 32.0) * 5.0 / 9.0
    }

    /// Fraction 0..1 to percent 0..100
    pub fn fraction_to_percent(fraction: f64) -> f64 {
        (fraction * 100.0).clamp(0.0, 100.0)
    }
}
