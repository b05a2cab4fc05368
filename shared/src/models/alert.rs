//! Alert subscription models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::consensus::Consensus;
use super::location::Location;
use crate::types::{MetricKind, Operator};

/// Predicate over one metric of a consensus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    pub metric: MetricKind,
    pub operator: Operator,
    pub threshold: f64,
}

impl AlertCondition {
    pub fn new(metric: MetricKind, operator: Operator, threshold: f64) -> Self {
        Self {
            metric,
            operator,
            threshold,
        }
    }

    /// Observed value if the condition holds, `None` otherwise or when the
    /// consensus lacks the metric
    pub fn evaluate(&self, consensus: &Consensus) -> Option<f64> {
        let value = consensus.value(self.metric)?;
        self.operator.apply(value, self.threshold).then_some(value)
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}",
            self.metric,
            self.operator,
            self.threshold,
            self.metric.unit()
        )
    }
}

/// Predefined alert subscriptions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertPreset {
    ExtremeHeat,
    HighTemperature,
    LowTemperature,
    Cold,
    StrongWind,
    ExtremeWind,
    RainLikely,
    HeavyRain,
}

impl AlertPreset {
    pub const ALL: [AlertPreset; 8] = [
        AlertPreset::ExtremeHeat,
        AlertPreset::HighTemperature,
        AlertPreset::LowTemperature,
        AlertPreset::Cold,
        AlertPreset::StrongWind,
        AlertPreset::ExtremeWind,
        AlertPreset::RainLikely,
        AlertPreset::HeavyRain,
    ];

    pub fn condition(&self) -> AlertCondition {
        use MetricKind::*;
        use Operator::*;
        match self {
            AlertPreset::ExtremeHeat => AlertCondition::new(Temperature, GreaterThan, 35.0),
            AlertPreset::HighTemperature => AlertCondition::new(Temperature, GreaterThan, 30.0),
            AlertPreset::LowTemperature => AlertCondition::new(Temperature, LessThan, 5.0),
            AlertPreset::Cold => AlertCondition::new(Temperature, LessThan, 15.0),
            AlertPreset::StrongWind => AlertCondition::new(WindSpeed, GreaterThan, 40.0),
            AlertPreset::ExtremeWind => AlertCondition::new(WindSpeed, GreaterThan, 60.0),
            AlertPreset::RainLikely => {
                AlertCondition::new(PrecipitationProbability, GreaterOrEqual, 60.0)
            }
            AlertPreset::HeavyRain => {
                AlertCondition::new(PrecipitationProbability, GreaterOrEqual, 80.0)
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AlertPreset::ExtremeHeat => "Extreme heat warning (temperature above 35°C)",
            AlertPreset::HighTemperature => "High temperature warning (temperature above 30°C)",
            AlertPreset::LowTemperature => "Low temperature warning (temperature below 5°C)",
            AlertPreset::Cold => "Cold weather advisory (temperature below 15°C)",
            AlertPreset::StrongWind => "Strong winds warning (wind speed above 40 km/h)",
            AlertPreset::ExtremeWind => "Extreme winds warning (wind speed above 60 km/h)",
            AlertPreset::RainLikely => "Rain likely (precipitation probability 60% or more)",
            AlertPreset::HeavyRain => "Heavy rain warning (precipitation probability 80% or more)",
        }
    }
}

/// Lifecycle state of an alert rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertState {
    Active,
    Triggered { cooldown_until: DateTime<Utc> },
    Cancelled { cancelled_at: DateTime<Utc> },
}

/// A user's subscription to a condition at a location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub user_id: String,
    pub location: Location,
    pub condition: AlertCondition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<AlertPreset>,
    pub state: AlertState,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn new(
        user_id: impl Into<String>,
        location: Location,
        condition: AlertCondition,
        preset: Option<AlertPreset>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            location,
            condition,
            preset,
            state: AlertState::Active,
            created_at: Utc::now(),
        }
    }

    /// Subscribed, whether armed or cooling down
    pub fn is_active(&self) -> bool {
        !matches!(self.state, AlertState::Cancelled { .. })
    }

    pub fn describe(&self) -> String {
        match self.preset {
            Some(preset) => preset.description().to_string(),
            None => self.condition.to_string(),
        }
    }
}

/// Emitted when an armed rule's condition is satisfied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub user_id: String,
    pub location: Location,
    pub condition: AlertCondition,
    pub observed_value: f64,
    pub confidence: f64,
    /// `computed_at` of the consensus that satisfied the rule
    pub consensus_computed_at: DateTime<Utc>,
    pub triggered_at: DateTime<Utc>,
    pub delivered: bool,
    pub message: String,
}
