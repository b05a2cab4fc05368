//! Validation utilities for the Weather Aggregator

use chrono::NaiveDate;

use crate::types::MetricKind;

// ============================================================================
// Location Validations
// ============================================================================

/// Validate latitude/longitude are on the globe
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), &'static str> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err("Coordinates must be finite numbers");
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Parse a "lat,lon" pair; `None` when the text is not a coordinate pair
pub fn parse_coordinate_pair(text: &str) -> Option<(f64, f64)> {
    let (lat, lon) = text.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    validate_coordinates(lat, lon).ok()?;
    Some((lat, lon))
}

/// Split a semicolon separated list of locations, dropping blanks
pub fn split_locations(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Query Validations
// ============================================================================

/// Validate a forecast horizon in days
pub fn validate_horizon_days(days: u32, max_days: u32) -> Result<(), &'static str> {
    if days == 0 {
        return Err("Forecast horizon must be at least one day");
    }
    if days > max_days {
        return Err("Forecast horizon exceeds the supported number of days");
    }
    Ok(())
}

/// Historical data exists only for days strictly before today
pub fn is_historical_date(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

/// Validate an alert threshold against the metric's physical range
pub fn validate_threshold(metric: MetricKind, threshold: f64) -> Result<(), &'static str> {
    if !threshold.is_finite() {
        return Err("Threshold must be a finite number");
    }
    match metric {
        MetricKind::PrecipitationProbability | MetricKind::Humidity => {
            if !(0.0..=100.0).contains(&threshold) {
                return Err("Percentage thresholds must be between 0 and 100");
            }
        }
        MetricKind::WindSpeed => {
            if threshold < 0.0 {
                return Err("Wind speed threshold cannot be negative");
            }
        }
        MetricKind::Temperature => {
            if !(-100.0..=70.0).contains(&threshold) {
                return Err("Temperature threshold out of range");
            }
        }
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate a feedback rating (1-5 stars)
pub fn validate_rating(rating: i32) -> Result<(), &'static str> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be between 1 and 5");
    }
    Ok(())
}
