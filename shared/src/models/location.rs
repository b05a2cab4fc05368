//! Geographic location models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Coordinate tolerance used for location identity, in degrees
pub const LOCATION_PRECISION_DEGREES: f64 = 0.01;

/// A point on the globe, optionally with a resolved place name.
///
/// Two locations are the same location when their coordinates round to the
/// same 0.01° cell; the name plays no part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            name: None,
        }
    }

    pub fn named(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            name: Some(name.into()),
        }
    }

    pub fn key(&self) -> LocationKey {
        LocationKey::from_coordinates(self.latitude, self.longitude)
    }

    /// Name if resolved, otherwise the rounded coordinates
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.key().to_string(),
        }
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Location rounded to the identity grid, in hundredths of a degree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    pub lat_centi: i32,
    pub lon_centi: i32,
}

impl LocationKey {
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        let scale = 1.0 / LOCATION_PRECISION_DEGREES;
        Self {
            lat_centi: (latitude * scale).round() as i32,
            lon_centi: (longitude * scale).round() as i32,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.lat_centi as f64 * LOCATION_PRECISION_DEGREES
    }

    pub fn longitude(&self) -> f64 {
        self.lon_centi as f64 * LOCATION_PRECISION_DEGREES
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2},{:.2}", self.latitude(), self.longitude())
    }
}
