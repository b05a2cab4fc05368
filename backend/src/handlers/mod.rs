//! HTTP handlers
//!
//! Handlers stay thin: resolve the location, call one service operation,
//! shape the response.

pub mod alerts;
pub mod comparisons;
pub mod health;
pub mod personalization;
pub mod weather;

use chrono::Utc;
use serde::Deserialize;

use shared::Location;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::AppState;

pub use alerts::*;
pub use comparisons::*;
pub use health::*;
pub use personalization::*;
pub use weather::*;

/// Where a request is about: a place name, or `lat` and `lon`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationQuery {
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl LocationQuery {
    fn text(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Resolve the request's location.
///
/// Explicit coordinates win over a place name. Without either, an
/// authenticated caller falls back to their default location. Explicit
/// lookups by authenticated callers are added to their search history.
pub async fn resolve_location(
    state: &AppState,
    query: &LocationQuery,
    user: Option<&AuthUser>,
) -> AppResult<Location> {
    let location = match (query.lat, query.lon, query.text()) {
        (Some(lat), Some(lon), _) => {
            shared::validate_coordinates(lat, lon)
                .map_err(|msg| AppError::validation("lat", msg))?;
            Location::new(lat, lon)
        }
        (Some(_), None, _) => return Err(AppError::validation("lon", "lon is required with lat")),
        (None, Some(_), _) => return Err(AppError::validation("lat", "lat is required with lon")),
        (None, None, Some(text)) => resolve_place(state, text).await?,
        (None, None, None) => {
            let fallback = match user {
                Some(user) => state.profiles.default_location(&user.user_id).await,
                None => None,
            };
            return fallback.ok_or_else(|| {
                AppError::validation("location", "Provide a location name or lat and lon")
            });
        }
    };

    if let Some(user) = user {
        state
            .profiles
            .record_search(&user.user_id, &location, Utc::now())
            .await;
    }
    Ok(location)
}

/// A "lat,lon" pair or a place name for the geocoder
pub async fn resolve_place(state: &AppState, text: &str) -> AppResult<Location> {
    match shared::parse_coordinate_pair(text) {
        Some((lat, lon)) => Ok(Location::new(lat, lon)),
        None => state.geocoder.resolve(text).await,
    }
}
