//! Forward geocoding: resolve place names to coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use shared::Location;

use super::get_json;
use crate::error::{AppError, AppResult};

/// Resolves a free-text place name
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, query: &str) -> AppResult<Location>;
}

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    importance: f64,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, query: &str) -> AppResult<Location> {
        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("limit", "5")]);

        let places: Vec<NominatimPlace> = match get_json(request).await {
            Ok(places) => places,
            Err(e) => {
                tracing::debug!("Geocode request for '{}' failed: {}", query, e);
                return Err(AppError::LocationNotFound(query.to_string()));
            }
        };

        let location = best_match(places)
            .ok_or_else(|| AppError::LocationNotFound(query.to_string()))?;
        tracing::info!("Geocoded '{}' to: {}", query, location.label());
        Ok(location)
    }
}

/// Most important candidate with parseable coordinates
fn best_match(places: Vec<NominatimPlace>) -> Option<Location> {
    places
        .into_iter()
        .filter_map(|p| {
            let lat = p.lat.parse::<f64>().ok()?;
            let lon = p.lon.parse::<f64>().ok()?;
            shared::validate_coordinates(lat, lon).ok()?;
            Some((p.importance, Location::named(lat, lon, p.display_name)))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, location)| location)
}
