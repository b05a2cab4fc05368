//! User profiles: preferences, home location, search history and feedback
//!
//! Held in memory; accounts themselves live with the external identity
//! service, which issues the bearer tokens.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{Location, LocationKey};

use crate::error::{AppError, AppResult};

/// Number of searches reported as a user's history
pub const TOP_SEARCHES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SearchEntry {
    pub location: Location,
    pub count: u64,
    pub last_searched: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: String,
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
}

#[derive(Debug, Default)]
struct UserProfile {
    preferences: Map<String, Value>,
    home_location: Option<Location>,
    searches: HashMap<LocationKey, SearchEntry>,
}

#[derive(Default)]
pub struct UserProfileService {
    profiles: RwLock<HashMap<String, UserProfile>>,
    feedback: RwLock<Vec<Feedback>>,
}

impl UserProfileService {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    pub async fn preferences(&self, user_id: &str) -> Value {
        let profiles = self.profiles.read().await;
        let preferences = profiles
            .get(user_id)
            .map(|p| p.preferences.clone())
            .unwrap_or_default();
        Value::Object(preferences)
    }

    /// Merge `updates` into the stored preferences; `null` removes a key
    pub async fn update_preferences(&self, user_id: &str, updates: Value) -> AppResult<Value> {
        let Value::Object(updates) = updates else {
            return Err(AppError::validation(
                "preferences",
                "Preferences must be a JSON object",
            ));
        };

        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(user_id.to_string()).or_default();
        for (key, value) in updates {
            if value.is_null() {
                profile.preferences.remove(&key);
            } else {
                profile.preferences.insert(key, value);
            }
        }
        Ok(Value::Object(profile.preferences.clone()))
    }

    // ========================================================================
    // Locations
    // ========================================================================

    pub async fn set_home_location(&self, user_id: &str, location: Location) -> Location {
        let mut profiles = self.profiles.write().await;
        profiles.entry(user_id.to_string()).or_default().home_location = Some(location.clone());
        location
    }

    pub async fn home_location(&self, user_id: &str) -> Option<Location> {
        let profiles = self.profiles.read().await;
        profiles.get(user_id).and_then(|p| p.home_location.clone())
    }

    pub async fn record_search(&self, user_id: &str, location: &Location, now: DateTime<Utc>) {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(user_id.to_string()).or_default();
        let entry = profile
            .searches
            .entry(location.key())
            .or_insert_with(|| SearchEntry {
                location: location.clone(),
                count: 0,
                last_searched: now,
            });
        entry.count += 1;
        entry.last_searched = now;
        if location.name.is_some() {
            entry.location = location.clone();
        }
    }

    /// Most searched locations, most recent first among equals
    pub async fn top_searches(&self, user_id: &str) -> Vec<SearchEntry> {
        let profiles = self.profiles.read().await;
        let Some(profile) = profiles.get(user_id) else {
            return Vec::new();
        };
        let mut entries: Vec<SearchEntry> = profile.searches.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(b.last_searched.cmp(&a.last_searched))
        });
        entries.truncate(TOP_SEARCHES);
        entries
    }

    /// Home location, else the most searched location
    pub async fn default_location(&self, user_id: &str) -> Option<Location> {
        if let Some(home) = self.home_location(user_id).await {
            return Some(home);
        }
        self.top_searches(user_id)
            .await
            .into_iter()
            .next()
            .map(|entry| entry.location)
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    pub async fn submit_feedback(
        &self,
        user_id: &str,
        rating: i32,
        comment: Option<String>,
    ) -> AppResult<Feedback> {
        shared::validate_rating(rating).map_err(|msg| AppError::validation("rating", msg))?;

        let feedback = Feedback {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            created_at: Utc::now(),
        };
        self.feedback.write().await.push(feedback.clone());
        tracing::info!(user_id = %user_id, rating, "Feedback received");
        Ok(feedback)
    }

    pub async fn feedback_summary(&self) -> FeedbackSummary {
        let feedback = self.feedback.read().await;
        let count = feedback.len();
        let average_rating = (count > 0).then(|| {
            let total: i32 = feedback.iter().map(|f| f.rating).sum();
            (total as f64 / count as f64 * 100.0).round() / 100.0
        });
        FeedbackSummary {
            count,
            average_rating,
        }
    }
}

// ============================================================================
// Temperature-band suggestions
// ============================================================================

/// Activities suited to the temperature, in °C
pub fn suggested_activities(temperature_c: f64) -> [&'static str; 3] {
    if temperature_c > 35.0 {
        [
            "Stay indoors in an air-conditioned mall",
            "Enjoy a cold smoothie at a trendy cafe",
            "Attend an indoor concert or show",
        ]
    } else if temperature_c > 30.0 {
        [
            "Go swimming at a nearby pool or beach",
            "Have an outdoor picnic in the shade",
            "Try water sports or take a boat ride to cool off",
        ]
    } else if temperature_c > 25.0 {
        [
            "Take a leisurely walk in the park",
            "Go cycling or rollerblading",
            "Enjoy an iced coffee outdoors",
        ]
    } else if temperature_c > 20.0 {
        [
            "Go hiking on a nature trail",
            "Have a light outdoor brunch with friends",
            "Go for a scenic drive",
        ]
    } else if temperature_c > 15.0 {
        [
            "Explore a museum or art gallery",
            "Visit a local historical site",
            "Enjoy a quiet afternoon at a cafe",
        ]
    } else if temperature_c > 10.0 {
        [
            "Relax at a cozy cafe with a warm drink",
            "Browse a bookstore or library",
            "Watch a movie at a theater",
        ]
    } else if temperature_c > 5.0 {
        [
            "Stay indoors and try a new recipe",
            "Play board games with friends or family",
            "Enjoy a warm cup of tea while reading",
        ]
    } else {
        [
            "Stay warm indoors and watch a movie marathon",
            "Try crafting or another indoor hobby",
            "Cook a hearty meal and relax at home",
        ]
    }
}

/// Clothing advice for the temperature, in °C
pub fn clothing_recommendation(temperature_c: f64) -> &'static str {
    match temperature_c {
        t if t > 35.0 => "It's extremely hot. Opt for very light clothing, stay hydrated, and avoid prolonged outdoor activities.",
        t if t > 30.0 => "It's very hot. Wear shorts and a tank top, and consider cooling activities like swimming.",
        t if t > 25.0 => "It's hot. Choose light clothing and consider outdoor activities such as a picnic or beach visit.",
        t if t > 20.0 => "It's warm. A light jacket or layers might be comfortable. Enjoy a walk in the park.",
        t if t > 15.0 => "The weather is moderate. Dress comfortably and enjoy outdoor leisure.",
        t if t > 10.0 => "It's a bit cool. Consider a sweater and perhaps indoor activities or a quiet stroll.",
        t if t > 5.0 => "It's chilly. Dress warmly with layers and consider indoor activities.",
        _ => "It's extremely cold. Wear heavy clothing and, if possible, stay indoors and keep warm.",
    }
}
