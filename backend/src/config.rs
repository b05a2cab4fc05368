//! Configuration management for the Weather Aggregator
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with WXA_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use shared::MetricKind;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Upstream weather providers
    pub providers: ProvidersConfig,

    /// Consensus cache
    pub cache: CacheConfig,

    /// Tolerance bands for outlier detection
    pub reconciliation: ReconciliationConfig,

    /// Alert scheduler
    pub alerts: AlertsConfig,

    /// Trending view
    pub trending: TrendingConfig,

    /// Forecast and climate query limits
    pub forecast: ForecastConfig,

    /// Bearer token validation
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    /// Per-call timeout for a single provider fetch
    pub timeout_secs: u64,

    /// User agent sent to every upstream
    pub user_agent: String,

    pub open_meteo: OpenMeteoConfig,
    pub open_weather_map: KeyedProviderConfig,
    pub weather_api: KeyedProviderConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenMeteoConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Archive endpoint used for historical data
    pub archive_url: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeyedProviderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocoderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction
    pub capacity: usize,

    /// TTL for current conditions in seconds
    pub current_ttl_secs: u64,

    /// TTL for forecast days in seconds
    pub forecast_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconciliationConfig {
    pub temperature_c: f64,
    pub precipitation_probability: f64,
    pub wind_speed_kph: f64,
    pub humidity_percent: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Scheduler tick interval in seconds
    pub tick_secs: u64,

    /// Re-arm delay after a rule triggers, in seconds
    pub cooldown_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendingConfig {
    /// Rolling window length in hours
    pub window_hours: i64,

    /// Number of locations returned when no limit is given
    pub default_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    pub max_horizon_days: u32,
    pub default_horizon_days: u32,
    /// Days of history averaged by the climate view
    pub climate_window_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Secret used to validate bearer tokens
    pub jwt_secret: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WXA_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("providers.timeout_secs", 5)?
            .set_default("providers.user_agent", DEFAULT_USER_AGENT)?
            .set_default("providers.open_meteo.enabled", true)?
            .set_default("providers.open_meteo.base_url", OPEN_METEO_URL)?
            .set_default("providers.open_meteo.archive_url", OPEN_METEO_ARCHIVE_URL)?
            .set_default("providers.open_meteo.weight", 1.0)?
            .set_default("providers.open_weather_map.enabled", false)?
            .set_default("providers.open_weather_map.base_url", OPEN_WEATHER_MAP_URL)?
            .set_default("providers.open_weather_map.api_key", "")?
            .set_default("providers.open_weather_map.weight", 1.0)?
            .set_default("providers.weather_api.enabled", false)?
            .set_default("providers.weather_api.base_url", WEATHER_API_URL)?
            .set_default("providers.weather_api.api_key", "")?
            .set_default("providers.weather_api.weight", 0.8)?
            .set_default("providers.geocoder.base_url", NOMINATIM_URL)?
            .set_default("cache.capacity", 10_000)?
            .set_default("cache.current_ttl_secs", 600)?
            .set_default("cache.forecast_ttl_secs", 21_600)?
            .set_default("reconciliation.temperature_c", 3.0)?
            .set_default("reconciliation.precipitation_probability", 20.0)?
            .set_default("reconciliation.wind_speed_kph", 10.0)?
            .set_default("reconciliation.humidity_percent", 15.0)?
            .set_default("alerts.tick_secs", 60)?
            .set_default("alerts.cooldown_secs", 3600)?
            .set_default("trending.window_hours", 24)?
            .set_default("trending.default_limit", 5)?
            .set_default("forecast.max_horizon_days", 14)?
            .set_default("forecast.default_horizon_days", 7)?
            .set_default("forecast.climate_window_days", 30)?
            .set_default("auth.jwt_secret", "development-secret-key")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WXA_ prefix)
            .add_source(
                Environment::with_prefix("WXA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

const DEFAULT_USER_AGENT: &str = "WeatherAggregator/0.1.0";
const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1";
const OPEN_METEO_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1";
const OPEN_WEATHER_MAP_URL: &str = "https://api.openweathermap.org/data/2.5";
const WEATHER_API_URL: &str = "https://api.weatherapi.com/v1";
const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CacheConfig {
    pub fn current_ttl(&self) -> Duration {
        Duration::from_secs(self.current_ttl_secs)
    }

    pub fn forecast_ttl(&self) -> Duration {
        Duration::from_secs(self.forecast_ttl_secs)
    }
}

impl ReconciliationConfig {
    /// Tolerance band for a metric
    pub fn tolerance(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::Temperature => self.temperature_c,
            MetricKind::PrecipitationProbability => self.precipitation_probability,
            MetricKind::WindSpeed => self.wind_speed_kph,
            MetricKind::Humidity => self.humidity_percent,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            alerts: AlertsConfig::default(),
            trending: TrendingConfig::default(),
            forecast: ForecastConfig::default(),
            auth: AuthConfig {
                jwt_secret: "development-secret-key".to_string(),
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            open_meteo: OpenMeteoConfig {
                enabled: true,
                base_url: OPEN_METEO_URL.to_string(),
                archive_url: OPEN_METEO_ARCHIVE_URL.to_string(),
                weight: 1.0,
            },
            open_weather_map: KeyedProviderConfig {
                enabled: false,
                base_url: OPEN_WEATHER_MAP_URL.to_string(),
                api_key: String::new(),
                weight: 1.0,
            },
            weather_api: KeyedProviderConfig {
                enabled: false,
                base_url: WEATHER_API_URL.to_string(),
                api_key: String::new(),
                weight: 0.8,
            },
            geocoder: GeocoderConfig {
                base_url: NOMINATIM_URL.to_string(),
            },
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            current_ttl_secs: 600,
            forecast_ttl_secs: 21_600,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            temperature_c: 3.0,
            precipitation_probability: 20.0,
            wind_speed_kph: 10.0,
            humidity_percent: 15.0,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            cooldown_secs: 3600,
        }
    }
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            default_limit: 5,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_horizon_days: 14,
            default_horizon_days: 7,
            climate_window_days: 30,
        }
    }
}
