//! Aggregation service
//!
//! Every query goes through the same pipeline: cache check, parallel fan-out
//! to all registered providers on a miss, reconciliation, cache store.
//! Individual provider failures are tolerated as long as one succeeds.

use chrono::{DateTime, Months, NaiveDate, Utc};
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use shared::{Consensus, DataKind, Location, MetricKind, Reading, TimeBucket};

use crate::config::{Config, ForecastConfig};
use crate::error::{AppError, AppResult, ProviderError};
use crate::external::{FetchRequest, WeatherProvider};
use crate::services::cache::{CacheKey, CacheStats, ConsensusCache};
use crate::services::reconciliation::ReconciliationEngine;
use crate::services::trending::{TrendingLocation, TrendingTracker};

/// Current consensus with its age
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeWeather {
    pub consensus: Consensus,
    pub age_seconds: i64,
}

/// One location's entry in a comparison
#[derive(Debug, Clone, Serialize)]
pub struct LocationComparison {
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<Consensus>,
    /// Value of the requested metric, when one was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Averages over the recent historical window
#[derive(Debug, Clone, Serialize)]
pub struct ClimateSummary {
    pub location: Location,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub days_covered: usize,
    pub mean_temperature_c: Option<f64>,
    pub mean_precipitation_probability: Option<f64>,
    pub mean_wind_speed_kph: Option<f64>,
    pub mean_humidity_percent: Option<f64>,
}

/// Today's temperature against the same date a year earlier
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalChange {
    pub location: Location,
    pub current_temperature_c: f64,
    pub last_year_date: NaiveDate,
    pub last_year_temperature_c: f64,
    pub change_c: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayConfidence {
    pub date: NaiveDate,
    pub confidence_percent: f64,
}

/// How much providers agree about the coming week
#[derive(Debug, Clone, Serialize)]
pub struct PredictionConfidence {
    pub location: Location,
    pub confidence_percent: f64,
    pub days: Vec<DayConfidence>,
}

/// Aggregation service
pub struct AggregationService {
    providers: Vec<Arc<dyn WeatherProvider>>,
    engine: ReconciliationEngine,
    cache: ConsensusCache,
    trending: TrendingTracker,
    provider_timeout: Duration,
    forecast: ForecastConfig,
    trending_default_limit: usize,
}

impl AggregationService {
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, config: &Config) -> Self {
        Self {
            providers,
            engine: ReconciliationEngine::new(config.reconciliation.clone()),
            cache: ConsensusCache::new(&config.cache),
            trending: TrendingTracker::new(config.trending.window_hours),
            provider_timeout: config.providers.timeout(),
            forecast: config.forecast.clone(),
            trending_default_limit: config.trending.default_limit,
        }
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn forecast_limits(&self) -> &ForecastConfig {
        &self.forecast
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    // ========================================================================
    // Core pipeline
    // ========================================================================

    /// Fetch from every provider in parallel, each bounded by the timeout.
    ///
    /// Readings come back in provider registration order so reconciliation
    /// sees the same input regardless of completion order.
    async fn fetch_all(&self, location: &Location, request: FetchRequest) -> AppResult<Vec<Reading>> {
        let mut tasks = JoinSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let location = location.clone();
            let timeout = self.provider_timeout;
            tasks.spawn(async move {
                let result =
                    match tokio::time::timeout(timeout, provider.fetch(&location, &request)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout),
                    };
                (index, provider.id().to_string(), result)
            });
        }

        let mut readings = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(reading))) => readings.push((index, reading)),
                Ok((_, provider, Err(e))) => {
                    tracing::warn!(provider = %provider, kind = %request.kind, "Provider fetch failed: {}", e);
                    failures.push(e);
                }
                Err(e) => {
                    tracing::error!("Provider task failed: {}", e);
                    failures.push(ProviderError::Unavailable(e.to_string()));
                }
            }
        }

        if readings.is_empty() {
            let data_gap = !failures.is_empty() && failures.iter().all(ProviderError::is_data_gap);
            return Err(match (request.kind, request.bucket) {
                (DataKind::Historical, TimeBucket::Day(date)) if data_gap => {
                    AppError::NoHistoricalData(date.to_string())
                }
                _ => AppError::AllProvidersUnavailable,
            });
        }

        readings.sort_by_key(|(index, _)| *index);
        Ok(readings.into_iter().map(|(_, reading)| reading).collect())
    }

    /// Cached consensus for a location and request, refreshed on miss
    async fn consensus(&self, location: &Location, request: FetchRequest) -> AppResult<Consensus> {
        let key = CacheKey::new(location.key(), request.kind, request.bucket);
        self.cache
            .get_or_refresh(key, || async {
                let readings = self.fetch_all(location, request).await?;
                let consensus = self.engine.reconcile(&readings)?;
                tracing::info!(
                    key = %key,
                    providers = consensus.providers.len(),
                    "Reconciled new consensus"
                );
                Ok(consensus)
            })
            .await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current conditions; counts towards trending
    pub async fn current_weather(
        &self,
        location: &Location,
        now: DateTime<Utc>,
    ) -> AppResult<Consensus> {
        self.trending.record(location, now).await;
        self.current_consensus(location).await
    }

    /// Current conditions without touching trending counters
    pub async fn current_consensus(&self, location: &Location) -> AppResult<Consensus> {
        self.consensus(location, FetchRequest::current()).await
    }

    pub async fn realtime(&self, location: &Location) -> AppResult<RealtimeWeather> {
        let consensus = self.current_consensus(location).await?;
        let age_seconds = (Utc::now() - consensus.computed_at).num_seconds().max(0);
        Ok(RealtimeWeather {
            consensus,
            age_seconds,
        })
    }

    /// One consensus per day starting today (UTC), in date order
    pub async fn forecast(&self, location: &Location, horizon_days: u32) -> AppResult<Vec<Consensus>> {
        shared::validate_horizon_days(horizon_days, self.forecast.max_horizon_days)
            .map_err(|msg| AppError::validation("days", msg))?;

        let today = Utc::now().date_naive();
        let days = today
            .iter_days()
            .take(horizon_days as usize)
            .map(|date| self.consensus(location, FetchRequest::forecast(date)));
        try_join_all(days).await
    }

    /// Full per-day consensus, defaulting to three days
    pub async fn detailed_forecast(
        &self,
        location: &Location,
        horizon_days: Option<u32>,
    ) -> AppResult<Vec<Consensus>> {
        self.forecast(location, horizon_days.unwrap_or(DETAILED_FORECAST_DAYS))
            .await
    }

    /// Consensus for a past day
    pub async fn historical(&self, location: &Location, date: NaiveDate) -> AppResult<Consensus> {
        if !shared::is_historical_date(date, Utc::now().date_naive()) {
            return Err(AppError::NoHistoricalData(date.to_string()));
        }
        self.consensus(location, FetchRequest::historical(date)).await
    }

    /// Current consensus for each location, in request order.
    ///
    /// A location that fails carries its error instead of a consensus.
    pub async fn compare(
        &self,
        locations: &[Location],
        metric: Option<MetricKind>,
    ) -> Vec<LocationComparison> {
        let lookups = locations.iter().map(|location| self.current_consensus(location));
        join_all(lookups)
            .await
            .into_iter()
            .zip(locations)
            .map(|(result, location)| match result {
                Ok(consensus) => LocationComparison {
                    location: location.clone(),
                    value: metric.and_then(|m| consensus.value(m)),
                    consensus: Some(consensus),
                    error: None,
                },
                Err(e) => LocationComparison {
                    location: location.clone(),
                    consensus: None,
                    value: None,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    /// Averages of historical consensus over the climate window
    pub async fn climate(&self, location: &Location) -> AppResult<ClimateSummary> {
        let today = Utc::now().date_naive();
        let window = self.forecast.climate_window_days.max(1) as u64;
        let window_start = today - chrono::Days::new(window);
        let window_end = today - chrono::Days::new(1);

        let dates: Vec<NaiveDate> = window_start
            .iter_days()
            .take_while(|d| *d <= window_end)
            .collect();
        let lookups = dates.iter().map(|date| self.historical(location, *date));
        let mut covered = Vec::with_capacity(dates.len());
        for (date, result) in dates.iter().zip(join_all(lookups).await) {
            match result {
                Ok(consensus) => covered.push(consensus),
                Err(e) => tracing::debug!(date = %date, "Skipping climate day: {}", e),
            }
        }
        if covered.is_empty() {
            return Err(AppError::NoHistoricalData(format!(
                "{} to {}",
                window_start, window_end
            )));
        }

        let mean_of = |metric: MetricKind| {
            crate::external::mean(covered.iter().filter_map(|c| c.value(metric)))
        };
        Ok(ClimateSummary {
            location: location.clone(),
            window_start,
            window_end,
            days_covered: covered.len(),
            mean_temperature_c: mean_of(MetricKind::Temperature),
            mean_precipitation_probability: mean_of(MetricKind::PrecipitationProbability),
            mean_wind_speed_kph: mean_of(MetricKind::WindSpeed),
            mean_humidity_percent: mean_of(MetricKind::Humidity),
        })
    }

    /// Current temperature versus the same date last year
    pub async fn seasonal_changes(&self, location: &Location) -> AppResult<SeasonalChange> {
        let current = self.current_consensus(location).await?;
        let current_temperature_c = current
            .value(MetricKind::Temperature)
            .ok_or(AppError::InsufficientData)?;

        let today = Utc::now().date_naive();
        let last_year_date = today
            .checked_sub_months(Months::new(12))
            .ok_or_else(|| AppError::Internal(format!("no date a year before {}", today)))?;
        let last_year = self.historical(location, last_year_date).await?;
        let last_year_temperature_c = last_year
            .value(MetricKind::Temperature)
            .ok_or_else(|| AppError::NoHistoricalData(last_year_date.to_string()))?;

        Ok(SeasonalChange {
            location: location.clone(),
            current_temperature_c,
            last_year_date,
            last_year_temperature_c,
            change_c: current_temperature_c - last_year_temperature_c,
        })
    }

    /// Mean temperature agreement across the default forecast horizon
    pub async fn prediction_confidence(&self, location: &Location) -> AppResult<PredictionConfidence> {
        let days = self
            .forecast(location, self.forecast.default_horizon_days)
            .await?;

        let days: Vec<DayConfidence> = days
            .iter()
            .filter_map(|c| {
                let date = c.bucket.date()?;
                let score = c
                    .metric(MetricKind::Temperature)
                    .map(|m| m.confidence)
                    .unwrap_or_else(|| c.overall_confidence());
                Some(DayConfidence {
                    date,
                    confidence_percent: round1(score * 100.0),
                })
            })
            .collect();

        let overall = crate::external::mean(days.iter().map(|d| d.confidence_percent))
            .ok_or(AppError::InsufficientData)?;
        Ok(PredictionConfidence {
            location: location.clone(),
            confidence_percent: round1(overall),
            days,
        })
    }

    /// Most requested locations inside the rolling window
    pub async fn trending(&self, limit: Option<usize>, now: DateTime<Utc>) -> Vec<TrendingLocation> {
        self.trending
            .top(limit.unwrap_or(self.trending_default_limit), now)
            .await
    }
}

const DETAILED_FORECAST_DAYS: u32 = 3;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
