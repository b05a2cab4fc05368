//! Rolling-window request counters behind the trending view

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use shared::{Location, LocationKey};

const BUCKET_SECS: i64 = 3600;

/// Records between sweeps that drop locations with no requests in the window
const SWEEP_EVERY: u64 = 256;

/// Location ranking entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingLocation {
    pub location: Location,
    pub requests: u64,
    pub last_requested: DateTime<Utc>,
}

struct Counter {
    location: Location,
    /// (bucket start as unix seconds, count), oldest first
    buckets: VecDeque<(i64, u64)>,
    last_requested: DateTime<Utc>,
}

impl Counter {
    fn prune(&mut self, cutoff: i64) {
        while self.buckets.front().is_some_and(|(start, _)| *start + BUCKET_SECS <= cutoff) {
            self.buckets.pop_front();
        }
    }

    /// Count one request in `bucket`, keeping buckets ordered by start
    fn add(&mut self, bucket: i64) {
        let position = self.buckets.iter().rposition(|(start, _)| *start <= bucket);
        match position {
            Some(i) if self.buckets[i].0 == bucket => self.buckets[i].1 += 1,
            Some(i) => self.buckets.insert(i + 1, (bucket, 1)),
            None => self.buckets.push_front((bucket, 1)),
        }
    }

    fn total(&self) -> u64 {
        self.buckets.iter().map(|(_, n)| n).sum()
    }
}

/// Process-wide trending state.
///
/// Counts are kept in hourly buckets; buckets older than the window fall
/// out as time passes, so the ranking reflects recent interest only.
pub struct TrendingTracker {
    window: Duration,
    state: Mutex<TrendingState>,
}

#[derive(Default)]
struct TrendingState {
    counters: HashMap<LocationKey, Counter>,
    recorded: u64,
}

impl TrendingState {
    fn sweep(&mut self, cutoff: i64) {
        self.counters.retain(|_, counter| {
            counter.prune(cutoff);
            !counter.buckets.is_empty()
        });
    }
}

impl TrendingTracker {
    pub fn new(window_hours: i64) -> Self {
        Self {
            window: Duration::hours(window_hours.max(1)),
            state: Mutex::new(TrendingState::default()),
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> i64 {
        (now - self.window).timestamp()
    }

    /// Count one request for `location` at `now`
    pub async fn record(&self, location: &Location, now: DateTime<Utc>) {
        let bucket = now.timestamp().div_euclid(BUCKET_SECS) * BUCKET_SECS;
        let cutoff = self.cutoff(now);
        let mut state = self.state.lock().await;

        let counter = state.counters.entry(location.key()).or_insert_with(|| Counter {
            location: location.clone(),
            buckets: VecDeque::new(),
            last_requested: now,
        });
        // keep the most descriptive name seen
        if location.name.is_some() {
            counter.location = location.clone();
        }
        counter.last_requested = counter.last_requested.max(now);
        counter.add(bucket);
        counter.prune(cutoff);

        state.recorded += 1;
        if state.recorded % SWEEP_EVERY == 0 {
            state.sweep(cutoff);
        }
    }

    /// Number of locations currently holding counts
    pub async fn tracked(&self) -> usize {
        self.state.lock().await.counters.len()
    }

    /// Top `limit` locations by requests inside the window ending at `now`.
    ///
    /// Ties go to the most recently requested location, then by name.
    pub async fn top(&self, limit: usize, now: DateTime<Utc>) -> Vec<TrendingLocation> {
        let cutoff = self.cutoff(now);
        let mut state = self.state.lock().await;
        state.sweep(cutoff);

        let mut ranked: Vec<TrendingLocation> = state
            .counters
            .values()
            .map(|c| TrendingLocation {
                location: c.location.clone(),
                requests: c.total(),
                last_requested: c.last_requested,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.requests
                .cmp(&a.requests)
                .then(b.last_requested.cmp(&a.last_requested))
                .then(a.location.label().cmp(&b.location.label()))
        });
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ranking_by_count() {
        let tracker = TrendingTracker::new(24);
        let london = Location::named(51.5, -0.12, "London");
        let paris = Location::named(48.85, 2.35, "Paris");

        tracker.record(&paris, at(9, 0)).await;
        tracker.record(&london, at(9, 5)).await;
        tracker.record(&london, at(10, 0)).await;

        let top = tracker.top(5, at(11, 0)).await;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].location.name.as_deref(), Some("London"));
        assert_eq!(top[0].requests, 2);
        assert_eq!(top[1].requests, 1);
    }

    #[tokio::test]
    async fn test_ties_prefer_recent_then_name() {
        let tracker = TrendingTracker::new(24);
        tracker.record(&Location::named(1.0, 1.0, "Berlin"), at(8, 0)).await;
        tracker.record(&Location::named(2.0, 2.0, "Athens"), at(8, 0)).await;
        tracker.record(&Location::named(3.0, 3.0, "Cairo"), at(9, 0)).await;

        let names: Vec<String> = tracker
            .top(3, at(10, 0))
            .await
            .into_iter()
            .map(|t| t.location.label())
            .collect();
        assert_eq!(names, vec!["Cairo", "Athens", "Berlin"]);
    }

    #[tokio::test]
    async fn test_counts_roll_out_of_window() {
        let tracker = TrendingTracker::new(24);
        let tokyo = Location::named(35.68, 139.69, "Tokyo");
        tracker.record(&tokyo, at(1, 0)).await;
        tracker.record(&tokyo, at(20, 0)).await;

        let next_day = at(2, 0) + Duration::hours(24);
        let top = tracker.top(5, next_day).await;
        assert_eq!(top[0].requests, 1);

        let much_later = at(20, 30) + Duration::hours(48);
        assert!(tracker.top(5, much_later).await.is_empty());
    }

    #[tokio::test]
    async fn test_late_record_lands_in_its_own_hour() {
        let tracker = TrendingTracker::new(2);
        let lima = Location::named(-12.05, -77.04, "Lima");
        tracker.record(&lima, at(10, 0)).await;
        // a handler that read the clock before the hour turned reports late
        tracker.record(&lima, at(9, 59)).await;
        tracker.record(&lima, at(10, 5)).await;

        assert_eq!(tracker.top(1, at(10, 30)).await[0].requests, 3);
        // the 09:00 bucket leaves the two hour window before the 10:00 one
        assert_eq!(tracker.top(1, at(12, 5)).await[0].requests, 2);
        assert!(tracker.top(1, at(13, 30)).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_locations_are_swept_while_recording() {
        let tracker = TrendingTracker::new(1);
        for i in 0..SWEEP_EVERY - 1 {
            tracker.record(&Location::new(i as f64 / 10.0, 0.0), at(1, 0)).await;
        }
        assert_eq!(tracker.tracked().await, (SWEEP_EVERY - 1) as usize);

        let berlin = Location::named(52.52, 13.4, "Berlin");
        tracker.record(&berlin, at(5, 0)).await;
        assert_eq!(tracker.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let tracker = TrendingTracker::new(24);
        for i in 0..10 {
            tracker.record(&Location::new(i as f64, 0.0), at(12, 0)).await;
        }
        assert_eq!(tracker.top(3, at(12, 30)).await.len(), 3);
        assert!(tracker.top(0, at(12, 30)).await.is_empty());
    }
}
