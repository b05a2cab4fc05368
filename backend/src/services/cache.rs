//! Consensus cache with per-kind TTL, LRU eviction and single-flight refresh
//!
//! Expired entries are dropped lazily on read. Writes evict the least
//! recently used entry once capacity is reached. A miss in
//! [`ConsensusCache::get_or_refresh`] runs exactly one refresh per key even
//! when many requests miss at once; the others wait on that key's flight and
//! receive its outcome, failures included.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use shared::{Consensus, DataKind, LocationKey, TimeBucket};

use crate::config::CacheConfig;
use crate::error::AppResult;

/// Cache key: location cell, data kind and time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub location: LocationKey,
    pub kind: DataKind,
    pub bucket: TimeBucket,
}

impl CacheKey {
    pub fn new(location: LocationKey, kind: DataKind, bucket: TimeBucket) -> Self {
        Self {
            location,
            kind,
            bucket,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.location, self.kind, self.bucket)
    }
}

/// Counters exposed on the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct CacheEntry {
    value: Consensus,
    /// `None` never expires
    expires_at: Option<Instant>,
    last_access: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// access tick -> key, oldest first
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    stats: CacheStats,
}

impl CacheState {
    fn touch(&mut self, key: &CacheKey) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.last_access);
            entry.last_access = tick;
            self.recency.insert(tick, *key);
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_access);
        }
    }

    fn lookup(&mut self, key: &CacheKey, now: Instant) -> Option<Consensus> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => entry.expires_at.is_some_and(|at| now >= at),
        };
        if expired {
            self.remove(key);
            return None;
        }
        self.touch(key);
        self.entries.get(key).map(|e| e.value.clone())
    }
}

/// TTL per data kind
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub current: Duration,
    pub forecast: Duration,
}

impl TtlPolicy {
    /// `None` means the entry never expires by age
    pub fn ttl(&self, kind: DataKind) -> Option<Duration> {
        match kind {
            DataKind::Current => Some(self.current),
            DataKind::Forecast => Some(self.forecast),
            DataKind::Historical => None,
        }
    }
}

impl From<&CacheConfig> for TtlPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            current: config.current_ttl(),
            forecast: config.forecast_ttl(),
        }
    }
}

/// One refresh in progress; holds its outcome once finished
type Flight = Arc<Mutex<Option<AppResult<Consensus>>>>;

/// Shared consensus cache
pub struct ConsensusCache {
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<CacheKey, Flight>>,
    capacity: usize,
    ttl: TtlPolicy,
}

impl ConsensusCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_policy(config.capacity, TtlPolicy::from(config))
    }

    pub fn with_policy(capacity: usize, ttl: TtlPolicy) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            in_flight: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Fresh cached value, if any
    pub async fn get(&self, key: &CacheKey) -> Option<Consensus> {
        let mut state = self.state.lock().await;
        let found = state.lookup(key, Instant::now());
        if found.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        found
    }

    /// Store a value with the TTL of its kind
    pub async fn put(&self, key: CacheKey, value: Consensus) {
        let expires_at = self.ttl.ttl(key.kind).map(|ttl| Instant::now() + ttl);
        let mut state = self.state.lock().await;

        state.remove(&key);
        while state.entries.len() >= self.capacity {
            let Some((_, oldest)) = state.recency.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
            state.stats.evictions += 1;
            tracing::debug!(key = %oldest, "Evicted least recently used cache entry");
        }

        state.tick += 1;
        let tick = state.tick;
        state.recency.insert(tick, key);
        state.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                last_access: tick,
            },
        );
    }

    /// Return the cached value or run `refresh` once for this key.
    ///
    /// Concurrent callers missing on the same key join the running flight
    /// instead of starting their own and get its outcome. A failed refresh
    /// stores nothing, so the next caller after the flight ends retries.
    pub async fn get_or_refresh<F, Fut>(&self, key: CacheKey, refresh: F) -> AppResult<Consensus>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Consensus>>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let flight = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key).or_default())
        };
        let mut slot = flight.lock().await;
        if let Some(outcome) = slot.as_ref() {
            return outcome.clone();
        }

        // A flight that ended before this one started may have stored a value
        let cached = self.state.lock().await.lookup(&key, Instant::now());
        let outcome = match cached {
            Some(value) => Ok(value),
            None => {
                self.state.lock().await.stats.refreshes += 1;
                tracing::debug!(key = %key, "Refreshing cache entry");
                let result = refresh().await;
                match &result {
                    Ok(value) => self.put(key, value.clone()).await,
                    Err(e) => tracing::debug!(key = %key, "Cache refresh failed: {}", e),
                }
                result
            }
        };
        *slot = Some(outcome.clone());

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key).is_some_and(|f| Arc::ptr_eq(f, &flight)) {
            in_flight.remove(&key);
        }
        outcome
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
