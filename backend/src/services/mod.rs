//! Business logic services for the Weather Aggregator

pub mod aggregation;
pub mod alerts;
pub mod cache;
pub mod notification;
pub mod profile;
pub mod reconciliation;
pub mod trending;

pub use aggregation::AggregationService;
pub use alerts::AlertEvaluator;
pub use cache::{CacheKey, CacheStats, ConsensusCache};
pub use notification::{AlertOutbox, LogNotificationSink, NotificationSink};
pub use profile::UserProfileService;
pub use reconciliation::ReconciliationEngine;
pub use trending::TrendingTracker;
