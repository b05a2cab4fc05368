//! Shared types and models for the Weather Aggregator
//!
//! Domain types used by the aggregation backend: locations, provider
//! readings, reconciled consensus values and alert subscriptions.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
