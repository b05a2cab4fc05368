//! Domain models for the Weather Aggregator

mod alert;
mod consensus;
mod location;
mod reading;

pub use alert::*;
pub use consensus::*;
pub use location::*;
pub use reading::*;
