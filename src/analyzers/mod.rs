//! Aggregation passes over trip and vehicle-event records.
//!
//! Both passes bucket records onto the same temporal grid and intern their
//! coordinates into the summary's shared zone table, so trips and events
//! ingested into one [`Metrics`](crate::metrics::Metrics) line up by period
//! and zone.

pub mod events;
pub mod trips;
pub mod utility;

pub use events::{EventPassSummary, aggregate_events};
pub use trips::{TripPassSummary, aggregate_trips};
