//! Pairs temperature and humidity readings from Bluetooth RHT gadgets and
//! logs the combined values.
//!
//! [`aggregator::RhtAggregator`] is the pairing engine; the remaining modules
//! are the scanning, live-value and history plumbing used by the service
//! binary.

pub mod aggregator;
pub mod bluetooth;
pub mod bounds;
pub mod config;
pub mod database;
pub mod error;
pub mod history;
pub mod live;
pub mod models;
pub mod utils;

pub use aggregator::RhtAggregator;
pub use error::AggregationError;
pub use models::{MeasurementKind, Reading, RhtDataPoint};
