//! Core domain types and shared logic for the validator dashboard rollups.
//!
//! This crate defines the arithmetic every other crate relies on:
//! - Epoch to wall-clock conversion and the genesis UTC offset
//! - Hourly and UTC-daily bucket bounds
//! - Partition ranges for the partitioned rollup tables
//! - Metric columns and their merge classes
//! - Configuration shared by the store, rollup and exporter crates

pub mod bucket;
pub mod config;
pub mod epoch;
pub mod error;
pub mod metrics;

pub use bucket::{BucketLayout, DayRange, EpochRange, Granularity};
pub use epoch::{EpochTime, SECONDS_PER_DAY};
pub use error::{Error, Result};
pub use metrics::MergeClass;
