//! Scheduler for the validator dashboard rollups.
//!
//! This crate drives the rollups on a fixed interval:
//! - Hourly fold of newly exported epochs
//! - Coordinator pass (rolling window, daily fold, retention)
//! - Prometheus metrics and a database health check

pub mod metrics;
pub mod routes;
pub mod scheduler;

pub use routes::create_router;
pub use scheduler::{run_scheduler, run_tick};
