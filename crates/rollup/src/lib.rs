//! Multi-granularity rollups of validator dashboard data.
//!
//! Per-epoch validator records are folded into:
//! - genesis-aligned hourly buckets ([`HourlyAggregator`])
//! - a rolling 24h window recomputed on every pass ([`RollingWindowAggregator`])
//! - UTC calendar-day buckets ([`DailyAggregator`])
//!
//! [`RollupCoordinator::fold_hourly`] folds new epochs into hours and
//! [`RollupCoordinator::run_pass`] runs the rolling refresh, the daily fold
//! and partition retention in order. Both take the same lock. Partitions are created ahead of writes
//! and dropped once fully behind the retention horizon
//! ([`PartitionLifecycleManager`]).

pub mod bounds;
pub mod coordinator;
pub mod daily;
pub mod error;
pub mod hourly;
pub mod partition;
pub mod report;
pub mod rolling;

pub use bounds::{EpochBoundsService, StoreEpochBounds};
pub use coordinator::{RetentionPolicy, RollupCoordinator};
pub use daily::DailyAggregator;
pub use error::{PassStep, Result, RollupError};
pub use hourly::HourlyAggregator;
pub use partition::PartitionLifecycleManager;
pub use report::{FoldReport, PassReport, RollingReport, StepTimings};
pub use rolling::RollingWindowAggregator;
