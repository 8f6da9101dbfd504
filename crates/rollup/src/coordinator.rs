//! One full rollup pass under mutual exclusion.

use crate::bounds::{EpochBoundsService, StoreEpochBounds};
use crate::daily::DailyAggregator;
use crate::error::{PassStep, Result};
use crate::hourly::HourlyAggregator;
use crate::partition::PartitionLifecycleManager;
use crate::report::{FoldReport, PassReport};
use crate::rolling::RollingWindowAggregator;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use valdash_core::config::RollupConfig;
use valdash_core::{BucketLayout, EpochTime, Granularity};
use valdash_store::RollupStore;

/// How far behind the hourly head partitions are kept, in epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub hourly_epochs: u64,
    /// Daily partitions are kept forever when unset.
    pub daily_epochs: Option<u64>,
}

impl RetentionPolicy {
    pub fn from_config(config: &RollupConfig, clock: &EpochTime) -> Self {
        Self {
            hourly_epochs: config.hourly_retention(clock),
            daily_epochs: config.daily_retention_epochs,
        }
    }
}

/// Runs rolling refresh, daily fold and retention cleanup as one pass.
///
/// Passes and hourly folds are serialized by an in-process mutex. Two
/// processes running against the same tables are not coordinated.
pub struct RollupCoordinator {
    bounds: Arc<dyn EpochBoundsService>,
    partitions: Arc<PartitionLifecycleManager>,
    rolling: RollingWindowAggregator,
    daily: DailyAggregator,
    hourly: HourlyAggregator,
    retention: RetentionPolicy,
    pass_lock: Mutex<()>,
}

impl RollupCoordinator {
    /// Wire the aggregators over one store.
    pub fn new(store: Arc<dyn RollupStore>, layout: BucketLayout, retention: RetentionPolicy) -> Self {
        let bounds: Arc<dyn EpochBoundsService> =
            Arc::new(StoreEpochBounds::new(store.clone(), *layout.clock()));
        Self::with_bounds(store, bounds, layout, retention)
    }

    /// Build the layout and retention from configuration.
    pub fn from_config(
        store: Arc<dyn RollupStore>,
        clock: EpochTime,
        config: &RollupConfig,
    ) -> Result<Self> {
        let layout = BucketLayout::from_config(clock, config)?;
        let retention = RetentionPolicy::from_config(config, &clock);
        Ok(Self::new(store, layout, retention))
    }

    /// Wire the aggregators with a caller-provided bounds service.
    pub fn with_bounds(
        store: Arc<dyn RollupStore>,
        bounds: Arc<dyn EpochBoundsService>,
        layout: BucketLayout,
        retention: RetentionPolicy,
    ) -> Self {
        let partitions = Arc::new(PartitionLifecycleManager::new(store.clone(), layout));
        Self {
            rolling: RollingWindowAggregator::new(store.clone(), bounds.clone()),
            daily: DailyAggregator::new(store.clone(), bounds.clone(), partitions.clone()),
            hourly: HourlyAggregator::new(store, bounds.clone(), partitions.clone()),
            bounds,
            partitions,
            retention,
            pass_lock: Mutex::new(()),
        }
    }

    /// Fold new epochs into hourly buckets under the pass lock, so it never
    /// overlaps another hourly fold or a pass.
    pub async fn fold_hourly(&self) -> Result<FoldReport> {
        let _guard = self.pass_lock.lock().await;
        self.hourly.fold_forward().await
    }

    pub fn partitions(&self) -> &PartitionLifecycleManager {
        &self.partitions
    }

    /// Run one pass: rolling refresh, daily fold, then retention cleanup.
    ///
    /// Each step commits on its own. A failing step aborts the pass with the
    /// step named in the error; earlier steps stay committed.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let _guard = self.pass_lock.lock().await;
        let mut report = PassReport::default();

        let started = Instant::now();
        report.rolling = self
            .rolling
            .refresh()
            .await
            .map_err(|e| e.in_step(PassStep::Rolling))?;
        report.timings.rolling = started.elapsed();

        let started = Instant::now();
        report.daily = self
            .daily
            .fold_forward()
            .await
            .map_err(|e| e.in_step(PassStep::Daily))?;
        report.timings.daily = started.elapsed();

        let started = Instant::now();
        report.hourly_partitions_dropped = self
            .reclaim(Granularity::Hourly, Some(self.retention.hourly_epochs))
            .await
            .map_err(|e| e.in_step(PassStep::HourlyRetention))?;
        report.daily_partitions_dropped = self
            .reclaim(Granularity::Daily, self.retention.daily_epochs)
            .await
            .map_err(|e| e.in_step(PassStep::DailyRetention))?;
        report.timings.retention = started.elapsed();

        tracing::info!(
            rolling_rows = report.rolling.rows_written,
            days_folded = report.daily.buckets_folded,
            days_skipped = report.daily.buckets_skipped,
            hourly_partitions_dropped = report.hourly_partitions_dropped,
            daily_partitions_dropped = report.daily_partitions_dropped,
            rolling_ms = report.timings.rolling.as_millis() as u64,
            daily_ms = report.timings.daily.as_millis() as u64,
            retention_ms = report.timings.retention.as_millis() as u64,
            "Rollup pass complete"
        );
        Ok(report)
    }

    // Retention is measured from the hourly head for both granularities.
    async fn reclaim(&self, granularity: Granularity, retention: Option<u64>) -> Result<usize> {
        let Some(retention) = retention else {
            return Ok(0);
        };
        let Some(head) = self.bounds.last_exported_hourly().await? else {
            return Ok(0);
        };
        let Some(boundary) = head.start.checked_sub(retention) else {
            tracing::debug!(
                granularity = %granularity,
                head = head.start,
                retention,
                "Head is younger than the retention horizon, nothing to reclaim"
            );
            return Ok(0);
        };
        let oldest = match granularity {
            Granularity::Hourly => self.bounds.min_old_hourly_epoch().await?,
            Granularity::Daily => self.bounds.min_old_daily_epoch().await?,
        };
        let Some(oldest) = oldest else {
            return Ok(0);
        };

        self.partitions
            .reclaim_expired(granularity, boundary, oldest)
            .await
    }
}
