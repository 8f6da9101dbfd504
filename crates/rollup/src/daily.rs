//! Hourly buckets into UTC calendar-day buckets.

use crate::bounds::EpochBoundsService;
use crate::error::{Result, StoreResultExt};
use crate::partition::PartitionLifecycleManager;
use crate::report::{FoldReport, is_closed};
use std::sync::Arc;
use std::time::Instant;
use valdash_core::{BucketLayout, EpochRange, Granularity};
use valdash_store::RollupStore;

/// Folds the hourly table into the daily table.
pub struct DailyAggregator {
    store: Arc<dyn RollupStore>,
    bounds: Arc<dyn EpochBoundsService>,
    partitions: Arc<PartitionLifecycleManager>,
    layout: BucketLayout,
}

impl DailyAggregator {
    pub fn new(
        store: Arc<dyn RollupStore>,
        bounds: Arc<dyn EpochBoundsService>,
        partitions: Arc<PartitionLifecycleManager>,
    ) -> Self {
        let layout = *partitions.layout();
        Self {
            store,
            bounds,
            partitions,
            layout,
        }
    }

    /// Fold every open or new UTC day up to the day holding the hourly head.
    ///
    /// Starts at the latest stored day, or at the day holding the hourly head
    /// when the daily table is empty. Stops at the first failing day; days
    /// folded before it stay committed and the next pass resumes from there.
    pub async fn fold_forward(&self) -> Result<FoldReport> {
        let mut report = FoldReport::default();

        let Some(hourly_head) = self.bounds.last_exported_hourly().await? else {
            tracing::debug!("No hourly data exported yet, nothing to fold into days");
            return Ok(report);
        };
        let latest = self.bounds.last_exported_daily().await?;
        let mut candidate = latest.map_or(hourly_head.start, |latest| latest.start);
        let end_bound = self.layout.day_bounds(hourly_head.start).end;

        while candidate < end_bound {
            let bounds = self.layout.day_bounds(candidate);
            candidate = bounds.end;

            // A day closes once the hour holding its last epoch has closed,
            // even when that hour runs past midnight.
            let closes_at = self.layout.hour_bounds(bounds.end - 1).end;
            if is_closed(latest, bounds, closes_at) {
                tracing::debug!(bounds = %bounds, "Skipping closed day");
                report.buckets_skipped += 1;
                continue;
            }

            let (rows, created) = self.aggregate_one_day(bounds).await?;
            report.buckets_folded += 1;
            report.rows_written += rows;
            report.partitions_created += u64::from(created);
            report.last_bucket = Some(bounds);
        }

        Ok(report)
    }

    /// Fold the hourly buckets starting in `bounds` into one UTC day,
    /// creating the day partition first. Existing rows are overwritten.
    /// Returns the rows written and whether a partition was created.
    pub async fn aggregate_one_day(&self, bounds: EpochRange) -> Result<(u64, bool)> {
        let started = Instant::now();
        let (_, created) = self
            .partitions
            .ensure_partition_for(Granularity::Daily, bounds.start)
            .await?;

        let day = self.layout.clock().day_of(bounds.start);
        let rows = self
            .store
            .fold_day(bounds, day)
            .await
            .for_bucket("fold_day", bounds)?;

        tracing::info!(
            bounds = %bounds,
            day = %day,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregated UTC day"
        );
        Ok((rows, created))
    }
}
