//! Per-epoch rows into genesis-aligned hourly buckets.

use crate::bounds::EpochBoundsService;
use crate::error::{Result, StoreResultExt};
use crate::partition::PartitionLifecycleManager;
use crate::report::{FoldReport, is_closed};
use std::sync::Arc;
use std::time::Instant;
use valdash_core::{BucketLayout, EpochRange, Granularity};
use valdash_store::RollupStore;

/// Folds the per-epoch source table into the hourly table.
pub struct HourlyAggregator {
    store: Arc<dyn RollupStore>,
    bounds: Arc<dyn EpochBoundsService>,
    partitions: Arc<PartitionLifecycleManager>,
    layout: BucketLayout,
}

impl HourlyAggregator {
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

    /// Fold every open or new hourly bucket up to the source head.
    ///
    /// Starts at the latest stored hourly bucket, or at the first source
    /// epoch when the hourly table is empty. The latest bucket is skipped
    /// when it is already closed. Stops at the first failing bucket; buckets
    /// folded before it stay committed.
    pub async fn fold_forward(&self) -> Result<FoldReport> {
        let mut report = FoldReport::default();

        let Some(head_epoch) = self.bounds.last_exported_epoch().await? else {
            tracing::debug!("No epoch data exported yet, nothing to fold into hourly buckets");
            return Ok(report);
        };
        let latest = self.bounds.last_exported_hourly().await?;
        let mut candidate = match latest {
            Some(latest) => latest.start,
            None => self
                .bounds
                .first_exported_epoch()
                .await?
                .unwrap_or(head_epoch),
        };
        let end_bound = self.layout.hour_bounds(head_epoch).end;

        while candidate < end_bound {
            let bounds = self.layout.hour_bounds(candidate);
            candidate = bounds.end;

            if is_closed(latest, bounds, bounds.end) {
                tracing::debug!(bounds = %bounds, "Skipping closed hourly bucket");
                report.buckets_skipped += 1;
                continue;
            }

            let (rows, created) = self.aggregate_one_hour(bounds).await?;
            report.buckets_folded += 1;
            report.rows_written += rows;
            report.partitions_created += u64::from(created);
            report.last_bucket = Some(bounds);
        }

        Ok(report)
    }

    /// Fold one hourly bucket, creating its partition first.
    /// Returns the rows written and whether a partition was created.
    pub async fn aggregate_one_hour(&self, bounds: EpochRange) -> Result<(u64, bool)> {
        let started = Instant::now();
        let (_, created) = self
            .partitions
            .ensure_partition_for(Granularity::Hourly, bounds.start)
            .await?;

        let rows = self
            .store
            .fold_hour(bounds)
            .await
            .for_bucket("fold_hour", bounds)?;

        tracing::info!(
            bounds = %bounds,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregated hourly bucket"
        );
        Ok((rows, created))
    }
}
