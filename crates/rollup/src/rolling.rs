//! Trailing 24h window over the hourly buckets.

use crate::bounds::EpochBoundsService;
use crate::error::{Result, StoreResultExt};
use crate::report::RollingReport;
use std::sync::Arc;
use std::time::Instant;
use valdash_core::EpochRange;
use valdash_store::RollupStore;

/// Recomputes the rolling 24h table from scratch on every refresh.
pub struct RollingWindowAggregator {
    store: Arc<dyn RollupStore>,
    bounds: Arc<dyn EpochBoundsService>,
}

impl RollingWindowAggregator {
    pub fn new(store: Arc<dyn RollupStore>, bounds: Arc<dyn EpochBoundsService>) -> Self {
        Self { store, bounds }
    }

    /// Replace the rolling table with the fold of the hourly buckets between
    /// the oldest bucket inside the last day and the hourly head.
    ///
    /// The replacement is a single transaction: on failure the previous
    /// snapshot stays visible.
    pub async fn refresh(&self) -> Result<RollingReport> {
        let started = Instant::now();

        let Some(head) = self.bounds.last_exported_hourly().await? else {
            self.store.clear_rolling().await.during("clear_rolling")?;
            tracing::debug!("No hourly data exported yet, rolling window is empty");
            return Ok(RollingReport::default());
        };
        let window_start = self
            .bounds
            .twenty_four_hour_old_hourly()
            .await?
            .unwrap_or(head.start);
        let window = EpochRange::new(window_start, head.end);

        let rows = self
            .store
            .replace_rolling(window_start, head.start)
            .await
            .for_bucket("replace_rolling", window)?;

        tracing::info!(
            window = %window,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refreshed rolling 24h window"
        );
        Ok(RollingReport {
            window: Some(window),
            rows_written: rows,
        })
    }
}
