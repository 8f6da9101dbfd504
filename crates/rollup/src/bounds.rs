//! Read-only bounds over the rollup tables.

use crate::error::{Result, StoreResultExt};
use async_trait::async_trait;
use std::sync::Arc;
use valdash_core::{EpochRange, EpochTime};
use valdash_store::RollupStore;

/// Where each rollup table currently stands. `None` means "no data yet",
/// which callers treat as a bootstrap condition rather than an error.
#[async_trait]
pub trait EpochBoundsService: Send + Sync {
    /// Highest epoch in the per-epoch source table.
    async fn last_exported_epoch(&self) -> Result<Option<u64>>;

    /// Lowest epoch in the per-epoch source table.
    async fn first_exported_epoch(&self) -> Result<Option<u64>>;

    /// Latest hourly bucket with its recorded coverage.
    async fn last_exported_hourly(&self) -> Result<Option<EpochRange>>;

    /// Oldest hourly bucket start still stored.
    async fn min_old_hourly_epoch(&self) -> Result<Option<u64>>;

    /// Oldest hourly bucket start at or after `head.end - epochs_per_day`.
    async fn twenty_four_hour_old_hourly(&self) -> Result<Option<u64>>;

    /// Latest daily bucket with its recorded coverage.
    async fn last_exported_daily(&self) -> Result<Option<EpochRange>>;

    /// Oldest daily bucket start still stored.
    async fn min_old_daily_epoch(&self) -> Result<Option<u64>>;
}

/// Bounds backed by a rollup store.
pub struct StoreEpochBounds {
    store: Arc<dyn RollupStore>,
    clock: EpochTime,
}

impl StoreEpochBounds {
    pub fn new(store: Arc<dyn RollupStore>, clock: EpochTime) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl EpochBoundsService for StoreEpochBounds {
    async fn last_exported_epoch(&self) -> Result<Option<u64>> {
        self.store.last_epoch().await.during("last_exported_epoch")
    }

    async fn first_exported_epoch(&self) -> Result<Option<u64>> {
        self.store.first_epoch().await.during("first_exported_epoch")
    }

    async fn last_exported_hourly(&self) -> Result<Option<EpochRange>> {
        self.store
            .last_hourly_bounds()
            .await
            .during("last_exported_hourly")
    }

    async fn min_old_hourly_epoch(&self) -> Result<Option<u64>> {
        self.store
            .first_hourly_epoch()
            .await
            .during("min_old_hourly_epoch")
    }

    async fn twenty_four_hour_old_hourly(&self) -> Result<Option<u64>> {
        let Some(head) = self.last_exported_hourly().await? else {
            return Ok(None);
        };
        let cutoff = head.end.saturating_sub(self.clock.epochs_per_day());
        self.store
            .first_hourly_start_at_or_after(cutoff)
            .await
            .during("twenty_four_hour_old_hourly")
    }

    async fn last_exported_daily(&self) -> Result<Option<EpochRange>> {
        self.store
            .last_daily_bounds()
            .await
            .during("last_exported_daily")
    }

    async fn min_old_daily_epoch(&self) -> Result<Option<u64>> {
        self.store
            .first_daily_epoch()
            .await
            .during("min_old_daily_epoch")
    }
}
