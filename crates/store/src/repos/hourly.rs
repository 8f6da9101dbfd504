//! Hourly rollup repository.

use crate::error::StoreResult;
use crate::models::HourlyRow;
use async_trait::async_trait;
use valdash_core::EpochRange;

/// Repository for the partitioned hourly table.
#[async_trait]
pub trait HourlyRepo: Send + Sync {
    /// Fold per-epoch rows in `bucket` into hourly rows keyed by `bucket.start`,
    /// overwriting earlier folds of the same bucket. Returns the rows written.
    ///
    /// Fails with `StoreError::MissingPartition` when no partition covers
    /// `bucket.start`.
    async fn fold_hour(&self, bucket: EpochRange) -> StoreResult<u64>;

    /// Insert or overwrite hourly rows in a single transaction.
    async fn upsert_hourly_rows(&self, rows: &[HourlyRow]) -> StoreResult<()>;

    /// Latest hourly bucket as `[epoch_start, epoch_end)`, where `epoch_end`
    /// is the coverage recorded by its last fold.
    async fn last_hourly_bounds(&self) -> StoreResult<Option<EpochRange>>;

    /// Lowest hourly `epoch_start`.
    async fn first_hourly_epoch(&self) -> StoreResult<Option<u64>>;

    /// Lowest hourly `epoch_start` that is `>= epoch`.
    async fn first_hourly_start_at_or_after(&self, epoch: u64) -> StoreResult<Option<u64>>;

    /// Hourly rows whose `epoch_start` lies in `range`, ordered by bucket then validator.
    async fn hourly_rows(&self, range: EpochRange) -> StoreResult<Vec<HourlyRow>>;
}
