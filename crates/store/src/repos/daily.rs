//! UTC daily rollup repository.

use crate::error::StoreResult;
use crate::models::DailyRow;
use async_trait::async_trait;
use time::Date;
use valdash_core::EpochRange;

/// Repository for the partitioned daily table.
#[async_trait]
pub trait DailyRepo: Send + Sync {
    /// Fold hourly buckets starting in `bounds` into the rows for `day`,
    /// overwriting every column of existing rows. Returns the rows written.
    ///
    /// Fails with `StoreError::MissingPartition` when no partition covers `day`.
    async fn fold_day(&self, bounds: EpochRange, day: Date) -> StoreResult<u64>;

    /// Latest day bucket as `[epoch_start, epoch_end)`, where `epoch_end` is
    /// the coverage recorded by its last fold.
    async fn last_daily_bounds(&self) -> StoreResult<Option<EpochRange>>;

    /// Lowest daily `epoch_start`.
    async fn first_daily_epoch(&self) -> StoreResult<Option<u64>>;

    /// Rows for one UTC day, ordered by validator.
    async fn daily_rows(&self, day: Date) -> StoreResult<Vec<DailyRow>>;

    /// Distinct days present, oldest first.
    async fn daily_days(&self) -> StoreResult<Vec<Date>>;
}
