//! Rolling 24h window repository.

use crate::error::StoreResult;
use crate::models::RollingRow;
use async_trait::async_trait;

/// Repository for the rolling 24h table.
#[async_trait]
pub trait RollingRepo: Send + Sync {
    /// Atomically replace the table with the fold of hourly buckets starting
    /// in `[window_start, head_start]`. Returns the rows written.
    ///
    /// Readers observe either the previous snapshot or the new one.
    async fn replace_rolling(&self, window_start: u64, head_start: u64) -> StoreResult<u64>;

    /// Atomically replace the table with an empty snapshot.
    async fn clear_rolling(&self) -> StoreResult<()>;

    /// Current snapshot, ordered by validator.
    async fn rolling_rows(&self) -> StoreResult<Vec<RollingRow>>;
}
