//! Per-epoch source table repository.

use crate::error::StoreResult;
use crate::models::EpochRow;
use async_trait::async_trait;

/// Repository for the per-epoch rows written upstream.
#[async_trait]
pub trait EpochRepo: Send + Sync {
    /// Insert or overwrite per-epoch rows in a single transaction.
    async fn upsert_epoch_rows(&self, rows: &[EpochRow]) -> StoreResult<()>;

    /// Lowest epoch with data.
    async fn first_epoch(&self) -> StoreResult<Option<u64>>;

    /// Highest epoch with data.
    async fn last_epoch(&self) -> StoreResult<Option<u64>>;
}
