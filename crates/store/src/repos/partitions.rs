//! Partition DDL repository.

use crate::error::StoreResult;
use crate::models::Partition;
use async_trait::async_trait;
use valdash_core::Granularity;

/// Repository for creating and dropping rollup table partitions.
#[async_trait]
pub trait PartitionRepo: Send + Sync {
    /// Create the partition if it does not exist. Returns true when created.
    async fn ensure_partition(&self, partition: &Partition) -> StoreResult<bool>;

    /// Drop the partition and every row in it. Returns true when it existed.
    async fn drop_partition(&self, partition: &Partition) -> StoreResult<bool>;

    /// Whether the partition exists.
    async fn partition_exists(&self, partition: &Partition) -> StoreResult<bool>;

    /// Names of the existing partitions of a rollup table, sorted.
    async fn list_partitions(&self, granularity: Granularity) -> StoreResult<Vec<String>>;
}
