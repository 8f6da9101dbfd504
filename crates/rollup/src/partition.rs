//! Partition lifecycle: create ahead of writes, drop after retention.

use crate::error::{Result, StoreResultExt};
use std::collections::HashSet;
use std::sync::Arc;
use valdash_core::{BucketLayout, Granularity};
use valdash_store::{Partition, RollupStore};

/// Creates and drops range partitions of the hourly and daily tables.
pub struct PartitionLifecycleManager {
    store: Arc<dyn RollupStore>,
    layout: BucketLayout,
}

impl PartitionLifecycleManager {
    pub fn new(store: Arc<dyn RollupStore>, layout: BucketLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// Partition that holds `epoch` at the given granularity.
    pub fn partition_for(&self, granularity: Granularity, epoch: u64) -> Partition {
        let range = self.layout.partition_range(granularity, epoch);
        match granularity {
            Granularity::Hourly => Partition::hourly(range),
            Granularity::Daily => Partition::daily(range, self.layout.days(range)),
        }
    }

    /// Create the partition if missing. Returns true when it was created.
    pub async fn ensure_partition(&self, partition: &Partition) -> Result<bool> {
        let created = self
            .store
            .ensure_partition(partition)
            .await
            .for_bucket("ensure_partition", partition.range)?;
        if created {
            tracing::info!(
                partition = %partition.name(),
                granularity = %partition.granularity,
                range = %partition.range,
                "Created partition"
            );
        }
        Ok(created)
    }

    /// Ensure the partition holding `epoch`, returning it and whether it was created.
    pub async fn ensure_partition_for(
        &self,
        granularity: Granularity,
        epoch: u64,
    ) -> Result<(Partition, bool)> {
        let partition = self.partition_for(granularity, epoch);
        let created = self.ensure_partition(&partition).await?;
        Ok((partition, created))
    }

    /// Drop the partition and its rows. A missing partition is not an error.
    pub async fn drop_partition(&self, partition: &Partition) -> Result<bool> {
        let dropped = self
            .store
            .drop_partition(partition)
            .await
            .for_bucket("drop_partition", partition.range)?;
        if dropped {
            tracing::info!(
                partition = %partition.name(),
                granularity = %partition.granularity,
                range = %partition.range,
                "Dropped expired partition"
            );
        }
        Ok(dropped)
    }

    /// Drop every partition that ends at or before `boundary`.
    ///
    /// Walks backward from `boundary` one bucket width at a time and stops
    /// after the candidate epoch falls below `oldest`, the lowest bucket start
    /// still stored. The partition containing `boundary` is never dropped.
    /// Returns the number of partitions that existed and were dropped.
    pub async fn reclaim_expired(
        &self,
        granularity: Granularity,
        boundary: u64,
        oldest: u64,
    ) -> Result<usize> {
        let width = self.layout.width(granularity);
        let mut visited = HashSet::new();
        let mut dropped = 0;
        let mut candidate = boundary;

        loop {
            let partition = self.partition_for(granularity, candidate);
            if partition.range.end <= boundary
                && visited.insert(partition.range)
                && self.drop_partition(&partition).await?
            {
                dropped += 1;
            }

            if candidate < oldest || candidate < width {
                break;
            }
            candidate -= width;
        }

        tracing::debug!(
            granularity = %granularity,
            boundary,
            oldest,
            dropped,
            "Reclaimed expired partitions"
        );
        Ok(dropped)
    }
}
