//! Bucket and partition arithmetic.
//!
//! Hourly buckets are aligned to genesis. Daily buckets and daily partitions
//! are aligned to UTC midnight by shifting epochs by the genesis UTC offset
//! before flooring and shifting back afterwards.

use crate::config::RollupConfig;
use crate::epoch::EpochTime;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::Date;

/// Half-open epoch range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochRange {
    pub start: u64,
    pub end: u64,
}

impl EpochRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, epoch: u64) -> bool {
        epoch >= self.start && epoch < self.end
    }
}

impl fmt::Display for EpochRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Half-open range of UTC calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayRange {
    pub start: Date,
    pub end: Date,
}

/// Rollup granularity backed by a partitioned table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket widths, partition widths and calendar alignment for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketLayout {
    clock: EpochTime,
    hourly_width: u64,
    daily_width: u64,
    utc_offset: u64,
    hourly_partition_buckets: u64,
    daily_partition_buckets: u64,
}

impl BucketLayout {
    /// Create a layout. The daily width is always one UTC day of epochs.
    pub fn new(
        clock: EpochTime,
        hourly_width: u64,
        hourly_partition_buckets: u64,
        daily_partition_buckets: u64,
    ) -> Result<Self> {
        let daily_width = clock.epochs_per_day();

        if hourly_width == 0 {
            return Err(Error::InvalidLayout(
                "hourly width must be > 0 epochs".to_string(),
            ));
        }
        if hourly_width > daily_width {
            return Err(Error::InvalidLayout(format!(
                "hourly width ({hourly_width}) exceeds the daily width ({daily_width})"
            )));
        }
        if hourly_partition_buckets == 0 || daily_partition_buckets == 0 {
            return Err(Error::InvalidLayout(
                "partitions must hold at least one bucket".to_string(),
            ));
        }

        Ok(Self {
            clock,
            hourly_width,
            daily_width,
            utc_offset: clock.genesis_utc_offset_epochs(),
            hourly_partition_buckets,
            daily_partition_buckets,
        })
    }

    /// Build the layout from rollup configuration, deriving the hourly width
    /// from the chain clock when it is not configured.
    pub fn from_config(clock: EpochTime, config: &RollupConfig) -> Result<Self> {
        let hourly_width = config
            .hourly_width_epochs
            .unwrap_or_else(|| (clock.epochs_per_day() / 24).max(1));
        Self::new(
            clock,
            hourly_width,
            config.hourly_partition_buckets,
            config.daily_partition_buckets,
        )
    }

    pub fn clock(&self) -> &EpochTime {
        &self.clock
    }

    pub fn hourly_width(&self) -> u64 {
        self.hourly_width
    }

    pub fn daily_width(&self) -> u64 {
        self.daily_width
    }

    pub fn utc_offset(&self) -> u64 {
        self.utc_offset
    }

    /// Bucket width in epochs for a granularity.
    pub fn width(&self, granularity: Granularity) -> u64 {
        match granularity {
            Granularity::Hourly => self.hourly_width,
            Granularity::Daily => self.daily_width,
        }
    }

    /// Partition width in epochs for a granularity.
    pub fn partition_width(&self, granularity: Granularity) -> u64 {
        match granularity {
            Granularity::Hourly => self.hourly_width * self.hourly_partition_buckets,
            Granularity::Daily => self.daily_width * self.daily_partition_buckets,
        }
    }

    /// Hourly bucket containing `epoch`.
    pub fn hour_bounds(&self, epoch: u64) -> EpochRange {
        let start = epoch / self.hourly_width * self.hourly_width;
        EpochRange::new(start, start + self.hourly_width)
    }

    /// UTC day bucket containing `epoch`.
    pub fn day_bounds(&self, epoch: u64) -> EpochRange {
        self.utc_aligned(epoch, self.daily_width)
    }

    /// Epoch range of the partition holding `epoch` at the given granularity.
    pub fn partition_range(&self, granularity: Granularity, epoch: u64) -> EpochRange {
        let width = self.partition_width(granularity);
        match granularity {
            Granularity::Hourly => {
                let start = epoch / width * width;
                EpochRange::new(start, start + width)
            }
            Granularity::Daily => self.utc_aligned(epoch, width),
        }
    }

    /// Calendar days covered by an epoch range whose boundaries fall on UTC days.
    pub fn days(&self, range: EpochRange) -> DayRange {
        DayRange {
            start: self.clock.day_of(range.start),
            end: self.clock.day_of(range.end),
        }
    }

    // Floors in UTC-aligned space. A start before genesis saturates at epoch 0.
    fn utc_aligned(&self, epoch: u64, width: u64) -> EpochRange {
        let shifted = epoch + self.utc_offset;
        let start = shifted / width * width;
        EpochRange::new(
            start.saturating_sub(self.utc_offset),
            start + width - self.utc_offset,
        )
    }
}
