//! Epoch and wall-clock conversion.

use crate::error::{Error, Result};
use time::{Date, Duration, OffsetDateTime, UtcOffset};

/// Seconds in one UTC calendar day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Chain clock mapping epoch indices to wall-clock time from genesis parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochTime {
    genesis: OffsetDateTime,
    seconds_per_slot: u64,
    slots_per_epoch: u64,
}

impl EpochTime {
    /// Create a clock from genesis parameters.
    ///
    /// The epoch duration must divide a day so that day buckets hold a whole
    /// number of epochs.
    pub fn new(
        genesis: OffsetDateTime,
        seconds_per_slot: u64,
        slots_per_epoch: u64,
    ) -> Result<Self> {
        if seconds_per_slot == 0 {
            return Err(Error::InvalidChainTiming(
                "seconds_per_slot must be > 0".to_string(),
            ));
        }

        if slots_per_epoch == 0 {
            return Err(Error::InvalidChainTiming(
                "slots_per_epoch must be > 0".to_string(),
            ));
        }

        let seconds_per_epoch = seconds_per_slot.checked_mul(slots_per_epoch).ok_or_else(|| {
            Error::InvalidChainTiming("seconds per epoch overflows u64".to_string())
        })?;

        if seconds_per_epoch > SECONDS_PER_DAY || SECONDS_PER_DAY % seconds_per_epoch != 0 {
            return Err(Error::InvalidChainTiming(format!(
                "seconds per epoch ({seconds_per_epoch}) must evenly divide a day"
            )));
        }

        Ok(Self {
            genesis: genesis.to_offset(UtcOffset::UTC),
            seconds_per_slot,
            slots_per_epoch,
        })
    }

    /// Create a clock from a genesis unix timestamp.
    pub fn from_unix(
        genesis_timestamp: i64,
        seconds_per_slot: u64,
        slots_per_epoch: u64,
    ) -> Result<Self> {
        let genesis = OffsetDateTime::from_unix_timestamp(genesis_timestamp).map_err(|e| {
            Error::InvalidChainTiming(format!("invalid genesis timestamp {genesis_timestamp}: {e}"))
        })?;
        Self::new(genesis, seconds_per_slot, slots_per_epoch)
    }

    /// Genesis instant in UTC.
    pub fn genesis(&self) -> OffsetDateTime {
        self.genesis
    }

    pub fn seconds_per_slot(&self) -> u64 {
        self.seconds_per_slot
    }

    pub fn slots_per_epoch(&self) -> u64 {
        self.slots_per_epoch
    }

    pub fn seconds_per_epoch(&self) -> u64 {
        self.seconds_per_slot * self.slots_per_epoch
    }

    /// Number of epochs in one UTC day.
    pub fn epochs_per_day(&self) -> u64 {
        SECONDS_PER_DAY / self.seconds_per_epoch()
    }

    /// Wall-clock start time of the given epoch.
    pub fn to_time(&self, epoch: u64) -> OffsetDateTime {
        let secs = i64::try_from(epoch.saturating_mul(self.seconds_per_epoch())).unwrap_or(i64::MAX);
        self.genesis.saturating_add(Duration::seconds(secs))
    }

    /// UTC calendar date on which the given epoch starts.
    pub fn day_of(&self, epoch: u64) -> Date {
        self.to_time(epoch).date()
    }

    /// Whole epochs between the UTC midnight preceding genesis and genesis itself.
    ///
    /// Adding this offset to an epoch index moves it into a space where
    /// multiples of `epochs_per_day` fall on UTC midnight.
    pub fn genesis_utc_offset_epochs(&self) -> u64 {
        let (hour, minute, second) = self.genesis.time().as_hms();
        let since_midnight = u64::from(hour) * 3600 + u64::from(minute) * 60 + u64::from(second);
        since_midnight / self.seconds_per_epoch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    /// Ethereum mainnet genesis (2020-12-01 12:00:23 UTC).
    fn mainnet() -> EpochTime {
        EpochTime::from_unix(1_606_824_023, 12, 32).expect("valid params")
    }

    #[test]
    fn test_mainnet_epochs_per_day() {
        let clock = mainnet();
        assert_eq!(clock.seconds_per_epoch(), 384);
        assert_eq!(clock.epochs_per_day(), 225);
    }

    #[test]
    fn test_to_time_and_back() {
        let clock = mainnet();
        assert_eq!(clock.to_time(0), datetime!(2020-12-01 12:00:23 UTC));
        assert_eq!(clock.to_time(225), datetime!(2020-12-02 12:00:23 UTC));
    }

    #[test]
    fn test_mainnet_utc_offset() {
        // 12:00:23 is 43223s after midnight, 112 whole epochs of 384s.
        assert_eq!(mainnet().genesis_utc_offset_epochs(), 112);
    }

    #[test]
    fn test_offset_is_zero_for_midnight_genesis() {
        let clock = EpochTime::new(datetime!(2024-01-01 00:00 UTC), 90, 32).expect("valid params");
        assert_eq!(clock.genesis_utc_offset_epochs(), 0);
        assert_eq!(clock.epochs_per_day(), 30);
    }

    #[test]
    fn test_day_of() {
        let clock = mainnet();
        assert_eq!(clock.day_of(0), date!(2020 - 12 - 01));
        // 113 epochs after genesis is just past midnight on the next day.
        assert_eq!(clock.day_of(113), date!(2020 - 12 - 02));
        assert_eq!(clock.day_of(112), date!(2020 - 12 - 01));
    }

    #[test]
    fn test_genesis_normalized_to_utc() {
        let genesis = datetime!(2024-01-01 02:00 +02:00);
        let clock = EpochTime::new(genesis, 90, 32).expect("valid params");
        assert_eq!(clock.genesis(), datetime!(2024-01-01 00:00 UTC));
        assert_eq!(clock.genesis_utc_offset_epochs(), 0);
    }

    #[test]
    fn test_rejects_zero_seconds_per_slot() {
        let err = EpochTime::from_unix(0, 0, 32).expect_err("should fail");
        assert!(err.to_string().contains("seconds_per_slot"));
    }

    #[test]
    fn test_rejects_zero_slots_per_epoch() {
        let err = EpochTime::from_unix(0, 12, 0).expect_err("should fail");
        assert!(err.to_string().contains("slots_per_epoch"));
    }

    #[test]
    fn test_rejects_epoch_not_dividing_day() {
        // 7 * 11 = 77 seconds does not divide 86400.
        let err = EpochTime::from_unix(0, 7, 11).expect_err("should fail");
        assert!(err.to_string().contains("evenly divide a day"));
    }
}
