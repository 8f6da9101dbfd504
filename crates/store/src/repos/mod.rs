//! Repository traits for rollup table operations.

pub mod daily;
pub mod epochs;
pub mod hourly;
pub mod partitions;
pub mod rolling;

pub use daily::DailyRepo;
pub use epochs::EpochRepo;
pub use hourly::HourlyRepo;
pub use partitions::PartitionRepo;
pub use rolling::RollingRepo;
