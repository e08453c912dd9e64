//! Partitioning of abundance tables into kept and removed parts.

mod partitioner;
mod reconstruction;

pub use partitioner::{partition, partition_from_split, Partition, PartitionStats};
pub use reconstruction::{verify_reconstruction, DEFAULT_TOLERANCE};
