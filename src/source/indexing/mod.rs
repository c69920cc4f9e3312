/// Field/shard discovery and descriptor construction.
pub mod shard_index;

pub use shard_index::{ShardDescriptor, ShardResolver};
