#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Reader configuration types.
pub mod config;
/// Centralized constants for file naming, transports, and topology lookup.
pub mod constants;
/// Cut and field value types.
pub mod data;
/// Reusable command-line runners.
pub mod example_apps;
mod rng;
/// Cut source traits and the sharded reader.
pub mod source;
/// Input transports used by sources (local files, gzip, shell pipes).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// File name helpers.
pub mod utils;

mod errors;

#[cfg(test)]
mod test_support;

pub use config::{CutTransform, ExhaustionPolicy, SharReaderConfig};
pub use data::{ArchiveItem, Cut, FieldValue};
pub use errors::SharError;
pub use source::backends::{
    FieldItem, FieldStream, JsonlFieldStream, TarFieldStream, open_field_stream,
};
pub use source::indexing::{ShardDescriptor, ShardResolver};
pub use source::utilities::distributed::{
    DistributedContext, EnvContext, Topology, split_for_dataloading,
};
pub use source::{CutIter, CutSource, InMemoryCuts, LazyCutChain, LazySharSource, SharIter};
pub use transport::ShardLocation;
pub use transport::fs::count_newlines;
pub use types::{Attributes, CutId, FieldName, ItemName};
