use std::io;

use thiserror::Error;

use crate::types::{CutId, FieldName, ItemName};

/// Error type for shard resolution, stream decoding, and synchronization failures.
#[derive(Debug, Error)]
pub enum SharError {
    /// Invalid reader inputs (missing `cuts`, both or neither inputs, transform count).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A field lists a different number of shards than the cut manifests.
    #[error("expected {expected} shards for field '{field}' but found {found}")]
    ShardCountMismatch {
        /// Field whose shard list is off.
        field: FieldName,
        /// Number of cut manifest shards.
        expected: usize,
        /// Number of shards listed for `field`.
        found: usize,
    },
    /// A field item's name stem does not match the cut at the same position.
    #[error(
        "mismatched ids in shard '{shard}': cut id is '{cut_id}' but field '{field}' has item '{item_name}'"
    )]
    SynchronizationFault {
        /// Primary location of the shard.
        shard: String,
        /// Field that went out of step.
        field: FieldName,
        /// Cut read from the manifest.
        cut_id: CutId,
        /// Item read from the field stream.
        item_name: ItemName,
    },
    /// One stream of a shard ended before the others (strict policy only).
    #[error("stream for field '{field}' in shard '{shard}' ended before the other streams")]
    StreamExhausted {
        /// Primary location of the shard.
        shard: String,
        /// Field whose stream ended first; `cuts` when field items are left over.
        field: FieldName,
    },
    /// Undecodable manifest line.
    #[error("manifest '{location}' line {line}: {details}")]
    Manifest {
        /// Manifest location.
        location: String,
        /// One-based line number.
        line: usize,
        /// Decoder message.
        details: String,
    },
    /// Malformed or truncated field archive.
    #[error("archive '{location}' is malformed: {details}")]
    Archive {
        /// Archive location.
        location: String,
        /// What was wrong with the archive.
        details: String,
    },
    /// Invalid or incomplete node/worker topology.
    #[error("distributed context error: {0}")]
    Distributed(String),
    /// Underlying I/O failure (including failed pipe commands).
    #[error(transparent)]
    Io(#[from] io::Error),
}
