/// Lazy sharded cut source (facade over resolution, splitting and merging).
pub mod shar_source;
/// Per-shard lockstep merge of cuts and field streams.
pub mod shard_merge;
