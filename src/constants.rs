/// Constants describing the on-disk shard layout.
pub mod shar {
    /// Field carrying cut identity and shard ordering.
    pub const PRIMARY_FIELD: &str = "cuts";
    /// Suffix that marks a line-oriented manifest.
    pub const MANIFEST_SUFFIX: &str = "jsonl";
    /// Suffix that marks a binary tar archive.
    pub const ARCHIVE_SUFFIX: &str = "tar";
    /// Suffix used for pseudo item names produced from field manifests.
    pub const ADAPTED_ITEM_SUFFIX: &str = "dummy";
    /// Key holding the owning cut id in field manifests.
    pub const FIELD_MANIFEST_CUT_ID_KEY: &str = "cut_id";
    /// Suffix of the metadata member that follows each data member in an archive.
    pub const ARCHIVE_META_SUFFIX: &str = "json";
    /// Data member suffix marking an archive placeholder.
    pub const ARCHIVE_NODATA_SUFFIX: &str = "nodata";
    /// Metadata member suffix marking an archive placeholder.
    pub const ARCHIVE_NOMETA_SUFFIX: &str = "nometa";
    /// Default seed used when shuffling shards.
    pub const DEFAULT_SHUFFLE_SEED: u64 = 42;
}

/// Constants used by shard location transports.
pub mod transport {
    /// Prefix selecting a shell command whose stdout is the shard stream.
    pub const PIPE_PREFIX: &str = "pipe:";
    /// Suffix marking gzip-compressed streams.
    pub const GZIP_SUFFIX: &str = "gz";
    /// Read buffer size used by newline counting.
    pub const COUNT_BUFFER_BYTES: usize = 1 << 16;
}

/// Environment variables consulted by the ambient distributed context.
pub mod distributed {
    /// Number of nodes taking part in the job.
    pub const NODE_COUNT_ENV: &str = "WORLD_SIZE";
    /// Index of this node within the job.
    pub const NODE_INDEX_ENV: &str = "RANK";
    /// Number of dataloading workers on this node.
    pub const WORKER_COUNT_ENV: &str = "SHAR_WORKER_COUNT";
    /// Index of this worker within the node.
    pub const WORKER_INDEX_ENV: &str = "SHAR_WORKER_INDEX";
}
