use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::constants::shar::DEFAULT_SHUFFLE_SEED;
use crate::data::Cut;
use crate::source::utilities::distributed::{DistributedContext, EnvContext};
use crate::transport::ShardLocation;
use crate::types::FieldName;

/// Per-shard cut transform applied right before a cut is yielded.
pub type CutTransform = Arc<dyn Fn(Cut) -> Cut + Send + Sync + 'static>;

/// Behavior when one stream of a shard ends before the others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// End the shard quietly at the first exhausted stream.
    #[default]
    Lenient,
    /// Fail with `SharError::StreamExhausted` unless all streams end together.
    Strict,
}

/// Configuration for a lazily-read sharded cut source.
///
/// Exactly one of `fields` or `in_dir` must be set.
#[derive(Clone)]
pub struct SharReaderConfig {
    /// Explicit mapping from field name to its ordered shard locations.
    pub fields: Option<IndexMap<FieldName, Vec<ShardLocation>>>,
    /// Directory holding `<field>.<shard>.<ext>` files.
    pub in_dir: Option<PathBuf>,
    /// Restrict iteration to this node/worker's subset of shards.
    pub split_for_dataloading: bool,
    /// Shuffle shard order at construction.
    pub shuffle_shards: bool,
    /// Seed for shard shuffling; identical across consumers of one job.
    pub seed: u64,
    /// Optional transforms, one per shard in original shard order.
    pub cut_transforms: Option<Vec<Option<CutTransform>>>,
    /// Stream exhaustion handling inside a shard.
    pub exhaustion: ExhaustionPolicy,
    /// Source of node/worker topology used when splitting.
    pub context: Arc<dyn DistributedContext>,
}

impl Default for SharReaderConfig {
    fn default() -> Self {
        Self {
            fields: None,
            in_dir: None,
            split_for_dataloading: false,
            shuffle_shards: false,
            seed: DEFAULT_SHUFFLE_SEED,
            cut_transforms: None,
            exhaustion: ExhaustionPolicy::default(),
            context: Arc::new(EnvContext),
        }
    }
}

impl SharReaderConfig {
    /// Read the fields named by `fields`, each with an ordered shard list.
    pub fn from_fields<I, K, L, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<FieldName>,
        L: IntoIterator<Item = S>,
        S: Into<ShardLocation>,
    {
        let fields = fields
            .into_iter()
            .map(|(field, locations)| {
                (
                    field.into(),
                    locations.into_iter().map(Into::into).collect(),
                )
            })
            .collect();
        Self {
            fields: Some(fields),
            ..Self::default()
        }
    }

    /// Discover fields and shards from a directory.
    pub fn from_dir(in_dir: impl Into<PathBuf>) -> Self {
        Self {
            in_dir: Some(in_dir.into()),
            ..Self::default()
        }
    }

    /// Enable or disable node/worker shard splitting.
    pub fn with_split_for_dataloading(mut self, split: bool) -> Self {
        self.split_for_dataloading = split;
        self
    }

    /// Enable shard shuffling with `seed`.
    pub fn with_shuffled_shards(mut self, seed: u64) -> Self {
        self.shuffle_shards = true;
        self.seed = seed;
        self
    }

    /// Set one transform per shard; `None` entries leave that shard's cuts untouched.
    pub fn with_cut_transforms(mut self, transforms: Vec<Option<CutTransform>>) -> Self {
        self.cut_transforms = Some(transforms);
        self
    }

    /// Override the exhaustion policy.
    pub fn with_exhaustion(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Override the distributed context (defaults to environment lookup).
    pub fn with_context(mut self, context: Arc<dyn DistributedContext>) -> Self {
        self.context = context;
        self
    }
}
