use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::config::{CutTransform, ExhaustionPolicy, SharReaderConfig};
use crate::data::Cut;
use crate::errors::SharError;
use crate::rng::seeded_shuffle;
use crate::source::indexing::{ShardDescriptor, ShardResolver};
use crate::source::sources::shard_merge::ShardMerge;
use crate::source::utilities::distributed::{DistributedContext, split_for_dataloading};
use crate::source::{CutIter, CutSource};
use crate::transport::fs::count_newlines;
use crate::types::FieldName;

/// Cut source reading a sharded dataset: one cut manifest plus zero or more
/// field archives per shard.
///
/// Nothing is opened at construction. Each call to [`LazySharSource::iter`]
/// walks the (optionally split) shard list and keeps only the current shard's
/// streams open:
///
/// ```no_run
/// use lazy_shar::{LazySharSource, SharReaderConfig};
///
/// let source = LazySharSource::new(SharReaderConfig::from_dir("data/shar"))?;
/// for cut in &source {
///     let cut = cut?;
///     println!("{} has fields {:?}", cut.id, cut.fields.keys());
/// }
/// # Ok::<(), lazy_shar::SharError>(())
/// ```
pub struct LazySharSource {
    resolver: ShardResolver,
    fields: Vec<FieldName>,
    shards: Vec<ShardDescriptor>,
    split_for_dataloading: bool,
    transforms: Arc<[Option<CutTransform>]>,
    exhaustion: ExhaustionPolicy,
    context: Arc<dyn DistributedContext>,
    len: OnceLock<usize>,
}

impl LazySharSource {
    /// Resolve shards, validate counts, and optionally shuffle shard order.
    pub fn new(config: SharReaderConfig) -> Result<Self, SharError> {
        let resolver = ShardResolver::resolve(config.fields, config.in_dir.as_deref())?;
        let num_shards = resolver.num_shards();
        let transforms: Arc<[Option<CutTransform>]> = match config.cut_transforms {
            Some(transforms) if transforms.len() != num_shards => {
                return Err(SharError::Configuration(format!(
                    "expected {num_shards} cut transforms (one per shard) but got {}",
                    transforms.len()
                )));
            }
            Some(transforms) => transforms.into(),
            None => vec![None; num_shards].into(),
        };

        let mut shards = resolver.descriptors();
        if config.shuffle_shards {
            seeded_shuffle(&mut shards, config.seed);
        }
        let fields = resolver.fields();
        info!(
            num_shards,
            fields = ?fields,
            shuffled = config.shuffle_shards,
            split = config.split_for_dataloading,
            "sharded cut source ready"
        );
        Ok(Self {
            resolver,
            fields,
            shards,
            split_for_dataloading: config.split_for_dataloading,
            transforms,
            exhaustion: config.exhaustion,
            context: config.context,
            len: OnceLock::new(),
        })
    }

    /// Number of shards in the dataset.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Non-primary field names.
    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    /// All shard descriptors in iteration order (after shuffling).
    pub fn shards(&self) -> &[ShardDescriptor] {
        &self.shards
    }

    /// This consumer's shard subset under the current distributed context.
    pub fn shards_for_dataloading(&self) -> Result<Vec<ShardDescriptor>, SharError> {
        let topology = self.context.topology()?;
        let subset = split_for_dataloading(&self.shards, topology);
        debug!(
            ?topology,
            selected = subset.len(),
            total = self.shards.len(),
            "split shards for dataloading"
        );
        Ok(subset)
    }

    /// Start a fresh pass over the cuts.
    ///
    /// A distributed-context failure is reported as the first item.
    pub fn iter(&self) -> SharIter {
        let (shards, pending) = if self.split_for_dataloading {
            match self.shards_for_dataloading() {
                Ok(shards) => (shards, None),
                Err(err) => (Vec::new(), Some(err)),
            }
        } else {
            (self.shards.clone(), None)
        };
        SharIter {
            shards: shards.into_iter(),
            transforms: Arc::clone(&self.transforms),
            exhaustion: self.exhaustion,
            current: None,
            pending,
            failed: false,
        }
    }

    /// Total number of cuts across all shards, regardless of splitting.
    ///
    /// Counted from newlines of the cut manifests on first call and memoized.
    pub fn len(&self) -> Result<usize, SharError> {
        if let Some(len) = self.len.get() {
            return Ok(*len);
        }
        let mut total = 0usize;
        for location in self.resolver.primary_locations() {
            total += count_newlines(location)?;
        }
        debug!(total, "counted cuts");
        Ok(*self.len.get_or_init(|| total))
    }

    /// True when the cut manifests hold no lines.
    pub fn is_empty(&self) -> Result<bool, SharError> {
        Ok(self.len()? == 0)
    }
}

impl CutSource for LazySharSource {
    fn cuts(&self) -> CutIter<'_> {
        Box::new(self.iter())
    }

    fn len(&self) -> Result<usize, SharError> {
        LazySharSource::len(self)
    }
}

impl<'a> IntoIterator for &'a LazySharSource {
    type Item = Result<Cut, SharError>;
    type IntoIter = SharIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`LazySharSource`]; owns at most one open shard.
pub struct SharIter {
    shards: std::vec::IntoIter<ShardDescriptor>,
    transforms: Arc<[Option<CutTransform>]>,
    exhaustion: ExhaustionPolicy,
    current: Option<ShardMerge>,
    pending: Option<SharError>,
    failed: bool,
}

impl SharIter {
    fn fail(&mut self, err: SharError) -> Option<Result<Cut, SharError>> {
        self.failed = true;
        self.current = None;
        Some(Err(err))
    }

    fn open_next_shard(&mut self) -> Option<Result<(), SharError>> {
        let descriptor = self.shards.next()?;
        // Transforms follow the shard's original position, not its shuffled one.
        let transform = self
            .transforms
            .get(descriptor.index)
            .cloned()
            .flatten();
        Some(
            ShardMerge::open(&descriptor, transform, self.exhaustion)
                .map(|merge| self.current = Some(merge)),
        )
    }
}

impl Iterator for SharIter {
    type Item = Result<Cut, SharError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(err) = self.pending.take() {
                return self.fail(err);
            }
            if let Some(merge) = self.current.as_mut() {
                match merge.next() {
                    Some(Ok(cut)) => return Some(Ok(cut)),
                    Some(Err(err)) => return self.fail(err),
                    None => self.current = None,
                }
            }
            if let Err(err) = self.open_next_shard()? {
                return self.fail(err);
            }
        }
    }
}
