//! Cut source interfaces and composition.
//!
//! Ownership model:
//! - `CutSource` is the caller-facing interface: a restartable lazy sequence
//!   of cuts plus a dataset-level length.
//! - `LazySharSource` reads sharded manifests/archives on demand.
//! - `LazyCutChain` concatenates sources without materializing any of them.

use std::sync::Arc;

use crate::data::Cut;
use crate::errors::SharError;

/// Per-field stream readers (tar archives and adapted JSONL manifests).
pub mod backends;
/// Shard discovery and descriptor construction.
pub mod indexing;
/// Source implementation modules.
pub mod sources;
/// Utility helpers used by source implementations.
pub mod utilities;

pub use sources::shar_source::{LazySharSource, SharIter};

/// Boxed lazy cut sequence returned by [`CutSource::cuts`].
pub type CutIter<'a> = Box<dyn Iterator<Item = Result<Cut, SharError>> + Send + 'a>;

/// Restartable, lazily evaluated sequence of cuts.
///
/// Every call to `cuts` starts a fresh pass from the beginning; iteration is
/// not resumable. After the first error a pass yields nothing more.
pub trait CutSource: Send + Sync {
    /// Start a new pass over all cuts.
    fn cuts(&self) -> CutIter<'_>;

    /// Total number of cuts in the source.
    fn len(&self) -> Result<usize, SharError>;

    /// True when the source holds no cuts.
    fn is_empty(&self) -> Result<bool, SharError> {
        Ok(self.len()? == 0)
    }

    /// Concatenate `other` after this source.
    fn chain<S>(self, other: S) -> LazyCutChain
    where
        Self: Sized + 'static,
        S: CutSource + 'static,
    {
        LazyCutChain::new(self).chain(other)
    }
}

/// Lazy concatenation of cut sources.
pub struct LazyCutChain {
    sources: Vec<Box<dyn CutSource>>,
}

impl LazyCutChain {
    /// Start a chain with `first`.
    pub fn new(first: impl CutSource + 'static) -> Self {
        Self {
            sources: vec![Box::new(first)],
        }
    }

    /// Append `next` after the sources already in the chain.
    pub fn chain(mut self, next: impl CutSource + 'static) -> Self {
        self.sources.push(Box::new(next));
        self
    }

    /// Number of sources in the chain.
    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }
}

impl CutSource for LazyCutChain {
    fn cuts(&self) -> CutIter<'_> {
        Box::new(ChainIter {
            sources: self.sources.iter(),
            current: None,
            failed: false,
        })
    }

    fn len(&self) -> Result<usize, SharError> {
        self.sources.iter().map(|source| source.len()).sum()
    }
}

struct ChainIter<'a> {
    sources: std::slice::Iter<'a, Box<dyn CutSource>>,
    current: Option<CutIter<'a>>,
    failed: bool,
}

impl Iterator for ChainIter<'_> {
    type Item = Result<Cut, SharError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(cut)) => return Some(Ok(cut)),
                    Some(Err(err)) => {
                        self.failed = true;
                        self.current = None;
                        return Some(Err(err));
                    }
                    None => self.current = None,
                }
            }
            self.current = Some(self.sources.next()?.cuts());
        }
    }
}

/// In-memory cut source for tests and small datasets.
pub struct InMemoryCuts {
    cuts: Arc<Vec<Cut>>,
}

impl InMemoryCuts {
    /// Create an in-memory source from prebuilt cuts.
    pub fn new(cuts: Vec<Cut>) -> Self {
        Self {
            cuts: Arc::new(cuts),
        }
    }
}

impl CutSource for InMemoryCuts {
    fn cuts(&self) -> CutIter<'_> {
        Box::new(self.cuts.iter().cloned().map(Ok))
    }

    fn len(&self) -> Result<usize, SharError> {
        Ok(self.cuts.len())
    }
}
