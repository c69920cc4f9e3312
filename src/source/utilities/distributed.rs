//! Two-level (node, then worker) partitioning of shard lists.
//!
//! Every consumer of a distributed job computes its own subset from the same
//! ordered shard list; because the split is a pure strided selection, the
//! subsets are disjoint and together cover every shard exactly once.

use std::env;

use crate::constants::distributed::{
    NODE_COUNT_ENV, NODE_INDEX_ENV, WORKER_COUNT_ENV, WORKER_INDEX_ENV,
};
use crate::errors::SharError;

/// Position of one consumer within a distributed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Topology {
    /// Number of nodes in the job.
    pub node_count: usize,
    /// This consumer's node, in `0..node_count`.
    pub node_index: usize,
    /// Number of dataloading workers per node.
    pub worker_count: usize,
    /// This consumer's worker, in `0..worker_count`.
    pub worker_index: usize,
}

impl Topology {
    /// Single node, single worker: no splitting.
    pub const fn single() -> Self {
        Self {
            node_count: 1,
            node_index: 0,
            worker_count: 1,
            worker_index: 0,
        }
    }

    /// Build a validated topology.
    pub fn new(
        node_count: usize,
        node_index: usize,
        worker_count: usize,
        worker_index: usize,
    ) -> Result<Self, SharError> {
        let topology = Self {
            node_count,
            node_index,
            worker_count,
            worker_index,
        };
        topology.validate()?;
        Ok(topology)
    }

    fn validate(&self) -> Result<(), SharError> {
        if self.node_count == 0 || self.node_index >= self.node_count {
            return Err(SharError::Distributed(format!(
                "node index {} is out of range for {} nodes",
                self.node_index, self.node_count
            )));
        }
        if self.worker_count == 0 || self.worker_index >= self.worker_count {
            return Err(SharError::Distributed(format!(
                "worker index {} is out of range for {} workers",
                self.worker_index, self.worker_count
            )));
        }
        Ok(())
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::single()
    }
}

/// Ambient lookup of the current consumer's topology.
///
/// Queried each time a split is computed, never cached by the reader.
pub trait DistributedContext: Send + Sync {
    /// Current topology, validated.
    fn topology(&self) -> Result<Topology, SharError>;
}

impl DistributedContext for Topology {
    fn topology(&self) -> Result<Topology, SharError> {
        self.validate()?;
        Ok(*self)
    }
}

/// Context read from environment variables.
///
/// Nodes follow the launcher convention (`WORLD_SIZE`, `RANK`); workers use
/// `SHAR_WORKER_COUNT` and `SHAR_WORKER_INDEX`. A missing pair means one
/// node or one worker. A half-set pair is an error unless the count is 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvContext;

impl EnvContext {
    fn pair(count_key: &str, index_key: &str) -> Result<(usize, usize), SharError> {
        match (read_usize(count_key)?, read_usize(index_key)?) {
            (None, None) => Ok((1, 0)),
            (Some(count), Some(index)) => Ok((count, index)),
            (Some(1), None) => Ok((1, 0)),
            (Some(_), None) => Err(SharError::Distributed(format!(
                "{count_key} is set but {index_key} is not"
            ))),
            (None, Some(_)) => Err(SharError::Distributed(format!(
                "{index_key} is set but {count_key} is not"
            ))),
        }
    }
}

impl DistributedContext for EnvContext {
    fn topology(&self) -> Result<Topology, SharError> {
        let (node_count, node_index) = Self::pair(NODE_COUNT_ENV, NODE_INDEX_ENV)?;
        let (worker_count, worker_index) = Self::pair(WORKER_COUNT_ENV, WORKER_INDEX_ENV)?;
        Topology::new(node_count, node_index, worker_count, worker_index)
    }
}

fn read_usize(key: &str) -> Result<Option<usize>, SharError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            SharError::Distributed(format!("{key}='{raw}' is not a non-negative integer"))
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(SharError::Distributed(format!("{key}: {err}"))),
    }
}

/// Select this consumer's shards: every `node_count`-th item starting at
/// `node_index`, then every `worker_count`-th of those starting at `worker_index`.
pub fn split_for_dataloading<T: Clone>(items: &[T], topology: Topology) -> Vec<T> {
    items
        .iter()
        .skip(topology.node_index)
        .step_by(topology.node_count.max(1))
        .skip(topology.worker_index)
        .step_by(topology.worker_count.max(1))
        .cloned()
        .collect()
}
