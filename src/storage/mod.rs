//! Storage layer for the rate limiter
//!
//! This module defines the counter-store seam the core consumes and the
//! drivers behind it: a Redis driver (standalone and cluster) and an
//! in-process memory driver.

/// Slot-aware pipeline dispatcher
pub mod dispatcher;
/// In-process counter store
pub mod memory;
/// Redis counter store
pub mod redis;

pub use dispatcher::SlotPipelines;
pub use memory::MemoryStore;
pub use redis::RedisCounterStore;

use crate::utils::error::Result;
use async_trait::async_trait;

/// One store command inside a pipeline.
///
/// Replies align one-to-one with operations: `IncrBy` yields the counter
/// value after the increment, `Get` yields the current value (`None` when
/// the key is absent), `Expire` yields nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Atomically add `delta` to the counter at `key`, creating it at zero
    IncrBy {
        /// Counter key
        key: String,
        /// Amount to add
        delta: u64,
    },
    /// Set the TTL of `key`
    Expire {
        /// Counter key
        key: String,
        /// TTL in seconds
        seconds: i64,
    },
    /// Read the counter at `key` without mutating it
    Get {
        /// Counter key
        key: String,
    },
}

impl StoreOp {
    /// The key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            StoreOp::IncrBy { key, .. } | StoreOp::Expire { key, .. } | StoreOp::Get { key } => key,
        }
    }
}

/// An ordered batch of store operations bound for a single shard.
///
/// Construction happens through the dispatcher, which guarantees every key
/// in the batch hashes to the same slot.
#[derive(Debug, Default, Clone)]
pub struct Pipeline {
    ops: Vec<StoreOp>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation.
    pub fn push(&mut self, op: StoreOp) {
        self.ops.push(op);
    }

    /// Operations in append order.
    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the pipeline holds no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The store driver the limiter core runs against.
///
/// Implementations route each pipeline to the shard currently owning its
/// slot and absorb topology redirects internally; the caller only ever sees
/// success or a hard store error.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Whether keys are spread over more than one shard slot.
    fn is_cluster(&self) -> bool {
        false
    }

    /// Shard slot owning `key`. Non-sharded stores return 0 for every key.
    fn slot(&self, key: &str) -> u16;

    /// Execute a single-slot pipeline, returning one reply per operation.
    async fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Vec<Option<u64>>>;

    /// Liveness probe.
    async fn health_check(&self) -> Result<()>;
}
