//! Slot-aware pipeline dispatcher
//!
//! Groups store operations by shard slot and executes the per-slot
//! pipelines concurrently. Each operation is bound to a caller-side result
//! index; replies are written back through that binding after the fan-out
//! completes.

use crate::storage::{CounterStore, Pipeline, StoreOp};
use crate::utils::error::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A store operation bound to a caller result index.
#[derive(Debug)]
struct BoundOp {
    index: usize,
    op: StoreOp,
}

/// Store operations grouped by shard slot, awaiting execution.
///
/// Within one slot, operations keep their arrival order; the store executes
/// them as a single atomic batch. Across slots no ordering is guaranteed.
#[derive(Debug, Default)]
pub struct SlotPipelines {
    groups: HashMap<u16, Vec<BoundOp>>,
}

impl SlotPipelines {
    /// Create an empty set of slot pipelines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `op` to the pipeline for its key's slot, binding any reply it
    /// produces to `index` in the caller's result array.
    pub fn push(&mut self, store: &dyn CounterStore, index: usize, op: StoreOp) {
        let slot = store.slot(op.key());
        self.groups
            .entry(slot)
            .or_default()
            .push(BoundOp { index, op });
    }

    /// Whether any operations are pending.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of non-empty slot pipelines.
    pub fn slot_count(&self) -> usize {
        self.groups.len()
    }

    /// Execute every slot pipeline concurrently against `store`.
    ///
    /// On success, each value-producing reply is written to
    /// `results[bound index]`; operations that return nothing (TTL updates,
    /// reads of absent keys) leave the slot untouched. On any failure the
    /// first error is returned and `results` must not be trusted.
    ///
    /// All slot round-trips are owned by the returned future; dropping it
    /// cancels the in-flight operations.
    pub async fn execute(
        self,
        store: &Arc<dyn CounterStore>,
        results: &mut [u64],
    ) -> Result<()> {
        if self.groups.is_empty() {
            return Ok(());
        }

        debug!("dispatching {} slot pipeline(s)", self.groups.len());

        let mut bindings = Vec::with_capacity(self.groups.len());
        let mut futures = Vec::with_capacity(self.groups.len());

        for (slot, bound_ops) in self.groups {
            let mut pipeline = Pipeline::new();
            let mut indexes = Vec::with_capacity(bound_ops.len());
            for bound in bound_ops {
                indexes.push(bound.index);
                pipeline.push(bound.op);
            }
            bindings.push(indexes);

            let store = Arc::clone(store);
            futures.push(async move {
                let replies = store.run_pipeline(&pipeline).await?;
                debug!("slot {} pipeline completed ({} ops)", slot, pipeline.len());
                Ok::<_, crate::utils::error::Error>(replies)
            });
        }

        let outcomes = join_all(futures).await;

        for (indexes, outcome) in bindings.into_iter().zip(outcomes) {
            let replies = outcome?;
            for (index, reply) in indexes.into_iter().zip(replies) {
                if let Some(value) = reply {
                    results[index] = value;
                }
            }
        }

        Ok(())
    }
}
