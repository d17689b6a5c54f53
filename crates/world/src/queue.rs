//! Priority-ordered pending set with bounded concurrency and a
//! persistence-hit fast path.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use strata_core::ChunkKey;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::chunk::Volume;
use crate::generate::generate_chunk;
use crate::persist::ChunkStore;
use crate::worker::SharedWorkerPool;

/// Outcome of a completed generation-queue item, handed to the caller's
/// `on_chunk` callback.
pub struct ChunkResult {
    /// The chunk this result is for.
    pub key: ChunkKey,
    /// The resulting volume.
    pub volume: Volume,
    /// `true` if this volume was freshly generated (so the owning chunk
    /// starts dirty); `false` if it was loaded from the store.
    pub freshly_generated: bool,
}

#[derive(Eq, PartialEq)]
struct PendingItem {
    priority: u32,
    key: ChunkKey,
}

impl Ord for PendingItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; wrap in Reverse at push/pop sites so the
        // lowest priority value (most urgent) pops first.
        self.priority.cmp(&other.priority)
    }
}
impl PartialOrd for PendingItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Maintains the pending/in-flight sets and drives chunk generation or
/// store loads up to an admission cap per `process` call.
pub struct GenerationQueue {
    heap: BinaryHeap<Reverse<PendingItem>>,
    pending: HashSet<ChunkKey>,
    in_flight: HashMap<ChunkKey, oneshot::Receiver<Result<Volume, strata_core::WorkerFailed>>>,
    /// Admission cap: at most this many concurrent generations, distinct
    /// from the worker pool's own thread count.
    w_max: usize,
    seed: u32,
}

impl GenerationQueue {
    /// Construct an empty queue with the given per-tick admission cap.
    pub fn new(w_max: usize, seed: u32) -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            in_flight: HashMap::new(),
            w_max: w_max.max(1),
            seed,
        }
    }

    /// Update the seed new tasks dispatch with (mid-flight tasks keep the
    /// seed they were dispatched with).
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Enqueue `key` at `priority` unless it is already pending or
    /// in-flight.
    pub fn enqueue(&mut self, key: ChunkKey, priority: u32) {
        if self.pending.contains(&key) || self.in_flight.contains_key(&key) {
            return;
        }
        self.pending.insert(key);
        self.heap.push(Reverse(PendingItem { priority, key }));
    }

    /// Whether `key` is neither pending nor in-flight (i.e. eligible for a
    /// fresh `enqueue`).
    pub fn is_free(&self, key: ChunkKey) -> bool {
        !self.pending.contains(&key) && !self.in_flight.contains_key(&key)
    }

    /// Number of in-flight generations right now.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop every pending (not yet dispatched) key. In-flight items are left
    /// to run to completion; their results are still delivered by the next
    /// `process` call that finds them resolved.
    pub fn clear_queue(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    /// Admit work up to `w_max` concurrent generations: known keys become
    /// `store.load` futures, unknown keys become worker tasks.
    #[instrument(level = "debug", skip(self, store, pool, known_keys))]
    fn admit(&mut self, store: &ChunkStore, pool: &SharedWorkerPool, known_keys: &HashSet<ChunkKey>) {
        while self.in_flight.len() < self.w_max {
            let Some(Reverse(item)) = self.heap.pop() else {
                break;
            };
            self.pending.remove(&item.key);

            if known_keys.contains(&item.key) {
                // Persistence-hit fast path: a load future is modeled the
                // same as a worker future so `process` can poll both
                // uniformly.
                let (tx, rx) = oneshot::channel();
                let key = item.key;
                let store = store.clone();
                tokio::spawn(async move {
                    let volume = store.load(key).await;
                    let _ = tx.send(volume.ok_or_else(|| strata_core::WorkerFailed {
                        key,
                        reason: "known key missing from store (LoadMiss)".to_string(),
                    }));
                });
                self.in_flight.insert(item.key, rx);
            } else {
                let rx = pool.generate(item.key, self.seed);
                self.in_flight.insert(item.key, rx);
            }
        }
    }

    /// Process one tick: admit work up to the cap, poll in-flight futures
    /// that have already resolved, and invoke `on_chunk` for each
    /// completion. Keys whose load comes back `LoadMiss` are re-enqueued for
    /// generation.
    #[instrument(level = "debug", skip_all)]
    pub async fn process(
        &mut self,
        store: &ChunkStore,
        pool: &SharedWorkerPool,
        known_keys: &HashSet<ChunkKey>,
        mut on_chunk: impl FnMut(ChunkResult),
    ) {
        self.admit(store, pool, known_keys);

        let mut finished = Vec::new();
        for (&key, rx) in self.in_flight.iter_mut() {
            match rx.try_recv() {
                Ok(outcome) => finished.push((key, outcome)),
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => finished.push((
                    key,
                    Err(strata_core::WorkerFailed {
                        key,
                        reason: "task sender dropped".to_string(),
                    }),
                )),
            }
        }

        for (key, outcome) in finished {
            self.in_flight.remove(&key);
            match outcome {
                Ok(volume) => on_chunk(ChunkResult {
                    key,
                    freshly_generated: !known_keys.contains(&key),
                    volume,
                }),
                Err(failure) => {
                    warn!(key = %failure.key, reason = %failure.reason, "generation/load failed, falling back to sync generation");
                    let volume = generate_chunk(key.cx, key.cz, self.seed);
                    on_chunk(ChunkResult {
                        key,
                        freshly_generated: true,
                        volume,
                    });
                }
            }
        }
    }

    /// Synchronous degraded path used when `WorkerPool` itself could not be
    /// constructed: runs terrain synthesis and decoration directly on the
    /// caller's thread instead of dispatching to a worker.
    pub fn process_sync(&mut self, mut on_chunk: impl FnMut(ChunkResult)) {
        while let Some(Reverse(item)) = self.heap.pop() {
            self.pending.remove(&item.key);
            debug!(key = %item.key, "synchronous fallback generation");
            let volume = generate_chunk(item.key.cx, item.key.cz, self.seed);
            on_chunk(ChunkResult {
                key: item.key,
                freshly_generated: true,
                volume,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerPool;
    use std::sync::Arc;

    #[tokio::test]
    async fn enqueue_dedups_pending_keys() {
        let mut queue = GenerationQueue::new(2, 1);
        queue.enqueue(ChunkKey::new(0, 0), 0);
        queue.enqueue(ChunkKey::new(0, 0), 5);
        assert_eq!(queue.heap.len(), 1);
    }

    #[tokio::test]
    async fn process_generates_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        let pool: SharedWorkerPool = Arc::new(WorkerPool::new(2).unwrap());
        let known = HashSet::new();

        let mut queue = GenerationQueue::new(2, 7);
        queue.enqueue(ChunkKey::new(0, 0), 0);

        let mut results = Vec::new();
        for _ in 0..20 {
            queue
                .process(&store, &pool, &known, |r| results.push(r))
                .await;
            if !results.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_eq!(results.len(), 1);
        assert!(results[0].freshly_generated);
        assert_eq!(results[0].volume.len(), strata_core::CHUNK_VOLUME);
    }

    #[test]
    fn admission_cap_bounds_in_flight() {
        let mut queue = GenerationQueue::new(2, 1);
        for i in 0..10 {
            queue.enqueue(ChunkKey::new(i, 0), i as u32);
        }
        assert_eq!(queue.pending.len(), 10);
        assert!(queue.w_max == 2);
    }
}
