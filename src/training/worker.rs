//! The worker pool and its barrier handshake.
//!
//! A fixed set of workers is spawned once, before the first split, and lives
//! until training ends. Each worker owns a contiguous slice of the uv
//! candidate index space (`⌊n_uv / n_workers⌋` wide, the last worker absorbs
//! the remainder) and a pair of reusable histogram buffers sized for that
//! slice.
//!
//! Per split, the driver publishes the current node, then everyone meets at
//! the *ready* barrier; workers accumulate and score their slice, publish
//! their result slot, and meet the driver again at the *finished* barrier,
//! after which the driver may read every slot. The barriers are the only
//! suspension points, and the slots are the only cross-thread writes.
//!
//! Termination is in-band: the driver publishes `None` as the current node
//! and releases the ready barrier one last time. An interrupt never skips a
//! barrier; workers observing the flag cut their per-candidate work short
//! but still reach the finished barrier, keeping the handshake in lockstep.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Barrier, Mutex};
use std::thread::JoinHandle;

use super::frontier::NodeTrainData;
use super::histogram::{
    accumulate_histograms, find_best_split, normalize_histogram, shannon_entropy, BestSplit,
};
use super::{TrainContext, TrainError};

/// One worker's published result for the current split.
struct WorkerSlot {
    best: BestSplit,
    /// Label counts over all pixels reaching the node. Identical across
    /// workers by construction; the driver reads worker 0's copy.
    root_histogram: Vec<u32>,
    error: Option<TrainError>,
}

impl WorkerSlot {
    fn new(n_labels: usize) -> Self {
        Self {
            best: BestSplit::none(),
            root_histogram: vec![0; n_labels],
            error: None,
        }
    }
}

/// The driver's view of a completed split evaluation.
#[derive(Debug)]
pub struct SplitDecision {
    /// Argmax over worker bests, worker order, strict `>`.
    pub best: BestSplit,
    /// Label counts over all pixels reaching the node.
    pub root_histogram: Vec<u32>,
}

struct Shared {
    /// Written by the driver before each ready-barrier release; `None`
    /// terminates the workers.
    job: Mutex<Option<Arc<NodeTrainData>>>,
    ready: Barrier,
    finished: Barrier,
    slots: Vec<Mutex<WorkerSlot>>,
    interrupted: Arc<AtomicBool>,
}

/// Fixed pool of long-lived split-evaluation workers.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n_workers` workers over `ctx`'s candidate set.
    pub fn spawn(
        ctx: Arc<TrainContext>,
        n_workers: usize,
        interrupted: Arc<AtomicBool>,
    ) -> Result<Self, TrainError> {
        let n_workers = n_workers.max(1);
        let n_labels = ctx.n_labels();
        let n_uv = ctx.params.n_uv;

        let shared = Arc::new(Shared {
            job: Mutex::new(None),
            ready: Barrier::new(n_workers + 1),
            finished: Barrier::new(n_workers + 1),
            slots: (0..n_workers)
                .map(|_| Mutex::new(WorkerSlot::new(n_labels)))
                .collect(),
            interrupted,
        });

        let slice_width = n_uv / n_workers as u32;
        let mut handles = Vec::with_capacity(n_workers);
        for i in 0..n_workers {
            let c_start = i as u32 * slice_width;
            let c_end = if i == n_workers - 1 {
                n_uv
            } else {
                (i as u32 + 1) * slice_width
            };

            let ctx = Arc::clone(&ctx);
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("rdt-worker-{i}"))
                .spawn(move || worker_body(&ctx, &shared, i, c_start, c_end))
                .map_err(TrainError::Init)?;
            handles.push(handle);
        }

        Ok(Self { shared, handles })
    }

    pub fn n_workers(&self) -> usize {
        self.handles.len()
    }

    /// Evaluate one node: publish it, run the barrier handshake, reduce the
    /// worker slots.
    pub fn run_split(&self, node: Arc<NodeTrainData>) -> Result<SplitDecision, TrainError> {
        *self.shared.job.lock().unwrap() = Some(node);
        self.shared.ready.wait();
        self.shared.finished.wait();

        let mut best = BestSplit::none();
        let mut root_histogram = Vec::new();
        let mut first_error = None;
        for (i, slot) in self.shared.slots.iter().enumerate() {
            let mut slot = slot.lock().unwrap();
            if first_error.is_none() {
                first_error = slot.error.take();
            } else {
                slot.error = None;
            }
            if i == 0 {
                root_histogram = slot.root_histogram.clone();
            }
            if slot.best.gain > best.gain {
                best = slot.best;
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(SplitDecision {
                best,
                root_histogram,
            }),
        }
    }

    /// Terminate and join the workers.
    pub fn shutdown(self) {
        *self.shared.job.lock().unwrap() = None;
        self.shared.ready.wait();
        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_body(ctx: &TrainContext, shared: &Shared, worker_idx: usize, c_start: u32, c_end: u32) {
    let n_labels = ctx.n_labels();
    let n_t = ctx.ts.len();
    let slice_len = (c_end - c_start) as usize;

    // Allocated once, reused for every split.
    let mut root = vec![0u32; n_labels];
    let mut lr = vec![0u32; n_labels * slice_len * n_t * 2];
    let mut scratch = vec![0.0f32; n_labels];

    loop {
        shared.ready.wait();

        let job = shared.job.lock().unwrap().clone();
        let Some(node) = job else {
            break;
        };

        root.fill(0);
        lr.fill(0);

        let mut error = None;
        let mut best = BestSplit::none();
        match accumulate_histograms(
            ctx,
            &node,
            c_start,
            c_end,
            &mut root,
            &mut lr,
            &shared.interrupted,
        ) {
            Ok(()) => {
                let (root_n, root_labels) = normalize_histogram(&root, &mut scratch);
                // A single-label node or a terminal-level node becomes a
                // leaf whatever the candidates say; skip the search.
                if root_labels > 1 && node.depth < ctx.max_depth() - 1 {
                    let entropy = shannon_entropy(&scratch);
                    best = find_best_split(
                        ctx,
                        c_start,
                        c_end,
                        root_n,
                        entropy,
                        &lr,
                        &mut scratch,
                        &shared.interrupted,
                    );
                }
            }
            Err(e) => error = Some(e),
        }

        {
            let mut slot = shared.slots[worker_idx].lock().unwrap();
            slot.best = best;
            slot.root_histogram.copy_from_slice(&root);
            slot.error = error;
        }

        shared.finished.wait();
    }
}
