//! The breadth-first training driver.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::io::RDT_VERSION;
use crate::repr::{Node, RdTree, TreeHeader};

use super::frontier::{root_sample, NodeTrainData};
use super::histogram::normalize_histogram;
use super::partition::collect_pixels;
use super::progress::ProgressClock;
use super::worker::WorkerPool;
use super::{checkpoint, TrainContext, TrainError};

/// Result of a training run.
#[derive(Debug)]
pub struct TrainOutcome {
    /// The trained tree; a checkpoint with sentinel slots when interrupted.
    pub tree: RdTree,
    /// True when the run stopped on the interrupt flag rather than by
    /// draining the frontier.
    pub interrupted: bool,
}

/// Train a tree over `ctx`, breadth-first.
///
/// Passing a `checkpoint` resumes an interrupted run (or extends a complete
/// one to a greater depth). `interrupted` may be set asynchronously, e.g.
/// from a signal handler; the driver finishes the in-flight split, stops,
/// and returns a checkpointable tree.
///
/// Progress lines are written to stdout through `clock` on every depth
/// transition.
pub fn train(
    ctx: Arc<TrainContext>,
    checkpoint: Option<&RdTree>,
    interrupted: Arc<AtomicBool>,
    clock: &mut ProgressClock,
) -> Result<TrainOutcome, TrainError> {
    let n_labels = ctx.n_labels();

    let mut nodes;
    let mut frontier: VecDeque<NodeTrainData>;
    let mut histograms: Vec<Vec<f32>>;

    if let Some(ckpt) = checkpoint {
        println!("Restoring checkpoint...");
        let restored = checkpoint::restore(&ctx, ckpt)?;
        nodes = restored.nodes;
        frontier = restored.frontier;
        histograms = restored.histograms;
    } else {
        nodes = vec![Node::unfinished(); ctx.n_nodes()];
        frontier = VecDeque::new();
        frontier.push_back(root_sample(
            &ctx.data,
            ctx.params.n_pixels,
            ctx.params.seed,
        ));
        histograms = Vec::new();
    }

    let n_threads = if ctx.params.n_threads > 0 {
        ctx.params.n_threads
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    };
    println!("Initialising {n_threads} threads...");
    let pool = WorkerPool::spawn(Arc::clone(&ctx), n_threads, Arc::clone(&interrupted))?;

    println!("Beginning training...");
    let mut last_depth = u32::MAX;
    let mut was_interrupted = false;
    let mut failure: Option<TrainError> = None;

    loop {
        let front_depth = match frontier.front() {
            Some(front) => front.depth,
            None => break,
        };
        if front_depth != last_depth {
            last_depth = front_depth;
            println!(
                "{} Training depth {} ({} nodes)",
                clock.lap(),
                last_depth + 1,
                frontier.len()
            );
        }

        let Some(node_data) = frontier.pop_front().map(Arc::new) else {
            break;
        };
        let decision = match pool.run_split(Arc::clone(&node_data)) {
            Ok(decision) => decision,
            Err(error) => {
                failure = Some(error);
                break;
            }
        };

        if interrupted.load(Ordering::SeqCst) {
            println!("\nUser-triggered interrupt, saving checkpoint...");
            was_interrupted = true;
            break;
        }

        let best = decision.best;
        if best.gain > 0.0 && node_data.depth + 1 < ctx.max_depth() {
            let uv = ctx.uvs[best.uv_idx as usize];
            let t = ctx.ts[best.t_idx as usize];

            if ctx.params.verbose {
                println!(
                    "  Node ({})\n    Gain: {}\n    U: ({}, {})\n    V: ({}, {})\n    T: {}",
                    node_data.id, best.gain, uv[0], uv[1], uv[2], uv[3], t
                );
            }

            let (l_pixels, r_pixels) = collect_pixels(
                &ctx,
                &node_data,
                uv,
                t,
                Some((best.l_count, best.r_count)),
            );

            let child_id = 2 * node_data.id + 1;
            let child_depth = node_data.depth + 1;
            frontier.push_back(NodeTrainData {
                id: child_id,
                depth: child_depth,
                pixels: l_pixels,
            });
            frontier.push_back(NodeTrainData {
                id: child_id + 1,
                depth: child_depth,
                pixels: r_pixels,
            });

            nodes[node_data.id as usize] = Node {
                uv,
                t,
                label_pr_idx: 0,
            };
        } else {
            let mut normalized = vec![0.0f32; n_labels];
            normalize_histogram(&decision.root_histogram, &mut normalized);

            if ctx.params.verbose {
                println!("  Leaf node ({})", node_data.id);
                for (label, &p) in normalized.iter().enumerate() {
                    if p > 0.0 {
                        println!("    {label:02} - {p}");
                    }
                }
            }

            histograms.push(normalized);
            nodes[node_data.id as usize].label_pr_idx = histograms.len() as u32;
        }
    }

    pool.shutdown();
    if let Some(error) = failure {
        return Err(error);
    }

    // A finalized artifact carries no sentinel: slots below leaves were
    // never visited and are cleared. A checkpoint keeps them, so restore
    // can tell unfinished work apart.
    if !was_interrupted {
        for node in &mut nodes {
            if node.is_unfinished() {
                *node = Node::empty();
            }
        }
    }

    let tree = RdTree {
        header: TreeHeader {
            version: RDT_VERSION,
            depth: ctx.params.max_depth,
            n_labels: ctx.data.n_labels,
            background_label: ctx.params.background_label,
            fov: ctx.data.fov,
        },
        nodes,
        label_pr_tables: histograms.concat(),
    };

    Ok(TrainOutcome {
        tree,
        interrupted: was_interrupted,
    })
}
