//! Rebuilding an in-flight training run from a partial tree.
//!
//! A checkpoint is an ordinary artifact whose untrained slots carry the
//! [`UNFINISHED`](crate::repr::UNFINISHED) sentinel. Restoring re-simulates
//! the run: the root pixel sample is regenerated from the seed, committed
//! splits re-route their pixels through the partitioner, finished leaves
//! contribute their stored probability tables, and every node that still
//! needs work lands on the training frontier in breadth-first order.
//!
//! This only reconstructs the original state because the feature arithmetic
//! is bit-for-bit deterministic: re-partitioning the restored depth images
//! routes every pixel exactly as the interrupted run did.

use std::collections::VecDeque;

use crate::repr::{Node, RdTree};

use super::frontier::{root_sample, NodeTrainData};
use super::partition::collect_pixels;
use super::{TrainContext, TrainError};

/// Training state reconstructed from a checkpoint.
pub struct RestoredState {
    /// Node array sized for the requested depth, checkpoint slots copied in.
    pub nodes: Vec<Node>,
    /// Nodes still awaiting work, breadth-first.
    pub frontier: VecDeque<NodeTrainData>,
    /// Probability tables of the already-finished leaves, in emission order.
    pub histograms: Vec<Vec<f32>>,
}

/// Validate `checkpoint` against the current run and rebuild the frontier.
///
/// Nodes are re-enqueued when they are marked unfinished, or when they sit
/// on the checkpoint's last level and the requested depth is deeper (their
/// leaves get another chance to split).
pub fn restore(ctx: &TrainContext, checkpoint: &RdTree) -> Result<RestoredState, TrainError> {
    if checkpoint.header.n_labels != ctx.data.n_labels {
        return Err(TrainError::LabelMismatch {
            checkpoint: checkpoint.header.n_labels,
            expected: ctx.data.n_labels,
        });
    }
    if (checkpoint.header.fov - ctx.data.fov).abs() > 1e-6 {
        return Err(TrainError::FovMismatch {
            checkpoint: checkpoint.header.fov,
            expected: ctx.data.fov,
        });
    }
    if checkpoint.header.depth > ctx.params.max_depth {
        return Err(TrainError::DepthTooShallow {
            checkpoint: checkpoint.header.depth,
            requested: ctx.params.max_depth,
        });
    }

    let ckpt_depth = checkpoint.header.depth as u32;
    let deepen = ctx.max_depth() > ckpt_depth;
    let n_ckpt_nodes = RdTree::n_nodes_for_depth(checkpoint.header.depth);

    let mut nodes = vec![Node::unfinished(); ctx.n_nodes()];
    nodes[..n_ckpt_nodes].copy_from_slice(&checkpoint.nodes[..n_ckpt_nodes]);

    let mut frontier = VecDeque::new();
    let mut histograms = Vec::new();

    let mut queue = VecDeque::new();
    queue.push_back(root_sample(
        &ctx.data,
        ctx.params.n_pixels,
        ctx.params.seed,
    ));

    while let Some(data) = queue.pop_front() {
        let node = nodes[data.id as usize];

        // Finished leaves contribute their stored table. Traversal order is
        // breadth-first, matching the order leaves were emitted, so plain
        // appends keep every stored label_pr_idx valid.
        if node.is_leaf() {
            let table = checkpoint
                .pr_table(node.label_pr_idx as usize - 1)
                .ok_or_else(|| {
                    TrainError::CorruptCheckpoint(format!(
                        "node {} references probability table {} of {}",
                        data.id,
                        node.label_pr_idx,
                        checkpoint.n_pr_tables()
                    ))
                })?;
            histograms.push(table.to_vec());
        }

        if node.is_unfinished() || (data.depth == ckpt_depth - 1 && deepen) {
            frontier.push_back(data);
            continue;
        }

        if node.is_internal() {
            let child_id = 2 * data.id + 1;
            if child_id as usize + 1 >= nodes.len() {
                return Err(TrainError::CorruptCheckpoint(format!(
                    "internal node {} on the last level",
                    data.id
                )));
            }
            let (l_pixels, r_pixels) = collect_pixels(ctx, &data, node.uv, node.t, None);
            queue.push_back(NodeTrainData {
                id: child_id,
                depth: data.depth + 1,
                pixels: l_pixels,
            });
            queue.push_back(NodeTrainData {
                id: child_id + 1,
                depth: data.depth + 1,
                pixels: r_pixels,
            });
        }
    }

    if frontier.is_empty() {
        return Err(TrainError::AlreadyComplete);
    }

    Ok(RestoredState {
        nodes,
        frontier,
        histograms,
    })
}
