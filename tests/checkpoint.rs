//! Checkpoint / resume round-trip laws.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::{engineered_ctx, quadrants_data, run_to_completion, tree_bytes};
use rdtree::io::{read_tree, save_tree};
use rdtree::repr::{Node, RdTree};
use rdtree::training::{train, ProgressClock, TrainError};

/// Rebuild the artifact a run interrupted after completing depth
/// `cutoff - 1` would have written: nodes at shallower depths keep their
/// state, every reachable node at `cutoff` or deeper reverts to the
/// unfinished sentinel, and the probability table keeps only the leaves
/// emitted before the cut.
///
/// Works because breadth-first processing makes the finished nodes a strict
/// prefix: leaves above the cut hold the table indices `1..=k`.
fn interrupt_after_depth(complete: &RdTree, cutoff: u32) -> RdTree {
    let mut nodes = vec![Node::unfinished(); complete.nodes.len()];
    let mut n_tables = 0usize;

    let mut queue = std::collections::VecDeque::from([(0usize, 0u32)]);
    while let Some((id, depth)) = queue.pop_front() {
        if depth >= cutoff {
            continue;
        }
        let node = complete.nodes[id];
        nodes[id] = node;
        if node.is_leaf() {
            n_tables = n_tables.max(node.label_pr_idx as usize);
        }
        if node.is_internal() {
            queue.push_back((2 * id + 1, depth + 1));
            queue.push_back((2 * id + 2, depth + 1));
        }
    }

    RdTree {
        header: complete.header,
        nodes,
        label_pr_tables: complete.label_pr_tables
            [..n_tables * complete.header.n_labels as usize]
            .to_vec(),
    }
}

/// S4: an interrupted run resumed from its checkpoint file converges to the
/// byte-identical artifact of an uninterrupted run.
#[test]
fn resume_after_interrupt_matches_uninterrupted_run() {
    let complete = run_to_completion(engineered_ctx(quadrants_data(), 3, 128), None);

    // Interrupted after the two depth-1 splits were committed.
    let partial = interrupt_after_depth(&complete, 2);
    assert!(!partial.is_complete());
    assert!(partial.label_pr_tables.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let ckpt_path = dir.path().join("partial.rdt");
    save_tree(&partial, &ckpt_path).unwrap();
    let checkpoint = read_tree(&ckpt_path).unwrap();

    let resumed = run_to_completion(
        engineered_ctx(quadrants_data(), 3, 128),
        Some(&checkpoint),
    );
    assert_eq!(tree_bytes(&resumed), tree_bytes(&complete));
}

/// An interrupt before the first split commits still produces a usable
/// checkpoint: everything is re-trained on resume.
#[test]
fn resume_from_immediate_interrupt() {
    let interrupted = Arc::new(AtomicBool::new(true));
    let mut clock = ProgressClock::start();
    let outcome = train(
        Arc::new(engineered_ctx(quadrants_data(), 3, 128)),
        None,
        interrupted,
        &mut clock,
    )
    .unwrap();
    assert!(outcome.interrupted);
    assert!(outcome.tree.nodes.iter().all(|n| n.is_unfinished()));

    let resumed = run_to_completion(
        engineered_ctx(quadrants_data(), 3, 128),
        Some(&outcome.tree),
    );
    let fresh = run_to_completion(engineered_ctx(quadrants_data(), 3, 128), None);
    assert_eq!(tree_bytes(&resumed), tree_bytes(&fresh));
}

/// S5: resuming a complete tree into a greater depth re-examines the last
/// level's leaves and never leaves a sentinel behind.
#[test]
fn resume_into_deeper_tree() {
    let complete = run_to_completion(engineered_ctx(quadrants_data(), 3, 128), None);

    let deeper = run_to_completion(
        engineered_ctx(quadrants_data(), 4, 128),
        Some(&complete),
    );

    assert_eq!(deeper.header.depth, 4);
    assert_eq!(deeper.nodes.len(), 15);
    assert!(deeper.is_complete());

    // The quadrant leaves are pure, so they stay leaves at depth 2 with
    // freshly emitted tables appended after the four restored ones.
    for id in 3..7 {
        let node = &deeper.nodes[id];
        assert!(node.is_leaf());
        let table = deeper.leaf_table(node).unwrap();
        assert_eq!(table.iter().filter(|&&p| p > 0.0).count(), 1);
    }
    assert_eq!(deeper.n_pr_tables(), 8);
    assert!(deeper.nodes[7..].iter().all(|n| n.label_pr_idx == 0));
}

/// S6: resuming an already-complete artifact at the same depth fails.
#[test]
fn resume_of_complete_tree_is_rejected() {
    let complete = run_to_completion(engineered_ctx(quadrants_data(), 3, 128), None);

    let interrupted = Arc::new(AtomicBool::new(false));
    let mut clock = ProgressClock::start();
    let err = train(
        Arc::new(engineered_ctx(quadrants_data(), 3, 128)),
        Some(&complete),
        interrupted,
        &mut clock,
    )
    .unwrap_err();

    assert!(matches!(err, TrainError::AlreadyComplete));
    assert_eq!(err.to_string(), "Tree already fully trained.");
}

/// Law 5: save, load and save again is byte-stable.
#[test]
fn artifact_roundtrip_is_byte_stable() {
    let complete = run_to_completion(engineered_ctx(quadrants_data(), 3, 128), None);

    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.rdt");
    let path_b = dir.path().join("b.rdt");
    save_tree(&complete, &path_a).unwrap();
    let loaded = read_tree(&path_a).unwrap();
    save_tree(&loaded, &path_b).unwrap();

    assert_eq!(
        std::fs::read(&path_a).unwrap(),
        std::fs::read(&path_b).unwrap()
    );
}
