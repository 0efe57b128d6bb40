//! Shared fixtures: tiny corpora whose split structure is known in advance.
//!
//! All fixtures use flat depth images (1.0 m everywhere) so the depth-offset
//! feature takes exactly two values per probe: 0 when the probe lands
//! in-image, 999 when it falls outside (background minus pixel depth). A
//! `(0, -2)` u-offset therefore separates the top half of a 4x4 image from
//! the bottom, and a `(-2, 0)` u-offset the left half from the right.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use half::f16;

use rdtree::data::TrainData;
use rdtree::repr::RdTree;
use rdtree::training::{train, ProgressClock, TrainContext, TrainParams};

/// `n_images` 4x4 frames: top half label 0, bottom half label 1.
pub fn halves_data(n_images: usize) -> TrainData {
    let wh = 16;
    let labels: Vec<u8> = (0..n_images * wh)
        .map(|i| if (i % wh) < 8 { 0 } else { 1 })
        .collect();
    TrainData::from_blocks(
        4,
        4,
        1.0,
        2,
        n_images,
        vec![f16::from_f32(1.0); n_images * wh],
        labels,
    )
    .unwrap()
}

/// One 4x4 frame labelled by quadrant: 0/1 on top, 2/3 below.
pub fn quadrants_data() -> TrainData {
    let labels: Vec<u8> = (0..16)
        .map(|i| {
            let (x, y) = (i % 4, i / 4);
            match (x < 2, y < 2) {
                (true, true) => 0,
                (false, true) => 1,
                (true, false) => 2,
                (false, false) => 3,
            }
        })
        .collect();
    TrainData::from_blocks(4, 4, 1.0, 4, 1, vec![f16::from_f32(1.0); 16], labels).unwrap()
}

/// Context with hand-picked split candidates: a vertical probe and a
/// horizontal probe. Thresholds stay on the default `[-0.645, 0.645]`
/// spacing, which brackets the two feature values (0 and 999).
pub fn engineered_ctx(data: TrainData, max_depth: u8, n_pixels: u32) -> TrainContext {
    let params = TrainParams {
        n_uv: 2,
        n_thresholds: 4,
        n_pixels,
        max_depth,
        seed: 0,
        ..Default::default()
    };
    let mut ctx = TrainContext::new(data, params);
    ctx.uvs = vec![[0.0, -2.0, 0.0, 0.0], [-2.0, 0.0, 0.0, 0.0]];
    ctx
}

/// Drive an uninterrupted training run to completion.
pub fn run_to_completion(ctx: TrainContext, checkpoint: Option<&RdTree>) -> RdTree {
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut clock = ProgressClock::start();
    let outcome = train(Arc::new(ctx), checkpoint, interrupted, &mut clock).unwrap();
    assert!(!outcome.interrupted);
    outcome.tree
}

/// Serialize a tree to bytes for byte-equality comparisons.
pub fn tree_bytes(tree: &RdTree) -> Vec<u8> {
    let mut bytes = Vec::new();
    rdtree::io::write_to(&mut bytes, tree).unwrap();
    bytes
}
