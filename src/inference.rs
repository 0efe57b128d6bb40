//! Per-pixel label inference against a trained forest.
//!
//! Every pixel descends each tree from the root, evaluating the same
//! depth-offset feature used during training, and accumulates the leaf's
//! label probability table; the result is averaged over the trees.

use half::f16;
use rayon::prelude::*;

use crate::features::sample_uv;
use crate::repr::RdTree;

/// Infer per-pixel label probabilities for one depth image.
///
/// `output_pr` must hold `width * height * n_labels` floats and is written
/// row-major, labels innermost. All trees must share a label alphabet.
///
/// # Panics
///
/// Panics if `forest` is empty or the buffer sizes don't match the image.
pub fn infer_labels(
    forest: &[RdTree],
    depth_image: &[f16],
    width: i32,
    height: i32,
    output_pr: &mut [f32],
) {
    assert!(!forest.is_empty(), "empty forest");
    let n_labels = forest[0].header.n_labels as usize;
    assert_eq!(depth_image.len(), (width * height) as usize);
    assert_eq!(output_pr.len(), depth_image.len() * n_labels);

    let row_stride = width as usize * n_labels;
    output_pr
        .par_chunks_mut(row_stride)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..width {
                let depth = f32::from(depth_image[(y as i32 * width + x) as usize]);
                let out = &mut out_row[x as usize * n_labels..(x as usize + 1) * n_labels];
                out.fill(0.0);

                for tree in forest {
                    if let Some(table) = descend(tree, depth_image, width, height, x, y as i32, depth)
                    {
                        for (o, p) in out.iter_mut().zip(table) {
                            *o += p;
                        }
                    }
                }
                for o in out.iter_mut() {
                    *o /= forest.len() as f32;
                }
            }
        });
}

/// Walk one tree to a leaf, returning its probability table.
fn descend<'t>(
    tree: &'t RdTree,
    depth_image: &[f16],
    width: i32,
    height: i32,
    x: i32,
    y: i32,
    depth: f32,
) -> Option<&'t [f32]> {
    let mut id = 0usize;
    let mut node = tree.nodes.first()?;
    while node.is_internal() {
        let value = sample_uv(depth_image, width, height, x, y, depth, node.uv);
        id = if value < node.t { 2 * id + 1 } else { 2 * id + 2 };
        node = tree.nodes.get(id)?;
    }
    tree.leaf_table(node)
}
