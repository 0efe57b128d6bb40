//! The histogram kernel and information-gain evaluation.
//!
//! For the pixels reaching a node, a worker accumulates one root label
//! histogram plus a left/right histogram pair per `(uv candidate, threshold)`
//! combination in its slice. Histograms are integer counts; normalization
//! and entropy are computed afterwards, in a fixed order, so every worker and
//! every run agrees exactly.
//!
//! LR histogram layout: the pair for slice-local candidate `c` and threshold
//! `j` starts at `(c * n_thresholds + j) * 2 * n_labels`; the first
//! `n_labels` counters are the left branch (feature < threshold), the next
//! `n_labels` the right.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::features::sample_uv;

use super::frontier::NodeTrainData;
use super::{TrainContext, TrainError};

/// The best split found over a worker's uv slice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BestSplit {
    /// Information gain; 0 means "no usable split".
    pub gain: f32,
    /// Absolute index into the context's uv candidate set.
    pub uv_idx: u32,
    /// Index into the context's threshold set.
    pub t_idx: u32,
    /// Pixels that would go left.
    pub l_count: u32,
    /// Pixels that would go right.
    pub r_count: u32,
}

impl BestSplit {
    pub fn none() -> Self {
        Self {
            gain: 0.0,
            uv_idx: 0,
            t_idx: 0,
            l_count: 0,
            r_count: 0,
        }
    }
}

/// Accumulate the root and LR histograms for `node` over the uv slice
/// `[c_start, c_end)`.
///
/// `root` must hold `n_labels` counters and `lr`
/// `(c_end - c_start) * n_thresholds * 2 * n_labels`; both are expected to
/// be zeroed by the caller. LR accumulation is skipped entirely when the
/// node sits on the terminal level, where it will become a leaf regardless
/// of gain.
///
/// Checks `interrupted` once per pixel and stops early; the partial counts
/// are discarded by the driver in that case.
pub fn accumulate_histograms(
    ctx: &TrainContext,
    node: &NodeTrainData,
    c_start: u32,
    c_end: u32,
    root: &mut [u32],
    lr: &mut [u32],
    interrupted: &AtomicBool,
) -> Result<(), TrainError> {
    let width = ctx.data.width;
    let height = ctx.data.height;
    let n_labels = ctx.n_labels();
    let n_t = ctx.ts.len();
    let terminal = node.depth >= ctx.max_depth() - 1;

    let mut samples = vec![0.0f32; (c_end - c_start) as usize];

    for pixel in &node.pixels {
        if interrupted.load(Ordering::Relaxed) {
            break;
        }

        let depth_image = ctx.data.depth_image(pixel.image as usize);
        let label_image = ctx.data.label_image(pixel.image as usize);
        let pixel_idx = (pixel.y * width + pixel.x) as usize;

        let label = label_image[pixel_idx];
        if label as usize >= n_labels {
            return Err(TrainError::MalformedInput {
                label,
                max: ctx.data.n_labels - 1,
            });
        }

        root[label as usize] += 1;

        if terminal {
            continue;
        }

        let depth = f32::from(depth_image[pixel_idx]);
        for (s, c) in samples.iter_mut().zip(c_start..c_end) {
            *s = sample_uv(
                depth_image,
                width,
                height,
                pixel.x,
                pixel.y,
                depth,
                ctx.uvs[c as usize],
            );
        }

        let mut base = 0usize;
        for &sample in &samples {
            for &threshold in &ctx.ts {
                let idx = if sample < threshold {
                    base + label as usize
                } else {
                    base + n_labels + label as usize
                };
                lr[idx] += 1;
                base += n_labels * 2;
            }
        }
        debug_assert_eq!(base, samples.len() * n_t * n_labels * 2);
    }

    Ok(())
}

/// Normalize an integer histogram into `normalized`.
///
/// Returns `(n_pixels, n_nonzero_labels)`. An empty histogram normalizes
/// to all zeros.
pub fn normalize_histogram(histogram: &[u32], normalized: &mut [f32]) -> (u32, u32) {
    let mut n_pixels = 0u32;
    let mut n_labels = 0u32;
    for &count in histogram {
        if count > 0 {
            n_pixels += count;
            n_labels += 1;
        }
    }

    if n_pixels > 0 {
        for (n, &count) in normalized.iter_mut().zip(histogram) {
            *n = count as f32 / n_pixels as f32;
        }
    } else {
        normalized.fill(0.0);
    }

    (n_pixels, n_labels)
}

/// Shannon entropy of a normalized histogram, in bits.
///
/// Entries at exactly 0 or 1 contribute nothing.
pub fn shannon_entropy(normalized: &[f32]) -> f32 {
    let mut entropy = 0.0f32;
    for &value in normalized {
        if value > 0.0 && value < 1.0 {
            entropy += -value * value.log2();
        }
    }
    entropy
}

/// Information gain of a binary split of `n_pixels` into the two branches.
#[inline]
pub fn split_gain(
    entropy: f32,
    n_pixels: u32,
    l_entropy: f32,
    l_n_pixels: u32,
    r_entropy: f32,
    r_n_pixels: u32,
) -> f32 {
    entropy
        - ((l_n_pixels as f32 / n_pixels as f32) * l_entropy
            + (r_n_pixels as f32 / n_pixels as f32) * r_entropy)
}

/// Scan a worker's LR histograms for the maximum-gain `(uv, t)`.
///
/// `root_n_pixels` and `root_entropy` describe the node's full histogram.
/// Ties keep the first candidate seen (strict `>`), scanning by increasing
/// uv index, then threshold index. Degenerate splits, where one branch is
/// empty, are skipped. `scratch` must hold `n_labels` floats.
pub fn find_best_split(
    ctx: &TrainContext,
    c_start: u32,
    c_end: u32,
    root_n_pixels: u32,
    root_entropy: f32,
    lr: &[u32],
    scratch: &mut [f32],
    interrupted: &AtomicBool,
) -> BestSplit {
    let n_labels = ctx.n_labels();
    let n_t = ctx.ts.len();
    let mut best = BestSplit::none();

    for c in c_start..c_end {
        if interrupted.load(Ordering::Relaxed) {
            break;
        }
        for j in 0..n_t {
            let base = (((c - c_start) as usize * n_t) + j) * n_labels * 2;

            let (l_n, _) = normalize_histogram(&lr[base..base + n_labels], scratch);
            if l_n == 0 || l_n == root_n_pixels {
                continue;
            }
            let l_entropy = shannon_entropy(scratch);

            let (r_n, _) =
                normalize_histogram(&lr[base + n_labels..base + n_labels * 2], scratch);
            let r_entropy = shannon_entropy(scratch);

            let gain = split_gain(root_entropy, root_n_pixels, l_entropy, l_n, r_entropy, r_n);
            if gain > best.gain {
                best = BestSplit {
                    gain,
                    uv_idx: c,
                    t_idx: j as u32,
                    l_count: l_n,
                    r_count: r_n,
                };
            }
        }
    }

    best
}
