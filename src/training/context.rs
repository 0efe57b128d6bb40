//! Immutable training state: images, candidate splits, thresholds.

use rand::Rng;
use rand_mt::Mt19937GenRand32;

use crate::data::TrainData;
use crate::features::UvPair;
use crate::repr::RdTree;

/// Training hyperparameters.
#[derive(Clone, Debug)]
pub struct TrainParams {
    /// Pixels sampled per image for the root node.
    pub n_pixels: u32,
    /// Thresholds tested per uv candidate.
    pub n_thresholds: u32,
    /// Thresholds are evenly spaced on `[-t_range/2, +t_range/2]`.
    pub t_range: f32,
    /// Number of uv candidates drawn.
    pub n_uv: u32,
    /// uv offsets are drawn from `[-uv_range/2, +uv_range/2]` meters
    /// (rescaled to pixel-meters at setup).
    pub uv_range: f32,
    /// Maximum tree depth.
    pub max_depth: u8,
    /// Worker thread count; 0 selects the host's available parallelism.
    pub n_threads: usize,
    /// Background label index recorded in the artifact header.
    pub background_label: u8,
    /// Seed for the uv-candidate and root-sample draws.
    pub seed: u32,
    /// Per-node reporting.
    pub verbose: bool,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n_pixels: 2000,
            n_thresholds: 50,
            t_range: 1.29,
            n_uv: 2000,
            uv_range: 1.29,
            max_depth: 20,
            n_threads: 0,
            background_label: 0,
            seed: 0,
            verbose: false,
        }
    }
}

/// Everything shared read-only across the driver and the workers.
///
/// The uv candidates are drawn first, from a fresh Mersenne-Twister engine
/// seeded with `params.seed`; the root pixel sample (see
/// [`root_sample`](super::root_sample)) draws from a second engine with the
/// same seed. Both the engine and the draw order are part of the
/// reproducibility contract: artifacts are only reproducible with matching
/// seeds and draw sequences.
#[derive(Debug)]
pub struct TrainContext {
    pub data: TrainData,
    pub params: TrainParams,
    /// Candidate uv offset pairs, already rescaled to pixel-meters.
    pub uvs: Vec<UvPair>,
    /// Thresholds, evenly spaced on `[-t_range/2, +t_range/2]`.
    pub ts: Vec<f32>,
}

impl TrainContext {
    pub fn new(data: TrainData, params: TrainParams) -> Self {
        // Pixels per meter at the image plane; uv offsets are specified in
        // meters and applied in pixels after division by depth.
        let ppm = (data.height as f32 / 2.0) / (data.fov / 2.0).tan();
        let uv_range = params.uv_range * ppm;

        let mut rng = Mt19937GenRand32::new(params.seed);
        let uvs = (0..params.n_uv)
            .map(|_| {
                let mut uv = [0.0f32; 4];
                for c in &mut uv {
                    *c = rng.gen_range(-uv_range / 2.0..uv_range / 2.0);
                }
                uv
            })
            .collect();

        let n_t = params.n_thresholds;
        let ts = (0..n_t)
            .map(|i| -params.t_range / 2.0 + i as f32 * params.t_range / (n_t - 1) as f32)
            .collect();

        Self {
            data,
            params,
            uvs,
            ts,
        }
    }

    /// Slots in the breadth-first node array.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        RdTree::n_nodes_for_depth(self.params.max_depth)
    }

    #[inline]
    pub fn n_labels(&self) -> usize {
        self.data.n_labels as usize
    }

    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.params.max_depth as u32
    }
}
