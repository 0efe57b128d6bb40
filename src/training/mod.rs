//! The breadth-first training engine.
//!
//! Training walks a FIFO frontier of nodes awaiting a split decision. For
//! each node, a fixed pool of worker threads evaluates a disjoint slice of
//! the candidate `(u, v)` set against every threshold, accumulating left/right
//! label histograms and scoring Shannon information gain; the driver reduces
//! the per-worker bests, then either commits a split (partitioning the node's
//! pixels into two child work items) or emits a leaf.
//!
//! ## Module map
//!
//! - [`context`]: immutable training state (images, candidates, thresholds)
//! - [`frontier`]: node work items and the seeded root pixel sample
//! - [`histogram`]: the histogram kernel and gain evaluation
//! - [`worker`]: the long-lived worker pool and its barrier handshake
//! - [`partition`]: pixel routing for committed splits
//! - [`checkpoint`]: rebuilding an in-flight frontier from a partial tree
//! - [`trainer`]: the driver loop
//! - [`progress`]: wall-clock depth-transition reporting

pub mod checkpoint;
pub mod context;
pub mod frontier;
pub mod histogram;
pub mod partition;
pub mod progress;
pub mod trainer;
pub mod worker;

pub use context::{TrainContext, TrainParams};
pub use frontier::{root_sample, NodeTrainData, Pixel};
pub use histogram::BestSplit;
pub use progress::ProgressClock;
pub use trainer::{train, TrainOutcome};
pub use worker::WorkerPool;

use thiserror::Error;

use crate::io::CodecError;

/// Errors that terminate a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    /// A label image carries a value outside the declared alphabet.
    #[error("label '{label}' is bigger than expected (max {max})")]
    MalformedInput { label: u8, max: u8 },

    /// Checkpoint was trained against a different label alphabet.
    #[error("checkpoint has {checkpoint} labels, expected {expected}")]
    LabelMismatch { checkpoint: u8, expected: u8 },

    /// Checkpoint was trained against a different camera.
    #[error("checkpoint has FOV {checkpoint:.2}, expected {expected:.2}")]
    FovMismatch { checkpoint: f32, expected: f32 },

    /// Requested depth is lower than what the checkpoint already holds.
    #[error("can't train with a lower depth than checkpoint ({requested} < {checkpoint})")]
    DepthTooShallow { checkpoint: u8, requested: u8 },

    /// Resume found nothing left to train.
    #[error("Tree already fully trained.")]
    AlreadyComplete,

    /// Checkpoint content is structurally inconsistent.
    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    /// Worker pool could not be brought up.
    #[error("error creating worker threads: {0}")]
    Init(std::io::Error),

    /// Artifact I/O failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
