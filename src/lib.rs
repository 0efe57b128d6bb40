//! rdtree: randomised decision tree training for per-pixel body-part
//! classification from depth images.
//!
//! Trains a single decision tree over depth/label image pairs using the
//! offset-depth-feature / Shannon-information-gain formulation. Each internal
//! node stores a pair of 2D offsets `(u, v)` and a threshold `t`; each leaf
//! stores a label probability distribution.
//!
//! # Key Types
//!
//! - [`TrainContext`] / [`TrainParams`] - Training configuration and immutable state
//! - [`training::train`] - The breadth-first training driver
//! - [`RdTree`] / [`Node`] - The flat tree representation
//! - [`TrainData`] - Depth/label image blocks
//!
//! # Training
//!
//! Load a [`TrainData`] (see [`data::loader`]), build a [`TrainContext`], and
//! call [`training::train`]. Interrupted runs produce a checkpoint artifact
//! that can be resumed by passing the partial tree back in.
//!
//! # Artifacts
//!
//! Trees are saved with [`io::save_tree`] (binary RDT format) and
//! [`io::save_tree_json`] (sibling JSON dump), and loaded with
//! [`io::read_tree`].

pub mod data;
pub mod features;
pub mod inference;
pub mod io;
pub mod repr;
pub mod training;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::TrainData;
pub use repr::{Node, RdTree, TreeHeader, UvPair};
pub use training::{train, ProgressClock, TrainContext, TrainError, TrainOutcome, TrainParams};
