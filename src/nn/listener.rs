//! # Iteration Listeners
//!
//! Observers a training loop may attach to a layer. Layers only store them;
//! invoking them is the caller's job.

use crate::nn::Layer;
use std::fmt::Debug;

/// Callback for training-loop progress.
pub trait IterationListener: Debug + Send + Sync {
    /// Called by the training loop after iteration `iteration` on `layer`.
    fn iteration_done(&self, layer: &dyn Layer, iteration: usize);
}
