//! # Optimization Algorithms (`optim`)
//!
//! Update rules that write new values into a layer's parameter table.

use crate::nn::{Gradient, Layer, LayerError};

// --- Submodules ---
pub mod sgd;

// Re-export optimizers
pub use sgd::SGD;

// --- Optimizer Trait ---

/// Base trait for all optimizers.
pub trait Optimizer: std::fmt::Debug + Send {
    /// Performs a single optimization step on `layer`'s parameters.
    ///
    /// # Arguments
    /// * `layer`: The layer whose parameter table is updated in place.
    /// * `gradient`: Gradients keyed by parameter name.
    ///
    /// # Returns
    /// * `Result<(), LayerError>`: Ok(()) if every named parameter was updated.
    fn step(&mut self, layer: &dyn Layer, gradient: &Gradient) -> Result<(), LayerError>;
}
