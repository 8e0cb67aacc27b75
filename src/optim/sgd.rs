//! # Stochastic Gradient Descent (SGD) Optimizer

use super::Optimizer;
use crate::nn::{Gradient, Layer, LayerError};
use crate::tensor::{TensorData, TensorError};
use tracing::debug;

/// Plain gradient descent: `param -= lr * grad`.
#[derive(Debug, Clone)]
pub struct SGD {
    lr: TensorData,
}

impl SGD {
    /// Creates a new SGD optimizer instance.
    ///
    /// # Arguments
    /// * `lr`: Learning rate; must be finite and non-negative.
    pub fn new(lr: TensorData) -> Result<Self, LayerError> {
        if !lr.is_finite() || lr < 0.0 {
            return Err(LayerError::InvalidArgument(format!(
                "Invalid learning rate: {}",
                lr
            )));
        }
        Ok(SGD { lr })
    }

    pub fn lr(&self) -> TensorData {
        self.lr
    }
}

impl Optimizer for SGD {
    fn step(&mut self, layer: &dyn Layer, gradient: &Gradient) -> Result<(), LayerError> {
        // Validate everything first so a bad entry leaves the table untouched.
        let mut updates = Vec::with_capacity(gradient.len());
        for (name, grad) in gradient.iter() {
            let param = layer
                .get_param(name)
                .ok_or_else(|| LayerError::MissingParam(name.to_string()))?;
            if param.shape() != grad.shape() {
                return Err(TensorError::ShapeMismatch {
                    expected: param.shape().to_vec(),
                    got: grad.shape().to_vec(),
                }
                .into());
            }
            updates.push((param, grad));
        }

        for (param, grad) in updates {
            let grad_data = grad.data();
            if param.shares_storage(grad) {
                // same lock; update from a copy
                let copy = grad_data.clone();
                drop(grad_data);
                param.data_mut().view_mut().scaled_add(-self.lr, &copy);
            } else {
                param.data_mut().view_mut().scaled_add(-self.lr, &*grad_data);
            }
        }
        debug!(lr = self.lr, params = gradient.len(), "sgd step");
        Ok(())
    }
}
