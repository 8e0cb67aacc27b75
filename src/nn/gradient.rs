//! # Gradients
//!
//! A named collection of gradient tensors, keyed like the parameter table.

use crate::tensor::Tensor;
use std::collections::BTreeMap;

/// Gradients for a layer's parameters, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Gradient {
    gradients: BTreeMap<String, Tensor>,
}

impl Gradient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gradient for `name`, replacing any previous one.
    pub fn set(&mut self, name: &str, gradient: Tensor) {
        self.gradients.insert(name.to_string(), gradient);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.gradients.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.gradients.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }
}
