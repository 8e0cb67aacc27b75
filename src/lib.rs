//! # RConv Core Library
//!
//! This crate provides a forward-only convolution layer for an RTorch-style
//! training framework: the tensor and convolution primitives it is built on,
//! its configuration and parameter storage, and the optimizer hook that
//! writes into that storage.
//! It's designed to be used both directly in Rust and via Python bindings.

pub mod tensor;
pub mod nn;
pub mod optim;
pub mod utils;
#[cfg(feature = "python")]
pub mod bindings;

pub mod prelude {
    pub use crate::nn::{
        Activation, Backprop, Capability, ConvolutionLayer, Gradient, Layer, LayerConfig, LayerError,
        LayerType, ParamTable, WeightInit,
    };
    pub use crate::optim::{Optimizer, SGD};
    pub use crate::tensor::{Tensor, TensorData, TensorError};
}
