//! # Neural Network Layer Modules
//!
//! Contains the layer implementations and their activation functions.

pub mod activation;
pub use activation::Activation;

pub mod conv;
pub use conv::ConvolutionLayer;
