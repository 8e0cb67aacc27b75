//! # Neural Network Module (`nn`)
//!
//! Layer traits, configuration, parameter storage and the layer
//! implementations built on them.

use crate::optim::Optimizer;
use crate::tensor::{Tensor, TensorError};
use std::fmt::{self, Debug};
use std::sync::Arc;

// --- Submodules ---
pub mod conf;
pub mod functional;
pub mod gradient;
pub mod listener;
pub mod modules;
pub mod params;

// Re-export common items
pub use conf::{LayerConfig, LayerConfigBuilder};
pub use gradient::Gradient;
pub use listener::IterationListener;
pub use modules::*;
pub use params::{ConvolutionParamInitializer, ParamInitializer, ParamTable, WeightInit};

// --- Errors ---

/// Errors surfaced by the layer API.
#[derive(thiserror::Error, Debug)]
pub enum LayerError {
    /// The layer does not implement this capability. Forward-only layers
    /// answer every training call with this.
    #[error("{op} is not supported by {layer} layers")]
    Unsupported { layer: LayerType, op: &'static str },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Missing parameter '{0}'")]
    MissingParam(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// Shorthand for the "not supported" answer of a capability point.
pub fn unsupported<T>(layer: LayerType, op: &'static str) -> Result<T, LayerError> {
    Err(LayerError::Unsupported { layer, op })
}

// --- Layer classification ---

/// The kind of layer, as reported by [`Layer::layer_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    FeedForward,
    Convolutional,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerType::FeedForward => "feed-forward",
            LayerType::Convolutional => "convolutional",
        };
        f.write_str(name)
    }
}

/// What a layer can do beyond the forward pass.
///
/// Callers should check this before driving a layer through [`Backprop`];
/// a `ForwardOnly` layer answers every [`Backprop`] call with
/// [`LayerError::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ForwardOnly,
    Trainable,
}

// --- Core Trait: Layer ---

/// Forward pass and parameter management shared by every layer.
///
/// The flattened parameter vector (`params`/`set_params`) is always laid out
/// in [`ParamTable::canonical_order`] for the layer's declared variables, so
/// `set_params(&params())` is the identity.
pub trait Layer: Debug + Send + Sync {
    fn layer_type(&self) -> LayerType;

    fn capability(&self) -> Capability;

    /// The configuration this layer is bound to.
    fn conf(&self) -> &LayerConfig;

    /// Performs the forward pass of the layer.
    ///
    /// # Arguments
    /// * `input`: The input batch.
    ///
    /// # Returns
    /// * `Result<Tensor, LayerError>`: A newly allocated activation tensor.
    fn activate(&self, input: &Tensor) -> Result<Tensor, LayerError>;

    /// Alias of [`Layer::activate`].
    fn transform(&self, data: &Tensor) -> Result<Tensor, LayerError> {
        self.activate(data)
    }

    /// Derivative of the configured activation evaluated on `activate(input)`.
    fn derivative_activation(&self, input: &Tensor) -> Result<Tensor, LayerError>;

    fn param_table(&self) -> &ParamTable;

    fn param_table_mut(&mut self) -> &mut ParamTable;

    /// Replaces the whole parameter table.
    fn set_param_table(&mut self, table: ParamTable) {
        *self.param_table_mut() = table;
    }

    /// Returns a handle to the named parameter, if present.
    fn get_param(&self, name: &str) -> Option<Tensor> {
        self.param_table().get(name).cloned()
    }

    fn set_param(&mut self, name: &str, value: Tensor) {
        self.param_table_mut().insert(name, value);
    }

    /// Populates the parameter table with freshly initialized tensors.
    fn init_params(&mut self) -> Result<(), LayerError>;

    /// All parameters flattened into one rank-1 tensor.
    fn params(&self) -> Tensor {
        self.param_table().flatten(self.conf().variables())
    }

    /// Total number of parameter elements.
    fn num_params(&self) -> usize {
        self.param_table().num_params()
    }

    /// Overwrites every parameter from a flattened vector, keeping shapes.
    ///
    /// # Errors
    /// * [`LayerError::InvalidArgument`] if `params` has the wrong total length.
    /// * [`LayerError::InvalidState`] if a slice does not fit its destination.
    fn set_params(&mut self, params: &Tensor) -> Result<(), LayerError> {
        self.param_table().assign_flat(self.conf().variables(), params)
    }

    fn listeners(&self) -> &[Arc<dyn IterationListener>];

    fn set_listeners(&mut self, listeners: Vec<Arc<dyn IterationListener>>);

    /// Drops any per-call state. Layers without such state do nothing.
    fn clear(&mut self) {}
}

// --- Training surface ---

/// Gradient, update and scoring entry points.
///
/// Every method defaults to [`LayerError::Unsupported`]; a layer that really
/// trains overrides them and reports [`Capability::Trainable`].
pub trait Backprop: Layer {
    fn error(&self, _input: &Tensor) -> Result<Gradient, LayerError> {
        unsupported(self.layer_type(), "error")
    }

    fn calc_gradient(&self, _layer_error: &Gradient, _activation: &Tensor) -> Result<Gradient, LayerError> {
        unsupported(self.layer_type(), "calc_gradient")
    }

    fn error_signal(&self, _error: &Gradient, _input: &Tensor) -> Result<Gradient, LayerError> {
        unsupported(self.layer_type(), "error_signal")
    }

    fn backward_gradient(
        &self,
        _z: &Tensor,
        _next_layer: &dyn Layer,
        _next_gradient: &Gradient,
        _activation: &Tensor,
    ) -> Result<Gradient, LayerError> {
        unsupported(self.layer_type(), "backward_gradient")
    }

    fn backward(
        &self,
        _errors: &Gradient,
        _deltas: &Gradient,
        _activation: &Tensor,
        _previous_activation: &str,
    ) -> Result<(Gradient, Gradient), LayerError> {
        unsupported(self.layer_type(), "backward")
    }

    fn merge(&mut self, _other: &dyn Layer, _batch_size: usize) -> Result<(), LayerError> {
        unsupported(self.layer_type(), "merge")
    }

    fn update(&mut self, _gradient: &Gradient) -> Result<(), LayerError> {
        unsupported(self.layer_type(), "update")
    }

    fn fit(&mut self, _data: &Tensor) -> Result<(), LayerError> {
        unsupported(self.layer_type(), "fit")
    }

    fn iterate(&mut self, _input: &Tensor) -> Result<(), LayerError> {
        unsupported(self.layer_type(), "iterate")
    }

    fn gradient(&self) -> Result<Gradient, LayerError> {
        unsupported(self.layer_type(), "gradient")
    }

    fn gradient_and_score(&self) -> Result<(Gradient, f64), LayerError> {
        unsupported(self.layer_type(), "gradient_and_score")
    }

    fn score(&self) -> Result<f64, LayerError> {
        unsupported(self.layer_type(), "score")
    }

    /// Forward pass over the input stored by a previous training call.
    fn activate_stored(&self) -> Result<Tensor, LayerError> {
        unsupported(self.layer_type(), "activate_stored")
    }

    /// The input stored by a previous training call.
    fn input(&self) -> Result<Tensor, LayerError> {
        unsupported(self.layer_type(), "input")
    }

    fn batch_size(&self) -> Result<usize, LayerError> {
        unsupported(self.layer_type(), "batch_size")
    }

    fn pre_output(&self, _x: &Tensor) -> Result<Tensor, LayerError> {
        unsupported(self.layer_type(), "pre_output")
    }

    fn activation_mean(&self) -> Result<Tensor, LayerError> {
        unsupported(self.layer_type(), "activation_mean")
    }

    fn validate_input(&self) -> Result<(), LayerError> {
        unsupported(self.layer_type(), "validate_input")
    }

    fn transpose(&self) -> Result<Box<dyn Layer>, LayerError> {
        unsupported(self.layer_type(), "transpose")
    }

    fn clone_layer(&self) -> Result<Box<dyn Layer>, LayerError> {
        unsupported(self.layer_type(), "clone_layer")
    }

    fn optimizer(&mut self) -> Result<&mut dyn Optimizer, LayerError> {
        unsupported(self.layer_type(), "optimizer")
    }
}
