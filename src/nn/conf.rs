//! # Layer Configuration
//!
//! Immutable per-layer settings. A layer never mutates its configuration;
//! binding a different one produces a new layer.

use crate::nn::modules::activation::Activation;
use crate::nn::params::{WeightInit, BIAS_KEY, WEIGHTS_KEY};
use crate::nn::LayerError;
use serde::{Deserialize, Serialize};

fn default_variables() -> Vec<String> {
    vec![WEIGHTS_KEY.to_string(), BIAS_KEY.to_string()]
}

/// Settings for a convolution layer.
///
/// Deserializable so the surrounding framework can produce it from its own
/// configuration format; call [`LayerConfig::validate`] on anything that did
/// not come from [`LayerConfigBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Input channels.
    n_in: usize,
    /// Output feature maps (number of filters).
    n_out: usize,
    /// `[kernel_height, kernel_width]`
    kernel_size: [usize; 2],
    /// `[out_height, out_width]` of every feature map.
    feature_map_size: [usize; 2],
    #[serde(default)]
    activation: Activation,
    #[serde(default)]
    weight_init: WeightInit,
    #[serde(default)]
    seed: u64,
    /// Trainable variable names in their canonical order.
    #[serde(default = "default_variables")]
    variables: Vec<String>,
}

impl LayerConfig {
    pub fn builder() -> LayerConfigBuilder {
        LayerConfigBuilder::default()
    }

    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Number of feature maps produced by the layer.
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    pub fn kernel_size(&self) -> [usize; 2] {
        self.kernel_size
    }

    pub fn feature_map_size(&self) -> [usize; 2] {
        self.feature_map_size
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weight_init(&self) -> WeightInit {
        self.weight_init
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Full filter tensor shape: `[n_out, n_in, kh, kw]`.
    pub fn filter_shape(&self) -> [usize; 4] {
        [self.n_out, self.n_in, self.kernel_size[0], self.kernel_size[1]]
    }

    /// Checks the invariants [`LayerConfigBuilder::build`] enforces.
    pub fn validate(&self) -> Result<(), LayerError> {
        if self.n_in == 0 {
            return Err(LayerError::InvalidConfig("n_in must be positive".into()));
        }
        if self.n_out == 0 {
            return Err(LayerError::InvalidConfig("n_out must be positive".into()));
        }
        if self.kernel_size.contains(&0) {
            return Err(LayerError::InvalidConfig(format!(
                "kernel size {:?} has an empty dimension",
                self.kernel_size
            )));
        }
        if self.feature_map_size.contains(&0) {
            return Err(LayerError::InvalidConfig(format!(
                "feature map size {:?} has an empty dimension",
                self.feature_map_size
            )));
        }
        if self.variables.is_empty() {
            return Err(LayerError::InvalidConfig("no trainable variables declared".into()));
        }
        for (i, name) in self.variables.iter().enumerate() {
            if self.variables[..i].contains(name) {
                return Err(LayerError::InvalidConfig(format!("variable '{}' declared twice", name)));
            }
        }
        Ok(())
    }
}

/// Builder for [`LayerConfig`].
#[derive(Debug, Clone)]
pub struct LayerConfigBuilder {
    n_in: usize,
    n_out: usize,
    kernel_size: [usize; 2],
    feature_map_size: [usize; 2],
    activation: Activation,
    weight_init: WeightInit,
    seed: u64,
    variables: Vec<String>,
}

impl Default for LayerConfigBuilder {
    fn default() -> Self {
        LayerConfigBuilder {
            n_in: 1,
            n_out: 1,
            kernel_size: [2, 2],
            feature_map_size: [2, 2],
            activation: Activation::default(),
            weight_init: WeightInit::default(),
            seed: 0,
            variables: default_variables(),
        }
    }
}

impl LayerConfigBuilder {
    pub fn n_in(mut self, n_in: usize) -> Self {
        self.n_in = n_in;
        self
    }

    pub fn n_out(mut self, n_out: usize) -> Self {
        self.n_out = n_out;
        self
    }

    pub fn kernel_size(mut self, height: usize, width: usize) -> Self {
        self.kernel_size = [height, width];
        self
    }

    pub fn feature_map_size(mut self, height: usize, width: usize) -> Self {
        self.feature_map_size = [height, width];
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn weight_init(mut self, weight_init: WeightInit) -> Self {
        self.weight_init = weight_init;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<LayerConfig, LayerError> {
        let conf = LayerConfig {
            n_in: self.n_in,
            n_out: self.n_out,
            kernel_size: self.kernel_size,
            feature_map_size: self.feature_map_size,
            activation: self.activation,
            weight_init: self.weight_init,
            seed: self.seed,
            variables: self.variables,
        };
        conf.validate()?;
        Ok(conf)
    }
}
