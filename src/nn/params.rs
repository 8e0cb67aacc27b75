//! # Parameter Storage and Initialization
//!
//! `ParamTable` holds a layer's named trainable tensors. `ParamInitializer`
//! implementations fill it with correctly shaped starting values.

use crate::nn::conf::LayerConfig;
use crate::nn::LayerError;
use crate::tensor::{self, Tensor, TensorData};
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Name of the filter tensor `[n_out, n_in, kh, kw]`.
pub const WEIGHTS_KEY: &str = "weights";
/// Name of the per-feature-map bias vector `[n_out]`.
pub const BIAS_KEY: &str = "bias";

// --- Parameter Table ---

/// Named trainable tensors owned by one layer.
///
/// Storage is a `BTreeMap`, but flattening and assignment never rely on its
/// key order: both go through [`ParamTable::canonical_order`].
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    params: BTreeMap<String, Tensor>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.params.get(name)
    }

    /// Inserts or replaces a parameter, returning the previous handle.
    pub fn insert(&mut self, name: &str, value: Tensor) -> Option<Tensor> {
        self.params.insert(name.to_string(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sum of element counts over every entry.
    pub fn num_params(&self) -> usize {
        self.params.values().map(Tensor::size).sum()
    }

    /// The order used to flatten and to assign parameters: declared
    /// variables that are present, in declaration order, then any other
    /// entries by name.
    pub fn canonical_order<'a>(&'a self, declared: &'a [String]) -> Vec<&'a str> {
        let mut order: Vec<&str> = declared
            .iter()
            .map(String::as_str)
            .filter(|name| self.params.contains_key(*name))
            .collect();
        order.extend(
            self.params
                .keys()
                .map(String::as_str)
                .filter(|name| !declared.iter().any(|d| d == name)),
        );
        order
    }

    /// Concatenates every parameter into one rank-1 tensor in canonical order.
    pub fn flatten(&self, declared: &[String]) -> Tensor {
        let order = self.canonical_order(declared);
        tensor::flatten_all(order.iter().filter_map(|name| self.params.get(*name)))
    }

    /// Splits `flat` back into the parameters in canonical order and writes
    /// each slice into its tensor in place.
    ///
    /// Nothing is written unless the total length matches. Once it does, every
    /// slice fits its destination, since tensor sizes never change after
    /// construction; the `InvalidState` branch is not reachable through the
    /// public API.
    pub fn assign_flat(&self, declared: &[String], flat: &Tensor) -> Result<(), LayerError> {
        let order = self.canonical_order(declared);
        let expected = self.num_params();
        if flat.size() != expected {
            return Err(LayerError::InvalidArgument(format!(
                "Unable to set parameters: must be of length {} but was {}",
                expected,
                flat.size()
            )));
        }

        let values = flat.to_vec();
        let mut idx = 0;
        for name in order {
            let param = self
                .params
                .get(name)
                .ok_or_else(|| LayerError::MissingParam(name.to_string()))?;
            let len = param.size();
            let slice = values.get(idx..idx + len).ok_or_else(|| {
                LayerError::InvalidState(format!(
                    "Parameter {} should have been of length {} but was {}",
                    name,
                    len,
                    values.len().saturating_sub(idx)
                ))
            })?;
            param.assign_flat(slice)?;
            idx += len;
        }
        Ok(())
    }
}

// --- Weight Initialization ---

/// Scheme used to draw initial filter weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightInit {
    /// All zeros.
    Zero,
    /// Uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
    Uniform,
    /// Uniform in `[-sqrt(6/(fan_in+fan_out)), +sqrt(6/(fan_in+fan_out))]`.
    #[default]
    Xavier,
    /// Gaussian with the given mean and standard deviation.
    Normal { mean: TensorData, std: TensorData },
}

impl WeightInit {
    /// Draws an array of `shape` using `rng`.
    ///
    /// `fan_in` and `fan_out` are the number of inputs and outputs feeding
    /// one unit.
    pub fn sample(
        self,
        shape: &[usize],
        fan_in: usize,
        fan_out: usize,
        rng: &mut StdRng,
    ) -> Result<ArrayD<TensorData>, LayerError> {
        let dim = IxDyn(shape);
        let data = match self {
            WeightInit::Zero => ArrayD::zeros(dim),
            WeightInit::Uniform => {
                let k = 1.0 / (fan_in.max(1) as TensorData).sqrt();
                ArrayD::random_using(dim, Uniform::new_inclusive(-k, k), rng)
            }
            WeightInit::Xavier => {
                let k = (6.0 / (fan_in + fan_out).max(1) as TensorData).sqrt();
                ArrayD::random_using(dim, Uniform::new_inclusive(-k, k), rng)
            }
            WeightInit::Normal { mean, std } => {
                let dist = Normal::new(mean, std).map_err(|e| {
                    LayerError::InvalidConfig(format!("normal weight init: {}", e))
                })?;
                ArrayD::random_using(dim, dist, rng)
            }
        };
        Ok(data)
    }
}

// --- Initializers ---

/// Populates a parameter table for a given configuration.
pub trait ParamInitializer: std::fmt::Debug + Send + Sync {
    fn init(&self, table: &mut ParamTable, conf: &LayerConfig) -> Result<(), LayerError>;
}

/// Creates `weights` `[n_out, n_in, kh, kw]` drawn from the configured
/// [`WeightInit`] and a zero `bias` `[n_out]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvolutionParamInitializer;

impl ParamInitializer for ConvolutionParamInitializer {
    fn init(&self, table: &mut ParamTable, conf: &LayerConfig) -> Result<(), LayerError> {
        let filter_shape = conf.filter_shape();
        let [n_out, n_in, kh, kw] = filter_shape;
        let receptive = kh * kw;
        let mut rng = StdRng::seed_from_u64(conf.seed());

        let weights = conf
            .weight_init()
            .sample(&filter_shape, n_in * receptive, n_out * receptive, &mut rng)?;
        table.insert(WEIGHTS_KEY, Tensor::new(weights));
        table.insert(BIAS_KEY, tensor::zeros(&[n_out]));

        info!(
            filter_shape = ?filter_shape,
            weight_init = ?conf.weight_init(),
            num_params = table.num_params(),
            "initialized convolution parameters"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> Vec<String> {
        vec![WEIGHTS_KEY.to_string(), BIAS_KEY.to_string()]
    }

    fn table() -> ParamTable {
        let mut table = ParamTable::new();
        table.insert(BIAS_KEY, Tensor::from_vec(&[2], vec![10.0, 20.0]).unwrap());
        table.insert(
            WEIGHTS_KEY,
            Tensor::from_vec(&[2, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
        );
        table
    }

    #[test]
    fn canonical_order_puts_declared_first() {
        let mut table = table();
        table.insert("aux", tensor::zeros(&[1]));
        let declared = declared();
        assert_eq!(table.canonical_order(&declared), vec!["weights", "bias", "aux"]);
    }

    #[test]
    fn flatten_uses_declared_order_not_key_order() {
        let flat = table().flatten(&declared());
        assert_eq!(flat.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0]);
    }

    #[test]
    fn assign_flat_writes_through_existing_handles() {
        let table = table();
        let weights = table.get(WEIGHTS_KEY).unwrap().clone();
        let flat = Tensor::from_vec(&[6], vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();
        table.assign_flat(&declared(), &flat).unwrap();
        assert_eq!(weights.shape(), &[2, 1, 1, 2]);
        assert_eq!(weights.to_vec(), vec![6.0, 5.0, 4.0, 3.0]);
        assert_eq!(table.get(BIAS_KEY).unwrap().to_vec(), vec![2.0, 1.0]);
    }

    #[test]
    fn assign_flat_rejects_wrong_length_without_writing() {
        let table = table();
        let flat = tensor::zeros(&[5]);
        let err = table.assign_flat(&declared(), &flat).unwrap_err();
        assert!(matches!(err, LayerError::InvalidArgument(_)));
        assert_eq!(table.get(BIAS_KEY).unwrap().to_vec(), vec![10.0, 20.0]);
    }

    #[test]
    fn initializer_builds_shapes_from_conf() {
        let conf = LayerConfig::builder()
            .n_in(3)
            .n_out(2)
            .kernel_size(2, 2)
            .seed(7)
            .build()
            .unwrap();
        let mut table = ParamTable::new();
        ConvolutionParamInitializer.init(&mut table, &conf).unwrap();
        assert_eq!(table.get(WEIGHTS_KEY).unwrap().shape(), &[2, 3, 2, 2]);
        assert_eq!(table.get(BIAS_KEY).unwrap().to_vec(), vec![0.0, 0.0]);

        // xavier bound for fan_in 12, fan_out 8
        let bound = (6.0f32 / 20.0).sqrt();
        assert!(table
            .get(WEIGHTS_KEY)
            .unwrap()
            .to_vec()
            .iter()
            .all(|w| w.abs() <= bound));
    }

    #[test]
    fn initializer_is_deterministic_per_seed() {
        let conf = LayerConfig::builder()
            .weight_init(WeightInit::Normal { mean: 0.0, std: 1.0 })
            .seed(42)
            .build()
            .unwrap();
        let mut a = ParamTable::new();
        let mut b = ParamTable::new();
        ConvolutionParamInitializer.init(&mut a, &conf).unwrap();
        ConvolutionParamInitializer.init(&mut b, &conf).unwrap();
        assert_eq!(a.get(WEIGHTS_KEY), b.get(WEIGHTS_KEY));
    }

    #[test]
    fn negative_std_is_a_config_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = WeightInit::Normal { mean: 0.0, std: -1.0 }
            .sample(&[2], 1, 1, &mut rng)
            .unwrap_err();
        assert!(matches!(err, LayerError::InvalidConfig(_)));
    }
}
