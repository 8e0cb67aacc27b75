//! # Python Bindings for RConv (`rconv_lib`)
//!
//! This module uses PyO3 to expose the convolution layer to Python as the
//! `rconv_lib` module. Tensors cross the boundary as `(values, shape)` pairs with
//! values flattened in row-major order.

use pyo3::exceptions::{PyKeyError, PyNotImplementedError, PyValueError};
use pyo3::prelude::*;

use crate::nn::{Activation, ConvolutionLayer, Layer, LayerConfig, LayerError, WeightInit};
use crate::tensor::{Tensor, TensorData};

// --- Helper to Convert Rust Errors to Python Exceptions ---

impl From<LayerError> for PyErr {
    fn from(err: LayerError) -> PyErr {
        match err {
            LayerError::Unsupported { .. } => PyNotImplementedError::new_err(err.to_string()),
            LayerError::MissingParam(_) => PyKeyError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

type FlatTensor = (Vec<TensorData>, Vec<usize>);

fn to_flat(tensor: &Tensor) -> FlatTensor {
    (tensor.to_vec(), tensor.shape().to_vec())
}

fn from_flat(values: Vec<TensorData>, shape: &[usize]) -> PyResult<Tensor> {
    Tensor::from_vec(shape, values).map_err(|e| PyValueError::new_err(e.to_string()))
}

// --- ConvolutionLayer Python Wrapper (`rconv_lib.ConvolutionLayer`) ---

#[pyclass(name = "ConvolutionLayer")]
struct PyConvolutionLayer {
    inner: ConvolutionLayer,
}

#[pymethods]
impl PyConvolutionLayer {
    #[new]
    #[pyo3(signature = (n_in, n_out, kernel_size, feature_map_size, activation = "sigmoid", seed = 0))]
    fn py_new(
        n_in: usize,
        n_out: usize,
        kernel_size: (usize, usize),
        feature_map_size: (usize, usize),
        activation: &str,
        seed: u64,
    ) -> PyResult<Self> {
        let activation: Activation = activation
            .parse()
            .map_err(|e: crate::nn::modules::activation::UnknownActivation| PyValueError::new_err(e.to_string()))?;
        let conf = LayerConfig::builder()
            .n_in(n_in)
            .n_out(n_out)
            .kernel_size(kernel_size.0, kernel_size.1)
            .feature_map_size(feature_map_size.0, feature_map_size.1)
            .activation(activation)
            .weight_init(WeightInit::Xavier)
            .seed(seed)
            .build()?;
        Ok(PyConvolutionLayer {
            inner: ConvolutionLayer::new(conf)?,
        })
    }

    fn init_params(&mut self) -> PyResult<()> {
        Ok(self.inner.init_params()?)
    }

    /// Runs the forward pass on a `[batch, channels, height, width]` input.
    fn activate(&self, values: Vec<TensorData>, shape: Vec<usize>) -> PyResult<FlatTensor> {
        let input = from_flat(values, &shape)?;
        Ok(to_flat(&self.inner.activate(&input)?))
    }

    fn get_param(&self, name: &str) -> PyResult<FlatTensor> {
        self.inner
            .get_param(name)
            .map(|t| to_flat(&t))
            .ok_or_else(|| PyKeyError::new_err(name.to_string()))
    }

    fn set_param(&mut self, name: &str, values: Vec<TensorData>, shape: Vec<usize>) -> PyResult<()> {
        let tensor = from_flat(values, &shape)?;
        self.inner.set_param(name, tensor);
        Ok(())
    }

    fn params(&self) -> Vec<TensorData> {
        self.inner.params().to_vec()
    }

    fn set_params(&mut self, values: Vec<TensorData>) -> PyResult<()> {
        let len = values.len();
        let flat = from_flat(values, &[len])?;
        Ok(self.inner.set_params(&flat)?)
    }

    fn num_params(&self) -> usize {
        self.inner.num_params()
    }

    fn __repr__(&self) -> String {
        let conf = self.inner.conf();
        format!(
            "ConvolutionLayer(n_in={}, n_out={}, kernel_size={:?}, feature_map_size={:?}, activation='{}')",
            conf.n_in(),
            conf.n_out(),
            conf.kernel_size(),
            conf.feature_map_size(),
            conf.activation()
        )
    }
}

/// The Python module. Its name must match the `cdylib` file name
/// (`rconv_lib`) for `import rconv_lib` to find the init symbol.
#[pymodule]
fn rconv_lib(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyConvolutionLayer>()?;
    Ok(())
}
