//! # Convolutional Layer
//!
//! Forward-only 2-D convolution layer over `[batch, channels, height, width]`
//! inputs.

use crate::nn::conf::LayerConfig;
use crate::nn::functional;
use crate::nn::listener::IterationListener;
use crate::nn::params::{ConvolutionParamInitializer, ParamInitializer, ParamTable, BIAS_KEY, WEIGHTS_KEY};
use crate::nn::{Backprop, Capability, Layer, LayerError, LayerType};
use crate::tensor::{ops, Tensor, TensorData, TensorError};
use crate::utils::parallel;
use ndarray::{s, Array3, Array4, Axis, Ix4};
use std::sync::Arc;
use tracing::{debug, warn};

/// Convolution layer: one feature map per filter, each the sum over input
/// channels of a valid convolution with that channel's kernel, plus a bias,
/// through the configured activation.
///
/// Parameters:
/// * `weights`: `[n_out, n_in, kernel_height, kernel_width]`
/// * `bias`: `[n_out]`
///
/// The output spatial size is the configured `feature_map_size`; the valid
/// convolution result is broadcast into it and must be compatible.
///
/// The layer has no backward pass. It reports [`Capability::ForwardOnly`]
/// and its [`Backprop`] methods all return [`LayerError::Unsupported`].
#[derive(Debug)]
pub struct ConvolutionLayer {
    conf: LayerConfig,
    params: ParamTable,
    param_initializer: Arc<dyn ParamInitializer>,
    listeners: Vec<Arc<dyn IterationListener>>,
}

impl ConvolutionLayer {
    /// Creates a layer bound to `conf` with an empty parameter table.
    /// Call [`Layer::init_params`] or [`Layer::set_param_table`] before
    /// activating it.
    pub fn new(conf: LayerConfig) -> Result<Self, LayerError> {
        conf.validate()?;
        Ok(ConvolutionLayer {
            conf,
            params: ParamTable::new(),
            param_initializer: Arc::new(ConvolutionParamInitializer),
            listeners: Vec::new(),
        })
    }

    /// Creates a layer and initializes its parameters in one step.
    pub fn initialized(conf: LayerConfig) -> Result<Self, LayerError> {
        let mut layer = Self::new(conf)?;
        layer.init_params()?;
        Ok(layer)
    }

    /// Replaces the initializer used by [`Layer::init_params`].
    pub fn with_initializer(mut self, initializer: Arc<dyn ParamInitializer>) -> Self {
        self.param_initializer = initializer;
        self
    }

    /// Rebinds the layer to a new configuration, keeping its parameters and
    /// listeners.
    ///
    /// Fails if the existing `weights`/`bias` do not have the shapes the new
    /// configuration expects.
    pub fn with_conf(self, conf: LayerConfig) -> Result<Self, LayerError> {
        conf.validate()?;
        let expected = [
            (WEIGHTS_KEY, conf.filter_shape().to_vec()),
            (BIAS_KEY, vec![conf.n_out()]),
        ];
        for (name, shape) in expected {
            if let Some(param) = self.params.get(name) {
                if param.shape() != shape.as_slice() {
                    return Err(LayerError::InvalidArgument(format!(
                        "parameter '{}' has shape {:?}, new configuration expects {:?}",
                        name,
                        param.shape(),
                        shape
                    )));
                }
            }
        }
        Ok(ConvolutionLayer { conf, ..self })
    }

    fn required_param(&self, name: &str) -> Result<&Tensor, LayerError> {
        self.params
            .get(name)
            .ok_or_else(|| LayerError::MissingParam(name.to_string()))
    }
}

impl Layer for ConvolutionLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::Convolutional
    }

    fn capability(&self) -> Capability {
        Capability::ForwardOnly
    }

    fn conf(&self) -> &LayerConfig {
        &self.conf
    }

    fn activate(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        let n_out = self.conf.n_out();
        let [kernel_h, kernel_w] = self.conf.kernel_size();
        let [out_h, out_w] = self.conf.feature_map_size();

        if input.ndim() != 4 {
            return Err(LayerError::InvalidArgument(format!(
                "expected input of shape [batch, channels, height, width], got {:?}",
                input.shape()
            )));
        }
        let (batch, channels, height, width) = (input.shape()[0], input.shape()[1], input.shape()[2], input.shape()[3]);

        // --- Shape checks ---
        let filters = self.required_param(WEIGHTS_KEY)?;
        let bias = self.required_param(BIAS_KEY)?;
        let expected_filters = [n_out, channels, kernel_h, kernel_w];
        if filters.shape() != expected_filters {
            return Err(TensorError::ShapeMismatch {
                expected: expected_filters.to_vec(),
                got: filters.shape().to_vec(),
            }
            .into());
        }
        if bias.shape() != [n_out] {
            return Err(TensorError::ShapeMismatch {
                expected: vec![n_out],
                got: bias.shape().to_vec(),
            }
            .into());
        }
        let (valid_h, valid_w) = ops::valid_output_dims((height, width), (kernel_h, kernel_w))?;
        if !ops::broadcasts_to(&[valid_h, valid_w], &[out_h, out_w]) {
            return Err(TensorError::IncompatibleShapes {
                op: "activate".to_string(),
                shape1: vec![valid_h, valid_w],
                shape2: vec![out_h, out_w],
            }
            .into());
        }

        debug!(
            input_shape = ?input.shape(),
            feature_maps = n_out,
            output_shape = ?[batch, n_out, out_h, out_w],
            activation = %self.conf.activation(),
            "convolution forward"
        );

        // --- Forward pass ---
        let input_data = input.data();
        let input4 = input_data.view().into_dimensionality::<Ix4>().map_err(TensorError::from)?;
        let filter_data = filters.data();
        let filters4 = filter_data.view().into_dimensionality::<Ix4>().map_err(TensorError::from)?;
        let bias_values = bias.to_vec();
        let activation = self.conf.activation();

        // Each feature map owns its accumulator; channels are summed in order.
        let feature_maps = parallel::try_map_indexed(n_out, |f| -> Result<Array3<TensorData>, LayerError> {
            let mut feature_map = Array3::<TensorData>::zeros((batch, out_h, out_w));
            for c in 0..channels {
                let convolved = functional::conv2d_valid_batch(
                    &input4.index_axis(Axis(1), c),
                    &filters4.slice(s![f, c, .., ..]),
                )?;
                let broadcast = convolved.broadcast((batch, out_h, out_w)).ok_or_else(|| {
                    TensorError::IncompatibleShapes {
                        op: "broadcast".to_string(),
                        shape1: convolved.shape().to_vec(),
                        shape2: vec![batch, out_h, out_w],
                    }
                })?;
                feature_map += &broadcast;
            }
            feature_map += bias_values[f];
            activation.apply_inplace(&mut feature_map);
            Ok(feature_map)
        })?;

        let mut output = Array4::<TensorData>::zeros((batch, n_out, out_h, out_w));
        for (f, feature_map) in feature_maps.iter().enumerate() {
            output.index_axis_mut(Axis(1), f).assign(feature_map);
        }
        Ok(Tensor::new(output.into_dyn()))
    }

    fn derivative_activation(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        let activated = self.activate(input)?;
        self.conf
            .activation()
            .derivative_inplace(&mut activated.data_mut().view_mut());
        Ok(activated)
    }

    fn param_table(&self) -> &ParamTable {
        &self.params
    }

    fn param_table_mut(&mut self) -> &mut ParamTable {
        &mut self.params
    }

    fn set_param_table(&mut self, table: ParamTable) {
        for name in self.conf.variables() {
            if !table.contains(name) {
                warn!(variable = %name, "parameter table lacks a declared variable");
            }
        }
        self.params = table;
    }

    fn init_params(&mut self) -> Result<(), LayerError> {
        self.param_initializer.init(&mut self.params, &self.conf)
    }

    fn listeners(&self) -> &[Arc<dyn IterationListener>] {
        &self.listeners
    }

    fn set_listeners(&mut self, listeners: Vec<Arc<dyn IterationListener>>) {
        self.listeners = listeners;
    }
}

impl Backprop for ConvolutionLayer {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::modules::activation::Activation;
    use crate::tensor;

    fn conf(n_in: usize, n_out: usize) -> LayerConfig {
        LayerConfig::builder()
            .n_in(n_in)
            .n_out(n_out)
            .kernel_size(2, 2)
            .feature_map_size(2, 2)
            .activation(Activation::Identity)
            .build()
            .unwrap()
    }

    fn layer_with(n_in: usize, n_out: usize, weights: Vec<f32>, bias: Vec<f32>) -> ConvolutionLayer {
        let mut layer = ConvolutionLayer::new(conf(n_in, n_out)).unwrap();
        layer.set_param(WEIGHTS_KEY, Tensor::from_vec(&[n_out, n_in, 2, 2], weights).unwrap());
        layer.set_param(BIAS_KEY, Tensor::from_vec(&[n_out], bias).unwrap());
        layer
    }

    #[test]
    fn activate_without_params_reports_missing_weights() {
        let layer = ConvolutionLayer::new(conf(1, 1)).unwrap();
        let err = layer.activate(&tensor::zeros(&[1, 1, 3, 3])).unwrap_err();
        assert!(matches!(err, LayerError::MissingParam(ref name) if name == "weights"));
    }

    #[test]
    fn feature_maps_are_written_to_their_own_slice() {
        // map 0 sums each window, map 1 picks the top-left element
        let layer = layer_with(
            1,
            2,
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 100.0],
        );
        let input = Tensor::from_vec(&[1, 1, 3, 3], (1..=9).map(|v| v as f32).collect()).unwrap();
        let out = layer.activate(&input).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2, 2]);
        assert_eq!(out.to_vec(), vec![12.0, 16.0, 24.0, 28.0, 101.0, 102.0, 104.0, 105.0]);
    }

    #[test]
    fn batch_items_are_convolved_independently() {
        let layer = layer_with(1, 1, vec![1.0; 4], vec![0.0]);
        let mut values = vec![0.0; 9];
        values.extend(vec![1.0; 9]);
        let input = Tensor::from_vec(&[2, 1, 3, 3], values).unwrap();
        let out = layer.activate(&input).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 0.0, 0.0, 4.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn derivative_of_sigmoid_is_taken_on_the_activation() {
        let conf = LayerConfig::builder()
            .n_in(1)
            .n_out(1)
            .kernel_size(1, 1)
            .feature_map_size(1, 1)
            .activation(Activation::Sigmoid)
            .build()
            .unwrap();
        let mut layer = ConvolutionLayer::new(conf).unwrap();
        layer.set_param(WEIGHTS_KEY, tensor::ones(&[1, 1, 1, 1]));
        layer.set_param(BIAS_KEY, tensor::zeros(&[1]));

        let out = layer.derivative_activation(&tensor::zeros(&[1, 1, 1, 1])).unwrap();
        // sigmoid(0) = 0.5, then sigmoid'(0.5)
        let s = 1.0 / (1.0 + (-0.5f32).exp());
        assert!((out.to_vec()[0] - s * (1.0 - s)).abs() < 1e-6);
    }

    #[test]
    fn with_conf_rejects_incompatible_parameters() {
        let layer = layer_with(1, 1, vec![1.0; 4], vec![0.0]);
        let wider = conf(1, 3);
        let err = layer.with_conf(wider).unwrap_err();
        assert!(matches!(err, LayerError::InvalidArgument(_)));
    }

    #[test]
    fn with_conf_keeps_parameters_when_shapes_match() {
        let layer = layer_with(1, 1, vec![1.0; 4], vec![0.5]);
        let weights = layer.get_param(WEIGHTS_KEY).unwrap();
        let relu_conf = LayerConfig::builder()
            .n_in(1)
            .n_out(1)
            .kernel_size(2, 2)
            .feature_map_size(2, 2)
            .activation(Activation::Relu)
            .build()
            .unwrap();
        let rebound = layer.with_conf(relu_conf).unwrap();
        assert_eq!(rebound.conf().activation(), Activation::Relu);
        assert!(rebound.get_param(WEIGHTS_KEY).unwrap().shares_storage(&weights));
    }
}
