//! # Activation Functions
//!
//! Element-wise non-linearities selected by identifier in the layer
//! configuration, together with their derivatives.

use crate::tensor::TensorData;
use ndarray::{ArrayBase, DataMut, Dimension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slope of `LeakyRelu` for negative inputs.
pub const LEAKY_RELU_SLOPE: TensorData = 0.01;

/// An element-wise activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// `f(x) = x`
    #[serde(alias = "linear")]
    Identity,
    /// `f(x) = 1 / (1 + exp(-x))`
    #[default]
    Sigmoid,
    Tanh,
    /// `f(x) = max(0, x)`
    Relu,
    LeakyRelu,
    /// `tanh` clipped to a hard ramp: `clamp(x, -1, 1)`
    HardTanh,
    /// `f(x) = ln(1 + exp(x))`
    Softplus,
    Exp,
}

impl Activation {
    /// Applies the function to a single value.
    pub fn apply(self, x: TensorData) -> TensorData {
        match self {
            Activation::Identity => x,
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_RELU_SLOPE * x
                }
            }
            Activation::HardTanh => x.clamp(-1.0, 1.0),
            Activation::Softplus => softplus(x),
            Activation::Exp => x.exp(),
        }
    }

    /// Derivative of the function at `x`.
    pub fn derivative(self, x: TensorData) -> TensorData {
        match self {
            Activation::Identity => 1.0,
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_RELU_SLOPE
                }
            }
            Activation::HardTanh => {
                if (-1.0..=1.0).contains(&x) {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Softplus => sigmoid(x),
            Activation::Exp => x.exp(),
        }
    }

    /// Applies the function to every element in place.
    pub fn apply_inplace<S, D>(self, values: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = TensorData>,
        D: Dimension,
    {
        if self != Activation::Identity {
            values.mapv_inplace(|x| self.apply(x));
        }
    }

    /// Replaces every element with the derivative evaluated there.
    pub fn derivative_inplace<S, D>(self, values: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = TensorData>,
        D: Dimension,
    {
        values.mapv_inplace(|x| self.derivative(x));
    }

    /// The identifier accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::LeakyRelu => "leakyrelu",
            Activation::HardTanh => "hardtanh",
            Activation::Softplus => "softplus",
            Activation::Exp => "exp",
        }
    }
}

fn sigmoid(x: TensorData) -> TensorData {
    1.0 / (1.0 + (-x).exp())
}

// Stable for large |x|.
fn softplus(x: TensorData) -> TensorData {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raised for an activation identifier that names no known function.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown activation function '{0}'")]
pub struct UnknownActivation(pub String);

impl FromStr for Activation {
    type Err = UnknownActivation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" | "linear" => Ok(Activation::Identity),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            "leakyrelu" => Ok(Activation::LeakyRelu),
            "hardtanh" => Ok(Activation::HardTanh),
            "softplus" => Ok(Activation::Softplus),
            "exp" => Ok(Activation::Exp),
            _ => Err(UnknownActivation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const ALL: [Activation; 8] = [
        Activation::Identity,
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::Relu,
        Activation::LeakyRelu,
        Activation::HardTanh,
        Activation::Softplus,
        Activation::Exp,
    ];

    #[test]
    fn names_round_trip_through_from_str() {
        for act in ALL {
            assert_eq!(act.name().parse::<Activation>().unwrap(), act);
        }
        assert_eq!("LINEAR".parse::<Activation>().unwrap(), Activation::Identity);
        assert!("softmax".parse::<Activation>().is_err());
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let h = 1e-3;
        for act in ALL {
            for &x in &[-1.7f32, -0.3, 0.4, 2.2] {
                let numeric = (act.apply(x + h) - act.apply(x - h)) / (2.0 * h);
                let analytic = act.derivative(x);
                assert!(
                    (numeric - analytic).abs() < 1e-2,
                    "{} at {}: numeric {} vs analytic {}",
                    act,
                    x,
                    numeric,
                    analytic
                );
            }
        }
    }

    #[test]
    fn apply_inplace_maps_every_element() {
        let mut values = array![[-2.0f32, 0.5], [3.0, -0.1]];
        Activation::Relu.apply_inplace(&mut values);
        assert_eq!(values, array![[0.0, 0.5], [3.0, 0.0]]);
    }

    #[test]
    fn softplus_is_stable_for_large_inputs() {
        assert!(Activation::Softplus.apply(100.0).is_finite());
        assert!((Activation::Softplus.apply(100.0) - 100.0).abs() < 1e-4);
        assert!(Activation::Softplus.apply(-100.0) >= 0.0);
    }
}
