//! # Tensor Module
//!
//! This module defines the `Tensor` handle used for layer inputs, outputs and
//! parameters, plus the element-wise and convolution primitives in [`ops`].

use ndarray::{ArrayD, ArrayViewMutD, IxDyn};
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// --- Submodules ---
pub mod ops;

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Incompatible shapes for operation {op}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        op: String,
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
}

/// Element type of every tensor in the crate.
pub type TensorData = f32;

/// # Tensor
///
/// A shape-aware handle around an `ndarray::ArrayD`.
///
/// Cloning a `Tensor` clones the handle, not the data: both handles observe
/// writes made through either one. Layers hand out parameter handles this way
/// so an optimizer can update weights in place.
#[derive(Clone, Debug)]
pub struct Tensor {
    data: Arc<RwLock<ArrayD<TensorData>>>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Creates a new Tensor from an ndarray::ArrayD.
    pub fn new(data: ArrayD<TensorData>) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            data: Arc::new(RwLock::new(data)),
            shape,
        }
    }

    /// Creates a Tensor from a flat row-major buffer.
    ///
    /// # Arguments
    /// * `shape`: Target shape; its product must equal `values.len()`.
    /// * `values`: Elements in row-major order.
    pub fn from_vec(shape: &[usize], values: Vec<TensorData>) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![expected],
                got: vec![values.len()],
            });
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Self::new(data))
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Provides read-only access to the underlying data.
    /// Note: This locks the RwLock for reading.
    pub fn data(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Provides write access to the elements. The guard only hands out
    /// views, so the shape recorded on the handle stays accurate.
    pub fn data_mut(&self) -> TensorWriteGuard<'_> {
        TensorWriteGuard {
            guard: self.data.write().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> ArrayD<TensorData> {
        self.data().clone()
    }

    /// Copies the elements out in row-major order.
    pub fn to_vec(&self) -> Vec<TensorData> {
        self.data().iter().copied().collect()
    }

    /// Returns a new tensor with its own copy of the data.
    pub fn deep_clone(&self) -> Self {
        Tensor::new(self.data_clone())
    }

    /// Overwrites the contents in place with `values`, which must hold
    /// exactly `self.size()` elements. The shape is preserved.
    pub fn assign_flat(&self, values: &[TensorData]) -> Result<(), TensorError> {
        if values.len() != self.size() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.size()],
                got: vec![values.len()],
            });
        }
        let reshaped = ndarray::ArrayViewD::from_shape(IxDyn(&self.shape), values)?;
        self.data_mut().view_mut().assign(&reshaped);
        Ok(())
    }

    /// Returns `true` if both handles point at the same storage.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// Exclusive access to a tensor's elements.
///
/// Reads go through `Deref`; writes go through [`TensorWriteGuard::view_mut`],
/// which cannot reshape or replace the array.
pub struct TensorWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, ArrayD<TensorData>>,
}

impl TensorWriteGuard<'_> {
    pub fn view_mut(&mut self) -> ArrayViewMutD<'_, TensorData> {
        self.guard.view_mut()
    }
}

impl Deref for TensorWriteGuard<'_> {
    type Target = ArrayD<TensorData>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && *self.data() == *other.data()
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)))
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::ones(IxDyn(shape)))
}

/// Concatenates the given tensors into a single rank-1 tensor, visiting each
/// in row-major order.
pub fn flatten_all<'a, I>(tensors: I) -> Tensor
where
    I: IntoIterator<Item = &'a Tensor>,
{
    let mut values = Vec::new();
    for tensor in tensors {
        values.extend(tensor.data().iter().copied());
    }
    Tensor::new(ndarray::Array1::from(values).into_dyn())
}
