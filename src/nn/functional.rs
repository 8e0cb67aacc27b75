//! # Neural Network Functional Interface (`nn::functional`)
//!
//! Stateless convolution functions over tensors and raw ndarray views.

use crate::tensor::{ops, Tensor, TensorData, TensorError};
use ndarray::{Array3, ArrayView2, ArrayView3, Axis, Ix2};

// --- Convolution ---

/// 2-D "valid" convolution (cross-correlation, no padding) of a rank-2
/// signal with a rank-2 kernel.
///
/// # Arguments
/// * `input`: Tensor of shape `(H, W)`.
/// * `kernel`: Tensor of shape `(kH, kW)` with `kH <= H`, `kW <= W`.
///
/// # Returns
/// * Tensor of shape `(H - kH + 1, W - kW + 1)`.
pub fn conv2d_valid(input: &Tensor, kernel: &Tensor) -> Result<Tensor, TensorError> {
    let input_data = input.data();
    let kernel_data = kernel.data();
    let signal = input_data.view().into_dimensionality::<Ix2>()?;
    let kernel_view = kernel_data.view().into_dimensionality::<Ix2>()?;
    let out = ops::correlate2d_valid(&signal, &kernel_view)?;
    Ok(Tensor::new(out.into_dyn()))
}

/// Batched form of [`conv2d_valid`]: correlates every item of a
/// `(N, H, W)` stack with the same kernel.
pub fn conv2d_valid_batch(
    batch: &ArrayView3<'_, TensorData>,
    kernel: &ArrayView2<'_, TensorData>,
) -> Result<Array3<TensorData>, TensorError> {
    let (n, h, w) = batch.dim();
    let (out_h, out_w) = ops::valid_output_dims((h, w), kernel.dim())?;
    let mut out = Array3::zeros((n, out_h, out_w));
    for (signal, mut slot) in batch.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        slot.assign(&ops::correlate2d_valid(&signal, kernel)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conv2d_valid_shrinks_by_kernel_minus_one() {
        let input = Tensor::from_vec(&[4, 5], (0..20).map(|v| v as f32).collect()).unwrap();
        let kernel = crate::tensor::ones(&[2, 3]);
        let out = conv2d_valid(&input, &kernel).unwrap();
        assert_eq!(out.shape(), &[3, 3]);
        // first window covers 0,1,2 and 5,6,7
        assert_eq!(out.to_vec()[0], 21.0);
    }

    #[test]
    fn conv2d_valid_rejects_wrong_rank() {
        let input = crate::tensor::zeros(&[1, 3, 3]);
        let kernel = crate::tensor::ones(&[2, 2]);
        assert!(matches!(
            conv2d_valid(&input, &kernel),
            Err(TensorError::NdarrayError(_))
        ));
    }

    #[test]
    fn batch_correlates_each_item_independently() {
        let batch = ndarray::Array3::from_shape_vec((2, 2, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        let kernel = ndarray::Array2::<TensorData>::ones((2, 2));
        let out = conv2d_valid_batch(&batch.view(), &kernel.view()).unwrap();
        assert_eq!(out.shape(), &[2, 1, 1]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![10.0, 26.0]);
    }
}
