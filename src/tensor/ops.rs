//! # Tensor Operations
//!
//! Shape helpers and the "valid"-mode convolution primitive the layers build on.

use super::{TensorData, TensorError};
use ndarray::{Array2, ArrayView2, Zip};

// --- Broadcasting ---

/// Returns `true` when an array of shape `from` can be stretched to exactly
/// `to` (one-directional broadcast, as used when accumulating into a fixed
/// destination).
pub fn broadcasts_to(from: &[usize], to: &[usize]) -> bool {
    from.len() <= to.len()
        && from
            .iter()
            .rev()
            .zip(to.iter().rev())
            .all(|(&f, &t)| f == t || f == 1)
}

// --- Convolution ---

/// Output extent of a "valid" convolution along each axis: `signal - kernel + 1`.
pub fn valid_output_dims(signal: (usize, usize), kernel: (usize, usize)) -> Result<(usize, usize), TensorError> {
    let (sh, sw) = signal;
    let (kh, kw) = kernel;
    if kh == 0 || kw == 0 || kh > sh || kw > sw {
        return Err(TensorError::IncompatibleShapes {
            op: "conv2d_valid".to_string(),
            shape1: vec![sh, sw],
            shape2: vec![kh, kw],
        });
    }
    Ok((sh - kh + 1, sw - kw + 1))
}

/// 2-D "valid" cross-correlation: the kernel slides over the signal without
/// padding and without flipping, visiting only positions where it fully
/// overlaps the signal.
///
/// Output shape is `(h - kh + 1, w - kw + 1)`.
pub fn correlate2d_valid(
    signal: &ArrayView2<'_, TensorData>,
    kernel: &ArrayView2<'_, TensorData>,
) -> Result<Array2<TensorData>, TensorError> {
    let out_dims = valid_output_dims(signal.dim(), kernel.dim())?;
    let mut out = Array2::<TensorData>::zeros(out_dims);
    Zip::from(&mut out)
        .and(signal.windows(kernel.dim()))
        .for_each(|o, window| {
            *o = Zip::from(&window)
                .and(kernel)
                .fold(0.0, |acc, &x, &k| acc + x * k);
        });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn broadcasts_to_is_one_directional() {
        assert!(broadcasts_to(&[1, 1], &[3, 3]));
        assert!(broadcasts_to(&[3], &[2, 3]));
        assert!(!broadcasts_to(&[3, 3], &[1, 1]));
        assert!(!broadcasts_to(&[2, 2], &[3, 3]));
    }

    #[test]
    fn correlate_valid_matches_hand_computation() {
        let signal = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let kernel = array![[1.0, 0.0], [0.0, -1.0]];
        let out = correlate2d_valid(&signal.view(), &kernel.view()).unwrap();
        // each window: top-left minus bottom-right
        assert_eq!(out, array![[-4.0, -4.0], [-4.0, -4.0]]);
    }

    #[test]
    fn correlate_valid_does_not_flip_kernel() {
        let signal = array![[1.0, 2.0], [3.0, 4.0]];
        let kernel = array![[1.0, 2.0], [3.0, 4.0]];
        let out = correlate2d_valid(&signal.view(), &kernel.view()).unwrap();
        assert_eq!(out, array![[30.0]]);
    }

    #[test]
    fn kernel_larger_than_signal_is_rejected() {
        let signal = Array2::<TensorData>::zeros((2, 2));
        let kernel = Array2::<TensorData>::zeros((3, 1));
        let err = correlate2d_valid(&signal.view(), &kernel.view()).unwrap_err();
        assert!(matches!(err, TensorError::IncompatibleShapes { .. }));
    }
}
