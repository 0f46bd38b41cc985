//! One-vs-rest isotonic calibration.
//!
//! Decomposes a multi-class problem into one binary isotonic regression
//! per class, then renormalizes each row back onto the simplex. A far
//! simpler caller of the same isotonic projection primitive as the
//! Dykstra engine; it matches marginals only through the per-class fits.

use crate::data::{DenseMatrix, Matrix};
use crate::errors::CalibrationError;
use crate::isotonic::project_isotonic;
use crate::utils::{argsort_stable, validate_finite_matrix};
use serde::{Deserialize, Serialize};

/// Result of a one-vs-rest calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvrResult {
    /// Row-stochastic calibrated matrix, same shape as the input.
    pub q: DenseMatrix<f64>,
}

/// Calibrate class probabilities one class at a time.
///
/// For each class `j`, the binary indicator of `y == j` is regressed
/// isotonically against the raw scores `probs[:, j]` (strict mode,
/// uniform weights), which yields a calibrated probability that is
/// non-decreasing in the raw score. The per-class fits are then
/// renormalized row-wise; a row with no calibrated mass becomes uniform.
///
/// * `y` - length-N class labels in `0..J`.
/// * `probs` - N×J raw probability matrix.
pub fn calibrate_ovr_isotonic(y: &[usize], probs: &Matrix<f64>) -> Result<OvrResult, CalibrationError> {
    let rows = probs.rows;
    let cols = probs.cols;
    if rows == 0 || cols == 0 {
        return Err(CalibrationError::InvalidParameter(
            "probs".to_string(),
            "a non-empty matrix".to_string(),
            format!("{}x{}", rows, cols),
        ));
    }
    if y.len() != rows {
        return Err(CalibrationError::ShapeMismatch(y.len(), rows));
    }
    validate_finite_matrix(probs, "probs")?;
    for &label in y {
        if label >= cols {
            return Err(CalibrationError::LabelOutOfRange(label, cols));
        }
    }

    let weights = vec![1.0; rows];
    let mut q = DenseMatrix::filled(0.0, rows, cols);
    for c in 0..cols {
        let perm = argsort_stable(probs.get_col(c));
        let indicator: Vec<f64> = y.iter().map(|&label| if label == c { 1.0 } else { 0.0 }).collect();
        project_isotonic(&indicator, &weights, &perm, 0.0, q.get_col_mut(c));
    }

    // Per-class fits do not enforce the simplex constraint themselves.
    for i in 0..rows {
        let total: f64 = q.get_row_iter(i).sum();
        if total > 0.0 {
            for c in 0..cols {
                *q.get_mut(i, c) /= total;
            }
        } else {
            let uniform = 1.0 / cols as f64;
            for c in 0..cols {
                *q.get_mut(i, c) = uniform;
            }
        }
    }

    Ok(OvrResult { q })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ovr_basic() {
        let y = vec![0, 1, 2, 0, 1, 2];
        // Column-major 6x3 row-stochastic matrix.
        let data = vec![
            0.8, 0.2, 0.1, 0.6, 0.3, 0.2, // class 0
            0.1, 0.7, 0.2, 0.2, 0.6, 0.2, // class 1
            0.1, 0.1, 0.7, 0.2, 0.1, 0.6, // class 2
        ];
        let probs = Matrix::new(&data, 6, 3);
        let result = calibrate_ovr_isotonic(&y, &probs).unwrap();

        assert_eq!(result.q.rows, 6);
        assert_eq!(result.q.cols, 3);
        for i in 0..6 {
            let sum: f64 = result.q.get_row_iter(i).sum();
            assert!((sum - 1.0).abs() < 1e-6, "row {} sums to {}", i, sum);
        }
        assert!(result.q.data.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_ovr_rank_preserved_per_column() {
        let y = vec![0, 1, 2, 0, 1, 2];
        let data = vec![
            0.8, 0.2, 0.1, 0.6, 0.3, 0.2, //
            0.1, 0.7, 0.2, 0.2, 0.6, 0.2, //
            0.1, 0.1, 0.7, 0.2, 0.1, 0.6, //
        ];
        let probs = Matrix::new(&data, 6, 3);
        calibrate_ovr_isotonic(&y, &probs).unwrap();

        // Before renormalization the fits are monotone in the raw score;
        // check the raw per-class fits via a fresh projection.
        let weights = vec![1.0; 6];
        for c in 0..3 {
            let perm = argsort_stable(probs.get_col(c));
            let indicator: Vec<f64> = y.iter().map(|&label| if label == c { 1.0 } else { 0.0 }).collect();
            let mut fit = vec![0.0; 6];
            project_isotonic(&indicator, &weights, &perm, 0.0, &mut fit);
            for w in perm.windows(2) {
                assert!(fit[w[0]] <= fit[w[1]] + 1e-12);
            }
        }
    }

    #[test]
    fn test_ovr_calibration_effect() {
        let y = vec![0, 0, 1, 1];
        // Anti-calibrated for class 0: high scores on true class-0 rows
        // should rise further, low scores on class-1 rows should fall.
        let data = vec![
            0.8, 0.7, 0.3, 0.2, // class 0
            0.2, 0.3, 0.7, 0.8, // class 1
        ];
        let probs = Matrix::new(&data, 4, 2);
        let result = calibrate_ovr_isotonic(&y, &probs).unwrap();

        assert!(*result.q.get(0, 0) > *probs.get(0, 0));
        assert!(*result.q.get(1, 0) > *probs.get(1, 0));
        assert!(*result.q.get(2, 0) < *probs.get(2, 0));
        assert!(*result.q.get(3, 0) < *probs.get(3, 0));
    }

    #[test]
    fn test_ovr_label_out_of_range() {
        let data = vec![0.5, 0.5, 0.5, 0.5];
        let probs = Matrix::new(&data, 2, 2);
        let err = calibrate_ovr_isotonic(&[0, 2], &probs).unwrap_err();
        assert!(matches!(err, CalibrationError::LabelOutOfRange(2, 2)));
    }

    #[test]
    fn test_ovr_length_mismatch() {
        let data = vec![0.5, 0.5, 0.5, 0.5];
        let probs = Matrix::new(&data, 2, 2);
        let err = calibrate_ovr_isotonic(&[0], &probs).unwrap_err();
        assert!(matches!(err, CalibrationError::ShapeMismatch(1, 2)));
    }
}
