use crate::data::Matrix;
use crate::errors::CalibrationError;
use std::cmp::Ordering;

/// Stable ascending argsort of a slice of floats.
///
/// Ties are broken by original index order, so re-expanding results back
/// to sample positions is deterministic.
pub fn argsort_stable(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    idx
}

/// Check that every entry of a matrix argument is finite.
pub fn validate_finite_matrix(data: &Matrix<f64>, argument: &str) -> Result<(), CalibrationError> {
    for j in 0..data.cols {
        for (i, v) in data.get_col(j).iter().enumerate() {
            if !v.is_finite() {
                return Err(CalibrationError::NonFiniteInput(argument.to_string(), i, j));
            }
        }
    }
    Ok(())
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), CalibrationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CalibrationError::InvalidParameter(
            parameter.to_string(),
            "a positive finite value".to_string(),
            value.to_string(),
        ));
    }
    Ok(())
}

pub fn validate_non_negative_float_parameter(value: f64, parameter: &str) -> Result<(), CalibrationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CalibrationError::InvalidParameter(
            parameter.to_string(),
            "a non-negative finite value".to_string(),
            value.to_string(),
        ));
    }
    Ok(())
}
