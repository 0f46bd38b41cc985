//! Errors
//!
//! Custom error types used throughout the `rank-preserving-calibration` crate.
use thiserror::Error;

/// Errors that can occur while calibrating.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// A vector argument does not match the matrix dimension it pairs with.
    #[error("Dimension mismatch: argument has length {0}, expected {1}.")]
    ShapeMismatch(usize, usize),
    /// Negative entry in the target marginals.
    #[error("Target marginal for class {0} is negative ({1}).")]
    NegativeMarginal(usize, f64),
    /// NaN or infinity found in an input before any iteration.
    #[error("Non-finite value found in {0} at row {1}, column {2}.")]
    NonFiniteInput(String, usize, usize),
    /// A class label outside of `0..n_classes`.
    #[error("Class label {0} is out of range for {1} classes.")]
    LabelOutOfRange(usize, usize),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Iteration budget exhausted before the maximum violation dropped
    /// below tolerance. Recoverable: retry with a larger budget or a
    /// looser tolerance.
    #[error("Calibration did not converge after {0} cycles, last max violation was {1:e}.")]
    DidNotConverge(usize, f64),
    /// A projection step produced NaN or infinite values.
    #[error("Numerical degeneration at cycle {0}, last finite max violation was {1:e}.")]
    NumericalDegeneration(usize, f64),
}
