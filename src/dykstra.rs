//! Dykstra's alternating-projection calibration engine.
//!
//! Cyclically projects a working matrix through three convex constraint
//! sets (per-row probability simplex, per-column target marginals,
//! per-column isotonic order) while carrying one dual-increment correction
//! buffer per set. The increment bookkeeping, rather than naive cyclic
//! projection, is what drives the iterates to the point of the
//! intersection nearest the input when the sets do not commute.

use crate::accel;
use crate::constants::{DEFAULT_MAX_ITERS, DEFAULT_TOL, MARGINAL_SUM_WARN_RTOL};
use crate::data::{DenseMatrix, Matrix};
use crate::errors::CalibrationError;
use crate::isotonic::{project_isotonic, NearlyIsotonic};
use crate::marginal::project_marginal_column;
use crate::simplex::project_simplex;
use crate::utils::{
    argsort_stable, validate_finite_matrix, validate_non_negative_float_parameter, validate_positive_float_parameter,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Observer invoked exactly once per completed projection cycle.
///
/// Purely observational: the engine produces the same result whether or
/// not a sink is attached.
pub trait ProgressSink {
    /// * `cycle` - 1-based index of the completed cycle.
    /// * `max_violation` - current maximum constraint violation.
    fn on_cycle(&mut self, cycle: usize, max_violation: f64);
}

struct NullSink;

impl ProgressSink for NullSink {
    fn on_cycle(&mut self, _cycle: usize, _max_violation: f64) {}
}

/// Result of a Dykstra calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// The calibrated matrix, same shape and layout as the input.
    pub q: DenseMatrix<f64>,
    /// Whether the maximum violation dropped below tolerance.
    pub converged: bool,
    /// Number of full projection cycles performed.
    pub iterations: usize,
    /// Maximum constraint violation recorded after each cycle.
    pub residuals: Vec<f64>,
}

/// Configurable Dykstra calibration engine.
///
/// ```
/// use rank_preserving_calibration::{DykstraCalibrator, Matrix, NearlyIsotonic};
///
/// // Column-major: two samples, two classes.
/// let data = vec![0.7, 0.4, 0.3, 0.6];
/// let p = Matrix::new(&data, 2, 2);
/// let result = DykstraCalibrator::default()
///     .set_max_iters(5000)
///     .set_nearly(NearlyIsotonic::Exact)
///     .calibrate(&p, &[1.0, 1.0])
///     .unwrap();
/// assert!(result.converged);
/// ```
#[derive(Debug, Clone)]
pub struct DykstraCalibrator {
    max_iters: usize,
    tol: f64,
    nearly: NearlyIsotonic,
    accelerate: bool,
    strict: bool,
}

impl Default for DykstraCalibrator {
    fn default() -> Self {
        DykstraCalibrator {
            max_iters: DEFAULT_MAX_ITERS,
            tol: DEFAULT_TOL,
            nearly: NearlyIsotonic::Exact,
            accelerate: true,
            strict: true,
        }
    }
}

impl DykstraCalibrator {
    /// Set the iteration budget, in full projection cycles.
    pub fn set_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the convergence threshold on the maximum constraint violation.
    pub fn set_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Choose between strict and epsilon-relaxed monotonicity.
    pub fn set_nearly(mut self, nearly: NearlyIsotonic) -> Self {
        self.nearly = nearly;
        self
    }

    /// Prefer the accelerated execution path. Falls back to the reference
    /// path, without error, when the accelerator is unavailable.
    pub fn set_accelerate(mut self, accelerate: bool) -> Self {
        self.accelerate = accelerate;
        self
    }

    /// If `true` (the default), non-convergence is surfaced as
    /// [`CalibrationError::DidNotConverge`]; otherwise the result is
    /// returned with `converged = false`.
    pub fn set_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Calibrate `p` against the target column marginals `m`.
    ///
    /// * `p` - N×J matrix of raw scores; entries must be finite but need
    ///   not be normalized or non-negative.
    /// * `m` - length-J non-negative target column sums, conventionally
    ///   summing to N.
    pub fn calibrate(&self, p: &Matrix<f64>, m: &[f64]) -> Result<CalibrationResult, CalibrationError> {
        self.calibrate_with_progress(p, m, &mut NullSink)
    }

    /// Calibrate, reporting the violation to `sink` after every cycle.
    pub fn calibrate_with_progress(
        &self,
        p: &Matrix<f64>,
        m: &[f64],
        sink: &mut dyn ProgressSink,
    ) -> Result<CalibrationResult, CalibrationError> {
        self.validate(p, m)?;

        // Rank permutations are fixed from the raw input, one per column.
        let perms: Vec<Vec<usize>> = (0..p.cols).map(|c| argsort_stable(p.get_col(c))).collect();
        let slack = self.nearly.slack();
        let mut state = EngineState::new(p);

        let pool = if self.accelerate { accel::shared_pool() } else { None };
        if self.accelerate && pool.is_none() {
            debug!("Accelerated path requested but unavailable, using the reference path.");
        }

        let mut residuals: Vec<f64> = Vec::new();
        for cycle in 1..=self.max_iters {
            match pool {
                Some(pool) => pool.install(|| cycle_accelerated(&mut state, m, &perms, slack)),
                None => cycle_reference(&mut state, m, &perms, slack),
            }

            if state.q.data.iter().any(|v| !v.is_finite()) {
                let last = residuals.last().copied().unwrap_or(f64::INFINITY);
                return Err(CalibrationError::NumericalDegeneration(cycle, last));
            }

            let violation = max_violation(&state.q, m, &perms, slack);
            residuals.push(violation);
            debug!("cycle {}: max violation {:e}", cycle, violation);
            sink.on_cycle(cycle, violation);

            if violation < self.tol {
                info!("Converged after {} cycles with max violation {:e}.", cycle, violation);
                clip_negatives(&mut state.q);
                return Ok(CalibrationResult {
                    q: state.q,
                    converged: true,
                    iterations: cycle,
                    residuals,
                });
            }
        }

        let residual = residuals.last().copied().unwrap_or(f64::INFINITY);
        if self.strict {
            return Err(CalibrationError::DidNotConverge(self.max_iters, residual));
        }
        warn!("Reached iteration limit before convergence. Try to increase max_iters or relax the tolerance.");
        clip_negatives(&mut state.q);
        Ok(CalibrationResult {
            q: state.q,
            converged: false,
            iterations: self.max_iters,
            residuals,
        })
    }

    fn validate(&self, p: &Matrix<f64>, m: &[f64]) -> Result<(), CalibrationError> {
        if p.rows == 0 || p.cols == 0 {
            return Err(CalibrationError::InvalidParameter(
                "P".to_string(),
                "a non-empty matrix".to_string(),
                format!("{}x{}", p.rows, p.cols),
            ));
        }
        if m.len() != p.cols {
            return Err(CalibrationError::ShapeMismatch(m.len(), p.cols));
        }
        for (j, &target) in m.iter().enumerate() {
            if !target.is_finite() {
                return Err(CalibrationError::NonFiniteInput("M".to_string(), j, 0));
            }
            if target < 0.0 {
                return Err(CalibrationError::NegativeMarginal(j, target));
            }
        }
        validate_finite_matrix(p, "P")?;
        if self.max_iters == 0 {
            return Err(CalibrationError::InvalidParameter(
                "max_iters".to_string(),
                "a positive integer".to_string(),
                "0".to_string(),
            ));
        }
        validate_positive_float_parameter(self.tol, "tol")?;
        if let NearlyIsotonic::Epsilon { eps } = self.nearly {
            validate_non_negative_float_parameter(eps, "eps")?;
        }

        let total: f64 = m.iter().sum();
        let rows = p.rows as f64;
        if (total - rows).abs() > MARGINAL_SUM_WARN_RTOL * rows {
            warn!(
                "Target marginals sum to {} but the matrix has {} rows; convergence will be biased.",
                total, p.rows
            );
        }
        Ok(())
    }
}

/// Calibrate with the default engine settings. See [`DykstraCalibrator`].
pub fn calibrate_dykstra(p: &Matrix<f64>, m: &[f64]) -> Result<CalibrationResult, CalibrationError> {
    DykstraCalibrator::default().calibrate(p, m)
}

/// Working matrix plus one dual-increment buffer per constraint set.
struct EngineState {
    q: DenseMatrix<f64>,
    simplex_corr: DenseMatrix<f64>,
    marginal_corr: DenseMatrix<f64>,
    isotonic_corr: DenseMatrix<f64>,
    weights: Vec<f64>,
}

impl EngineState {
    fn new(p: &Matrix<f64>) -> Self {
        EngineState {
            q: DenseMatrix::from_matrix(p),
            simplex_corr: DenseMatrix::filled(0.0, p.rows, p.cols),
            marginal_corr: DenseMatrix::filled(0.0, p.rows, p.cols),
            isotonic_corr: DenseMatrix::filled(0.0, p.rows, p.cols),
            weights: vec![1.0; p.rows],
        }
    }
}

// The two cycle implementations share the same per-row and per-column step
// routines, so they perform the identical sequence of floating point
// operations within every row and column and agree bit for bit.

fn cycle_reference(state: &mut EngineState, m: &[f64], perms: &[Vec<usize>], slack: f64) {
    let rows = state.q.rows;
    let cols = state.q.cols;

    for i in 0..rows {
        let (row, corr) = simplex_row_step(&state.q, &state.simplex_corr, i);
        for c in 0..cols {
            *state.q.get_mut(i, c) = row[c];
            *state.simplex_corr.get_mut(i, c) = corr[c];
        }
    }
    for c in 0..cols {
        marginal_step(state.q.get_col_mut(c), state.marginal_corr.get_col_mut(c), m[c], slack);
    }
    for c in 0..cols {
        isotonic_step(
            state.q.get_col_mut(c),
            state.isotonic_corr.get_col_mut(c),
            &perms[c],
            slack,
            &state.weights,
        );
    }
}

fn cycle_accelerated(state: &mut EngineState, m: &[f64], perms: &[Vec<usize>], slack: f64) {
    let rows = state.q.rows;

    let q_ref = &state.q;
    let corr_ref = &state.simplex_corr;
    let updates: Vec<(Vec<f64>, Vec<f64>)> = (0..rows)
        .into_par_iter()
        .map(|i| simplex_row_step(q_ref, corr_ref, i))
        .collect();
    for (i, (row, corr)) in updates.into_iter().enumerate() {
        for (c, (rv, cv)) in row.into_iter().zip(corr.into_iter()).enumerate() {
            *state.q.get_mut(i, c) = rv;
            *state.simplex_corr.get_mut(i, c) = cv;
        }
    }

    state
        .q
        .data
        .par_chunks_mut(rows)
        .zip(state.marginal_corr.data.par_chunks_mut(rows))
        .zip(m.par_iter())
        .for_each(|((qcol, ccol), &target)| marginal_step(qcol, ccol, target, slack));

    let weights = &state.weights;
    state
        .q
        .data
        .par_chunks_mut(rows)
        .zip(state.isotonic_corr.data.par_chunks_mut(rows))
        .zip(perms.par_iter())
        .for_each(|((qcol, ccol), perm)| isotonic_step(qcol, ccol, perm, slack, weights));
}

/// Simplex projection of one row applied to (working + correction).
/// Returns the projected row and the updated correction (pre minus post).
fn simplex_row_step(q: &DenseMatrix<f64>, corr: &DenseMatrix<f64>, i: usize) -> (Vec<f64>, Vec<f64>) {
    let mut row: Vec<f64> = q.get_row_iter(i).zip(corr.get_row_iter(i)).map(|(a, b)| a + b).collect();
    let pre = row.clone();
    project_simplex(&mut row);
    let new_corr = pre.iter().zip(row.iter()).map(|(a, b)| a - b).collect();
    (row, new_corr)
}

fn marginal_step(qcol: &mut [f64], ccol: &mut [f64], target: f64, slack: f64) {
    for (qv, cv) in qcol.iter_mut().zip(ccol.iter()) {
        *qv += *cv;
    }
    for (cv, qv) in ccol.iter_mut().zip(qcol.iter()) {
        *cv = *qv;
    }
    project_marginal_column(qcol, target, slack);
    for (cv, qv) in ccol.iter_mut().zip(qcol.iter()) {
        *cv -= *qv;
    }
}

fn isotonic_step(qcol: &mut [f64], ccol: &mut [f64], perm: &[usize], slack: f64, weights: &[f64]) {
    let pre: Vec<f64> = qcol.iter().zip(ccol.iter()).map(|(q, c)| q + c).collect();
    project_isotonic(&pre, weights, perm, slack, qcol);
    for ((cv, qv), pv) in ccol.iter_mut().zip(qcol.iter()).zip(pre.iter()) {
        *cv = pv - qv;
    }
}

/// Maximum absolute constraint violation across the three families:
/// row sums against 1, column sums against the (possibly banded) targets
/// plus any negative mass, and per-column monotonicity under the fixed
/// rank permutations.
fn max_violation(q: &DenseMatrix<f64>, m: &[f64], perms: &[Vec<usize>], slack: f64) -> f64 {
    let mut max = 0.0f64;
    for i in 0..q.rows {
        let sum: f64 = q.get_row_iter(i).sum();
        max = max.max((sum - 1.0).abs());
    }
    for (c, &target) in m.iter().enumerate() {
        let col = q.get_col(c);
        let sum: f64 = col.iter().sum();
        max = max.max(((sum - target).abs() - slack).max(0.0));
        for &v in col {
            if v < 0.0 {
                max = max.max(-v);
            }
        }
        for w in perms[c].windows(2) {
            let decrease = col[w[0]] - col[w[1]] - slack;
            if decrease > max {
                max = decrease;
            }
        }
    }
    max
}

/// Sub-tolerance negatives left by the final isotonic step are clipped on
/// the way out.
fn clip_negatives(q: &mut DenseMatrix<f64>) {
    for v in q.data.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Vec<f64> {
        // Column-major: rows [0.7, 0.3] and [0.4, 0.6].
        vec![0.7, 0.4, 0.3, 0.6]
    }

    #[test]
    fn test_shape_mismatch() {
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let err = calibrate_dykstra(&p, &[1.0]).unwrap_err();
        assert!(matches!(err, CalibrationError::ShapeMismatch(1, 2)));
    }

    #[test]
    fn test_negative_marginal() {
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let err = calibrate_dykstra(&p, &[2.5, -0.5]).unwrap_err();
        assert!(matches!(err, CalibrationError::NegativeMarginal(1, _)));
    }

    #[test]
    fn test_non_finite_input() {
        let data = vec![0.7, 0.4, f64::NAN, 0.6];
        let p = Matrix::new(&data, 2, 2);
        let err = calibrate_dykstra(&p, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, CalibrationError::NonFiniteInput(_, 0, 1)));
    }

    #[test]
    fn test_zero_max_iters_rejected() {
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let err = DykstraCalibrator::default()
            .set_max_iters(0)
            .calibrate(&p, &[1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidParameter(_, _, _)));
    }

    #[test]
    fn test_negative_eps_rejected() {
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let err = DykstraCalibrator::default()
            .set_nearly(NearlyIsotonic::Epsilon { eps: -0.1 })
            .calibrate(&p, &[1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidParameter(_, _, _)));
    }

    #[test]
    fn test_small_matrix_converges() {
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let result = DykstraCalibrator::default()
            .set_max_iters(10_000)
            .calibrate(&p, &[1.0, 1.0])
            .unwrap();
        assert!(result.converged);
        assert_eq!(result.residuals.len(), result.iterations);
        for i in 0..2 {
            let sum: f64 = result.q.get_row_iter(i).sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        for c in 0..2 {
            let sum: f64 = result.q.get_col(c).iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
        assert!(result.q.data.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_strict_surfaces_non_convergence() {
        // sum(M) is twice the row count, so the marginal and simplex sets
        // cannot both be satisfied.
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let err = DykstraCalibrator::default()
            .set_max_iters(5)
            .calibrate(&p, &[2.0, 2.0])
            .unwrap_err();
        match err {
            CalibrationError::DidNotConverge(iterations, residual) => {
                assert_eq!(iterations, 5);
                assert!(residual > 0.0);
            }
            other => panic!("expected DidNotConverge, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_returns_unconverged_result() {
        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let result = DykstraCalibrator::default()
            .set_max_iters(5)
            .set_strict(false)
            .calibrate(&p, &[2.0, 2.0])
            .unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 5);
        assert_eq!(result.residuals.len(), 5);
    }

    #[test]
    fn test_progress_sink_called_once_per_cycle() {
        struct Counter {
            cycles: Vec<usize>,
        }
        impl ProgressSink for Counter {
            fn on_cycle(&mut self, cycle: usize, _max_violation: f64) {
                self.cycles.push(cycle);
            }
        }

        let data = two_by_two();
        let p = Matrix::new(&data, 2, 2);
        let engine = DykstraCalibrator::default().set_max_iters(10_000);

        let mut sink = Counter { cycles: Vec::new() };
        let with_sink = engine.calibrate_with_progress(&p, &[1.0, 1.0], &mut sink).unwrap();
        let without = engine.calibrate(&p, &[1.0, 1.0]).unwrap();

        let expected: Vec<usize> = (1..=with_sink.iterations).collect();
        assert_eq!(sink.cycles, expected);
        // Observation must not change the outcome.
        assert_eq!(with_sink.q.data, without.q.data);
        assert_eq!(with_sink.iterations, without.iterations);
        assert_eq!(with_sink.converged, without.converged);
    }
}
