/// Default number of full projection cycles before the engine gives up.
pub const DEFAULT_MAX_ITERS: usize = 1000;
/// Default convergence threshold on the maximum constraint violation.
pub const DEFAULT_TOL: f64 = 1e-7;
/// Relative tolerance within which the accelerated and reference
/// execution paths must agree on the calibrated matrix.
pub const PATH_AGREEMENT_RTOL: f64 = 1e-7;
/// Relative slack allowed between `sum(M)` and the number of rows before
/// a warning is emitted.
pub const MARGINAL_SUM_WARN_RTOL: f64 = 1e-8;
