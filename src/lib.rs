// Modules
pub mod accel;
pub mod constants;
pub mod data;
pub mod dykstra;
pub mod errors;
pub mod isotonic;
pub mod marginal;
pub mod ovr;
pub mod simplex;
pub mod utils;


// Individual classes, and functions
pub use data::{DenseMatrix, Matrix};
pub use dykstra::{calibrate_dykstra, CalibrationResult, DykstraCalibrator, ProgressSink};
pub use errors::CalibrationError;
pub use isotonic::NearlyIsotonic;
pub use ovr::{calibrate_ovr_isotonic, OvrResult};
