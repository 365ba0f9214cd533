pub mod error;
pub mod params;
pub mod smoothing; // Iteration predictor for the smoothing step
pub mod shell; // Command runner + per-subject run log
pub mod tools;
pub mod qc; // Distance and smoothness error
pub mod surface; // Per-subject extraction state machine
pub mod batch;

#[cfg(test)]
pub(crate) mod testing;
