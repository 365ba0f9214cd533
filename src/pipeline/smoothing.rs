//! Predicts how many `adapt_object_mesh` smoothing iterations bring a surface
//! from its current mean smoothness error down to a target.
//!
//! The smoothness error after `n` iterations is modeled as a hyperbola
//! `error(n) = A / (n - H) + K`, fitted offline on fetal CP surfaces. Its
//! inverse gives the iteration count at which a given error is reached, so
//! the prediction is the difference between the inverse at the target and
//! the inverse at the current error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Value returned by the forward model at its vertical asymptote.
const SINGULAR_CEILING: f64 = 10_000.0;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmoothingError {
    #[error("non-finite smoothness error (current={current}, target={target})")]
    NonFinite { current: f64, target: f64 },
}

/// Calibrated coefficients of the smoothness model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCoefficients {
    /// Scale of the hyperbola.
    pub a: f64,
    /// Horizontal shift (vertical asymptote at `n = h`).
    pub h: f64,
    /// Horizontal asymptote: the smallest error smoothing can reach.
    pub k: f64,
}

impl Default for ModelCoefficients {
    fn default() -> Self {
        Self {
            a: 3.63462484,
            h: -9.62391412,
            k: 0.05865665,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothingPredictor {
    coefficients: ModelCoefficients,
}

// ═══════════════════════════════════════════════════════════
// Model
// ═══════════════════════════════════════════════════════════

impl SmoothingPredictor {
    pub fn new(coefficients: ModelCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> ModelCoefficients {
        self.coefficients
    }

    /// Mean smoothness error expected after `n_smooth` iterations.
    pub fn error_after(&self, n_smooth: f64) -> f64 {
        let ModelCoefficients { a, h, k } = self.coefficients;
        let b = n_smooth - h;
        if b == 0.0 {
            return SINGULAR_CEILING;
        }
        a / b + k
    }

    /// Largest error the model covers (a surface that was never smoothed).
    pub fn max_error(&self) -> f64 {
        self.error_after(0.0)
    }

    /// Asymptotic floor of the model.
    pub fn min_error(&self) -> f64 {
        self.coefficients.k
    }

    /// Inverse of [`error_after`](Self::error_after).
    pub fn iterations_for(&self, mean_smtherr: f64, max_iterations: u32) -> f64 {
        let ModelCoefficients { a, h, k } = self.coefficients;
        let b = mean_smtherr - k;
        if b == 0.0 {
            return f64::from(max_iterations);
        }
        a / b + h
    }

    /// Number of smoothing iterations needed to go from `current` to `target`
    /// mean smoothness error, never more than `max_iterations`.
    pub fn predict_iterations(
        &self,
        current: f64,
        target: f64,
        max_iterations: u32,
    ) -> Result<u32, SmoothingError> {
        if !current.is_finite() || !target.is_finite() {
            return Err(SmoothingError::NonFinite { current, target });
        }

        let floor = self.min_error();
        if current <= target || current <= floor {
            return Ok(0);
        }

        let (mut current, mut target) = (current, target);

        // Beyond the model's domain: slide both down so the gap is kept.
        let ceiling = self.max_error();
        if current > ceiling {
            target -= current - ceiling;
            current = ceiling;
        }
        if target < floor {
            target = floor;
        }

        let n_current = self.iterations_for(current, max_iterations);
        let n_target = self.iterations_for(target, max_iterations);
        let prediction = (n_target - n_current).max(0.0);

        if prediction >= f64::from(max_iterations) {
            return Ok(max_iterations);
        }
        Ok(prediction as u32)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn predict(current: f64, target: f64, max: u32) -> u32 {
        SmoothingPredictor::default()
            .predict_iterations(current, target, max)
            .unwrap()
    }

    #[test]
    fn lower_target_needs_more_iterations() {
        assert!(predict(0.25, 0.10, 200) < predict(0.25, 0.07, 200));
    }

    #[test]
    fn no_smoothing_needed_when_already_below_target() {
        assert_eq!(predict(0.20, 0.30, 200), 0);
        assert_eq!(predict(0.20, 0.20, 200), 0);
    }

    #[test]
    fn no_smoothing_needed_at_model_floor() {
        let floor = SmoothingPredictor::default().min_error();
        assert_eq!(predict(floor, 0.0, 200), 0);
        assert_eq!(predict(floor * 0.5, 0.0, 200), 0);
    }

    #[test]
    fn target_below_floor_is_clamped() {
        assert!(predict(0.30, 0.00001, 99) > 50);
    }

    #[test]
    fn current_above_ceiling_is_clamped() {
        assert!(predict(1.00, 0.20, 99) > 90);
    }

    #[test]
    fn prediction_respects_cap() {
        let currents = [0.06, 0.08, 0.1, 0.2, 0.3, 0.43, 0.5, 1.0, 5.0];
        let targets = [0.0, 0.01, 0.05, 0.07, 0.1, 0.15, 0.3, 1.0];
        for max in [0u32, 1, 10, 99, 200] {
            for &c in &currents {
                for &t in &targets {
                    let n = predict(c, t, max);
                    assert!(n <= max, "predict({c}, {t}, {max}) = {n}");
                }
            }
        }
    }

    #[test]
    fn moderate_error_prediction_matches_model() {
        // iterations_for(0.10) - iterations_for(0.25) ≈ 78.3 - 9.4
        assert_eq!(predict(0.25, 0.10, 200), 68);
    }

    #[test]
    fn forward_and_inverse_agree() {
        let p = SmoothingPredictor::default();
        for n in [0.0, 5.0, 50.0, 150.0] {
            let err = p.error_after(n);
            let back = p.iterations_for(err, 200);
            assert!((back - n).abs() < 1e-6, "n={n} back={back}");
        }
    }

    #[test]
    fn forward_singularity_returns_ceiling_value() {
        let p = SmoothingPredictor::default();
        let h = p.coefficients().h;
        assert_eq!(p.error_after(h), SINGULAR_CEILING);
    }

    #[test]
    fn inverse_singularity_returns_max_iterations() {
        let p = SmoothingPredictor::default();
        assert_eq!(p.iterations_for(p.min_error(), 77), 77.0);
    }

    #[test]
    fn custom_coefficients_are_used() {
        let p = SmoothingPredictor::new(ModelCoefficients {
            a: 1.0,
            h: -1.0,
            k: 0.0,
        });
        // error(n) = 1 / (n + 1): error 0.5 at n=1, 0.1 at n=9
        assert_eq!(p.max_error(), 1.0);
        assert_eq!(p.predict_iterations(0.5, 0.1, 100).unwrap(), 8);
    }

    #[test]
    fn non_finite_input_is_an_error() {
        let p = SmoothingPredictor::default();
        assert!(p.predict_iterations(f64::NAN, 0.1, 100).is_err());
        assert!(p.predict_iterations(0.3, f64::INFINITY, 100).is_err());
    }
}
