//! Recursive least squares with exponential forgetting.

use nalgebra::{Matrix3, Vector3};

use super::{Parameters, Sample};
use crate::error::EstimatorError;
use crate::ring::RingBuffer;
use crate::util::EPS;

/// Relative parameter change below which an update counts towards convergence.
const CONVERGENCE_TOL: f64 = 0.02;
const RECENT_WINDOW: usize = 5;
const BASELINE_WINDOW: (usize, usize) = (20, 10);

/// Diagonal of the covariance at power-up (broad prior).
pub const INITIAL_COVARIANCE: f64 = 10.0;
/// Diagonal of the covariance after a confirmed batch fit.
pub const TRACKING_COVARIANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub recent_j: f64,
    pub baseline_j: f64,
    pub relative_change: f64,
}

#[derive(Debug, Clone)]
pub struct RecursiveTracker {
    theta: Vector3<f64>,
    p: Matrix3<f64>,
    lambda: f64,
    history: RingBuffer<Parameters>,
    convergence: usize,
}

impl RecursiveTracker {
    pub fn new(initial: Parameters, lambda: f64, history_capacity: usize) -> Self {
        Self {
            theta: initial.to_vector(),
            p: Matrix3::identity() * INITIAL_COVARIANCE,
            lambda,
            history: RingBuffer::with_capacity(history_capacity),
            convergence: 0,
        }
    }

    pub fn parameters(&self) -> Parameters {
        Parameters::from_vector(&self.theta)
    }

    /// Replace θ (e.g. with a batch result). Covariance is left alone.
    pub fn set_parameters(&mut self, params: Parameters) {
        self.theta = params.clamped().to_vector();
    }

    pub fn reset_covariance(&mut self, diagonal: f64) {
        self.p = Matrix3::identity() * diagonal;
    }

    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.p
    }

    pub fn convergence_count(&self) -> usize {
        self.convergence
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forget the θ history and the convergence streak.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.convergence = 0;
    }

    /// One RLS step. On a non-finite result θ and P are left untouched.
    pub fn update(&mut self, sample: &Sample) -> Result<Parameters, EstimatorError> {
        let phi = sample.regressor();
        let err = sample.net_torque() - phi.dot(&self.theta);
        let p_phi = self.p * phi;
        let denom = self.lambda + phi.dot(&p_phi);
        if !(denom.is_finite() && denom > 0.0) {
            return Err(EstimatorError::NonFinite("RLS gain denominator"));
        }
        let gain = p_phi / denom;
        let theta = self.theta + gain * err;
        // P symmetric, so φᵀP = (Pφ)ᵀ
        let p = (self.p - gain * p_phi.transpose()) / self.lambda;
        if !theta.iter().chain(p.iter()).all(|v| v.is_finite()) {
            return Err(EstimatorError::NonFinite("RLS update"));
        }

        let prev = self.theta;
        let next = Parameters::from_vector(&theta).clamped();
        self.theta = next.to_vector();
        self.p = p;

        let change = (self.theta - prev).norm() / (self.theta.norm() + EPS);
        if change < CONVERGENCE_TOL {
            self.convergence += 1;
        } else {
            self.convergence = 0;
        }
        self.history.push(next);
        Ok(next)
    }

    /// Compare the mean J of the newest entries against an older window.
    pub fn drift(&self, threshold: f64) -> Option<Drift> {
        let n = self.history.len();
        let (far, near) = BASELINE_WINDOW;
        if n < far {
            return None;
        }
        let mean_j = |r: std::ops::Range<usize>| {
            let len = r.len() as f64;
            self.history.range(r).map(|p| p.j_total).sum::<f64>() / len
        };
        let recent_j = mean_j(n - RECENT_WINDOW..n);
        let baseline_j = mean_j(n - far..n - near);
        let relative_change = (recent_j - baseline_j).abs() / (baseline_j + EPS);
        (relative_change > threshold).then_some(Drift {
            recent_j,
            baseline_j,
            relative_change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excite(k: usize) -> Sample {
        let phase = k as f64 * 0.37;
        let omega = 8.0 + 4.0 * phase.sin();
        let alpha = 6.0 * (1.3 * phase).cos();
        Sample {
            torque: 0.4 * alpha + 2.0 * omega.signum() + 0.1 * omega,
            omega,
            alpha,
            web_tension: 0.0,
            radius: 0.1,
            t: 0.0,
        }
    }

    #[test]
    fn converges_on_persistent_excitation() {
        let mut rls = RecursiveTracker::new(SEED_PARAMS, 0.995, 1000);
        for k in 0..2000 {
            rls.update(&excite(k)).unwrap();
        }
        let p = rls.parameters();
        assert!((p.j_total - 0.4).abs() < 1e-3, "{p:?}");
        assert!((p.f_coulomb - 2.0).abs() < 1e-2, "{p:?}");
        assert!((p.f_viscous - 0.1).abs() < 1e-3, "{p:?}");
        assert!(rls.convergence_count() > 100);
        assert_eq!(rls.history_len(), 1000);
    }

    #[test]
    fn no_drift_without_enough_history() {
        let mut rls = RecursiveTracker::new(SEED_PARAMS, 0.995, 1000);
        for k in 0..19 {
            rls.update(&excite(k)).unwrap();
        }
        assert_eq!(rls.drift(0.2), None);
    }

    #[test]
    fn non_finite_sample_leaves_state_untouched() {
        let mut rls = RecursiveTracker::new(SEED_PARAMS, 0.995, 1000);
        let before = rls.parameters();
        let bad = Sample {
            alpha: f64::INFINITY,
            ..excite(0)
        };
        assert!(rls.update(&bad).is_err());
        assert_eq!(rls.parameters(), before);
        assert_eq!(rls.history_len(), 0);
    }

    const SEED_PARAMS: Parameters = Parameters {
        j_total: 0.1,
        f_coulomb: 1.0,
        f_viscous: 0.01,
    };
}
