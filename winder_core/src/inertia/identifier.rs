//! Batch least-squares identification over a buffered excitation window.
//!
//! Three phases, each seeded by the previous one:
//! 1. viscous coefficient from steady high-speed samples,
//! 2. Coulomb friction and inertia jointly from accelerating samples,
//! 3. inertia refined from strongly accelerating samples.
//!
//! A phase without enough qualifying samples (or with a degenerate system)
//! is skipped and keeps its seed.

use nalgebra::{Matrix2, Vector2};

use super::{Parameters, Sample};
use crate::error::EstimatorError;
use crate::events::Phase;
use crate::util::{EPS, sign};

/// |α| separating steady from accelerating samples (rad/s²).
pub const EXCITATION_ALPHA: f64 = 0.5;
/// |α| required for the inertia refinement (rad/s²).
pub const STRONG_ALPHA: f64 = 2.0;
/// |ω| required for the viscous phase (rad/s).
pub const VISCOUS_MIN_OMEGA: f64 = 5.0;

const MIN_VISCOUS_SAMPLES: usize = 10;
const MIN_COULOMB_SAMPLES: usize = 10;
const MIN_REFINE_SAMPLES: usize = 5;
const SINGULAR_RTOL: f64 = 1e-12;

/// Seeds used by a phase that cannot run.
pub const SEED: Parameters = Parameters {
    j_total: 0.1,
    f_coulomb: 3.0,
    f_viscous: 0.05,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Applied,
    TooFewSamples,
    Singular,
    OutOfRange,
}

impl PhaseOutcome {
    pub fn skip_reason(self) -> Option<&'static str> {
        match self {
            Self::Applied => None,
            Self::TooFewSamples => Some("too few qualifying samples"),
            Self::Singular => Some("singular normal equations"),
            Self::OutOfRange => Some("estimate outside physical bounds"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub params: Parameters,
    /// ‖y − Xθ‖ / (‖y‖ + ε) over every buffered sample.
    pub residual: f64,
    pub phases: [(Phase, PhaseOutcome); 3],
}

pub fn identify(samples: &[Sample]) -> Result<Identification, EstimatorError> {
    if samples.is_empty() {
        return Err(EstimatorError::EmptyBuffer);
    }

    let (f_viscous, viscous) = viscous_phase(samples);
    let (f_coulomb, j_total, coulomb) = coulomb_inertia_phase(samples, f_viscous);
    let (j_total, refine) = refine_phase(samples, j_total, f_coulomb, f_viscous);

    let params = Parameters {
        j_total,
        f_coulomb,
        f_viscous,
    };
    let residual = residual(samples, &params);
    if !residual.is_finite() {
        return Err(EstimatorError::NonFinite("residual"));
    }

    Ok(Identification {
        params,
        residual,
        phases: [
            (Phase::Viscous, viscous),
            (Phase::CoulombInertia, coulomb),
            (Phase::InertiaRefinement, refine),
        ],
    })
}

fn viscous_phase(samples: &[Sample]) -> (f64, PhaseOutcome) {
    let mut n = 0usize;
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for s in samples
        .iter()
        .filter(|s| s.alpha.abs() < EXCITATION_ALPHA && s.omega.abs() > VISCOUS_MIN_OMEGA)
    {
        let y = s.net_torque() - SEED.f_coulomb * sign(s.omega);
        sxx += s.omega * s.omega;
        sxy += s.omega * y;
        n += 1;
    }
    if n <= MIN_VISCOUS_SAMPLES {
        return (SEED.f_viscous, PhaseOutcome::TooFewSamples);
    }
    let fv = sxy / (sxx + EPS);
    if !fv.is_finite() {
        return (SEED.f_viscous, PhaseOutcome::OutOfRange);
    }
    (fv.clamp(0.0, Parameters::F_VISCOUS_MAX), PhaseOutcome::Applied)
}

fn coulomb_inertia_phase(samples: &[Sample], f_viscous: f64) -> (f64, f64, PhaseOutcome) {
    let mut n = 0usize;
    let mut a = Matrix2::zeros();
    let mut b = Vector2::zeros();
    for s in samples.iter().filter(|s| s.alpha.abs() > EXCITATION_ALPHA) {
        let x = Vector2::new(sign(s.omega), s.alpha);
        let y = s.net_torque() - f_viscous * s.omega;
        a += x * x.transpose();
        b += x * y;
        n += 1;
    }
    if n <= MIN_COULOMB_SAMPLES {
        return (SEED.f_coulomb, SEED.j_total, PhaseOutcome::TooFewSamples);
    }

    let det = a.determinant();
    let scale = (a[(0, 0)] * a[(1, 1)])
        .abs()
        .max((a[(0, 1)] * a[(1, 0)]).abs())
        .max(f64::MIN_POSITIVE);
    if !(det.abs() > SINGULAR_RTOL * scale) {
        return (SEED.f_coulomb, SEED.j_total, PhaseOutcome::Singular);
    }
    let Some(inv) = a.try_inverse() else {
        return (SEED.f_coulomb, SEED.j_total, PhaseOutcome::Singular);
    };
    let sol = inv * b;
    if !sol.iter().all(|v| v.is_finite()) {
        return (SEED.f_coulomb, SEED.j_total, PhaseOutcome::Singular);
    }
    (
        sol[0].clamp(0.0, Parameters::F_COULOMB_MAX),
        sol[1].clamp(Parameters::J_MIN, Parameters::J_MAX),
        PhaseOutcome::Applied,
    )
}

fn refine_phase(
    samples: &[Sample],
    j_total: f64,
    f_coulomb: f64,
    f_viscous: f64,
) -> (f64, PhaseOutcome) {
    let mut n = 0usize;
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for s in samples.iter().filter(|s| s.alpha.abs() > STRONG_ALPHA) {
        let y = s.net_torque() - f_coulomb * sign(s.omega) - f_viscous * s.omega;
        sxx += s.alpha * s.alpha;
        sxy += s.alpha * y;
        n += 1;
    }
    if n <= MIN_REFINE_SAMPLES {
        return (j_total, PhaseOutcome::TooFewSamples);
    }
    let j = sxy / (sxx + EPS);
    if (Parameters::J_MIN..=Parameters::J_MAX).contains(&j) {
        (j, PhaseOutcome::Applied)
    } else {
        (j_total, PhaseOutcome::OutOfRange)
    }
}

/// Normalized fit residual of `params` over `samples`.
pub fn residual(samples: &[Sample], params: &Parameters) -> f64 {
    let theta = params.to_vector();
    let (mut rr, mut yy) = (0.0, 0.0);
    for s in samples {
        let y = s.net_torque();
        let r = y - s.regressor().dot(&theta);
        rr += r * r;
        yy += y * y;
    }
    rr.sqrt() / (yy.sqrt() + EPS)
}
