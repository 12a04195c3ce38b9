//! Online identification of roll inertia and shaft friction.
//!
//! The estimator runs a state machine over the per-cycle samples:
//!
//! ```text
//! Idle ──|α|>0.5──▶ Collecting ──n≥min──▶ Identifying ──residual ok──▶ Confirmed ──hold──▶ Tracking
//!                      │  ▲                    │                                          │
//!                      │  └────poor fit────────┘◀─────────────drift───────────────────────┘
//!                      └──timeout──▶ Failed (until reset)
//! ```
//!
//! The torque model is `τ − T·R = J·α + f_c·sign(ω) + f_v·ω`. A batch fit
//! ([`identifier::identify`]) seeds θ, then [`tracker::RecursiveTracker`]
//! follows it one sample at a time.

pub mod identifier;
pub mod tracker;

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};

use crate::config::InertiaCfg;
use crate::error::{EstimatorError, Result};
use crate::events::{EstimatorEvent, EventSink, TracingSink};
use crate::ring::RingBuffer;
use crate::util::{EPS, sign};

use identifier::{EXCITATION_ALPHA, Identification};
use tracker::{Drift, RecursiveTracker, TRACKING_COVARIANCE};

/// Radius at which the web density is back-calculated (m).
pub const DENSITY_REFERENCE_RADIUS: f64 = 0.10;
pub const DENSITY_MIN: f64 = 500.0;
pub const DENSITY_MAX: f64 = 10_000.0;

/// One control cycle as seen by the identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Motor torque command (N·m).
    pub torque: f64,
    /// Shaft speed (rad/s).
    pub omega: f64,
    /// Shaft acceleration (rad/s²).
    pub alpha: f64,
    /// Web tension (N).
    pub web_tension: f64,
    /// Winding radius (m).
    pub radius: f64,
    /// Control time of the cycle (s).
    pub t: f64,
}

impl Sample {
    /// Torque left after removing the web load: `τ − T·R`.
    #[inline]
    pub fn net_torque(&self) -> f64 {
        self.torque - self.web_tension * self.radius
    }

    /// `[α, sign ω, ω]`, matching the layout of [`Parameters::to_vector`].
    #[inline]
    pub fn regressor(&self) -> Vector3<f64> {
        Vector3::new(self.alpha, sign(self.omega), self.omega)
    }

    fn is_finite(&self) -> bool {
        [
            self.torque,
            self.omega,
            self.alpha,
            self.web_tension,
            self.radius,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// θ = [J_total, f_coulomb, f_viscous].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    pub j_total: f64,
    pub f_coulomb: f64,
    pub f_viscous: f64,
}

impl Parameters {
    pub const J_MIN: f64 = 0.01;
    pub const J_MAX: f64 = 10.0;
    pub const F_COULOMB_MAX: f64 = 50.0;
    pub const F_VISCOUS_MAX: f64 = 5.0;

    /// θ at power-up and after `reset`.
    pub const INITIAL: Self = Self {
        j_total: 0.1,
        f_coulomb: 1.0,
        f_viscous: 0.01,
    };

    pub fn clamped(self) -> Self {
        Self {
            j_total: self.j_total.clamp(Self::J_MIN, Self::J_MAX),
            f_coulomb: self.f_coulomb.clamp(0.0, Self::F_COULOMB_MAX),
            f_viscous: self.f_viscous.clamp(0.0, Self::F_VISCOUS_MAX),
        }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.j_total, self.f_coulomb, self.f_viscous)
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self {
            j_total: v[0],
            f_coulomb: v[1],
            f_viscous: v[2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentificationState {
    Idle,
    Collecting,
    Identifying,
    Confirmed,
    Tracking,
    Failed,
}

impl IdentificationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Identifying => "identifying",
            Self::Confirmed => "confirmed",
            Self::Tracking => "tracking",
            Self::Failed => "failed",
        }
    }

    /// θ comes from an accepted identification.
    pub fn is_identified(self) -> bool {
        matches!(self, Self::Confirmed | Self::Tracking)
    }
}

impl std::fmt::Display for IdentificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`InertiaEstimator::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertiaEstimate {
    pub j_total: f64,
    /// `J_total − J_motor − J_roller`.
    pub j_web: f64,
    pub f_coulomb: f64,
    pub f_viscous: f64,
    /// Areal web density (kg/m²).
    pub density: f64,
    /// Relative uncertainty of J (%).
    pub uncertainty_pct: f64,
    pub confidence: f64,
    /// Residual of the last batch fit, if one ran.
    pub residual: Option<f64>,
    pub state: IdentificationState,
    pub timestamp: f64,
    /// Samples currently buffered for identification.
    pub sample_count: usize,
}

/// Inertia/friction identifier with online tracking.
pub struct InertiaEstimator {
    cfg: InertiaCfg,
    state: IdentificationState,
    buffer: RingBuffer<Sample>,
    tracker: RecursiveTracker,
    residual: Option<f64>,
    /// Control time since the last state entry.
    time_in_state: f64,
    /// Control time spent collecting since a fresh collection started.
    /// Survives Identifying → Collecting retries so the watchdog can fire.
    collect_time: f64,
    now: f64,
    sink: Box<dyn EventSink>,
}

impl std::fmt::Debug for InertiaEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InertiaEstimator")
            .field("state", &self.state)
            .field("theta", &self.tracker.parameters())
            .field("buffered", &self.buffer.len())
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl InertiaEstimator {
    pub fn new(cfg: InertiaCfg) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        Ok(Self {
            state: IdentificationState::Idle,
            buffer: RingBuffer::with_capacity(cfg.max_samples),
            tracker: RecursiveTracker::new(
                Parameters::INITIAL,
                cfg.forgetting_factor,
                cfg.history_capacity,
            ),
            residual: None,
            time_in_state: 0.0,
            collect_time: 0.0,
            now: 0.0,
            sink: Box::new(TracingSink),
            cfg,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &InertiaCfg {
        &self.cfg
    }

    /// Feed one control cycle. Always returns a well-formed estimate.
    pub fn update(
        &mut self,
        torque: f64,
        omega: f64,
        alpha: f64,
        web_tension: f64,
        radius: f64,
    ) -> InertiaEstimate {
        let dt = self.cfg.dt;
        self.now += dt;
        self.time_in_state += dt;
        if matches!(
            self.state,
            IdentificationState::Collecting | IdentificationState::Identifying
        ) {
            self.collect_time += dt;
        }

        let sample = Sample {
            torque,
            omega,
            alpha,
            web_tension,
            radius,
            t: self.now,
        };
        if sample.is_finite() {
            self.step(sample);
        } else {
            self.sink.record(&EstimatorEvent::NonFiniteInput {
                estimator: "inertia",
            });
        }
        self.estimate()
    }

    fn step(&mut self, sample: Sample) {
        match self.state {
            IdentificationState::Idle => {
                if sample.alpha.abs() > EXCITATION_ALPHA {
                    self.begin_collection();
                    self.buffer.push(sample);
                }
            }
            IdentificationState::Collecting => {
                self.buffer.push(sample);
                if self.collect_time > self.cfg.collect_timeout_s {
                    self.sink.record(&EstimatorEvent::CollectionTimeout {
                        elapsed: self.collect_time,
                        buffered: self.buffer.len(),
                    });
                    self.buffer.clear();
                    self.transition(IdentificationState::Failed);
                } else if self.buffer.len() >= self.cfg.min_samples {
                    self.transition(IdentificationState::Identifying);
                }
            }
            IdentificationState::Identifying => self.run_identification(),
            IdentificationState::Confirmed => {
                if self.time_in_state > self.cfg.confirm_hold_s {
                    self.transition(IdentificationState::Tracking);
                }
            }
            IdentificationState::Tracking => {
                if let Err(e) = self.tracker.update(&sample) {
                    self.sink.record(&EstimatorEvent::TrackerRejected {
                        reason: e.to_string(),
                    });
                }
                if let Some(drift) = self.tracker.drift(self.cfg.drift_threshold) {
                    self.on_drift(drift);
                }
            }
            IdentificationState::Failed => {}
        }
    }

    fn begin_collection(&mut self) {
        self.buffer.clear();
        self.collect_time = 0.0;
        self.transition(IdentificationState::Collecting);
    }

    fn run_identification(&mut self) {
        match identifier::identify(self.buffer.as_slice()) {
            Ok(id) => self.apply_identification(&id),
            Err(e) => self.fail_identification(e),
        }
    }

    fn apply_identification(&mut self, id: &Identification) {
        for (phase, outcome) in id.phases {
            if let Some(reason) = outcome.skip_reason() {
                self.sink
                    .record(&EstimatorEvent::PhaseSkipped { phase, reason });
            }
        }
        let accepted = id.residual < self.cfg.residual_threshold;
        self.sink.record(&EstimatorEvent::Identified {
            j_total: id.params.j_total,
            f_coulomb: id.params.f_coulomb,
            f_viscous: id.params.f_viscous,
            residual: id.residual,
            accepted,
        });
        self.tracker.set_parameters(id.params);
        self.residual = Some(id.residual);
        if accepted {
            self.tracker.reset_covariance(TRACKING_COVARIANCE);
            self.transition(IdentificationState::Confirmed);
        } else {
            self.transition(IdentificationState::Collecting);
        }
    }

    fn fail_identification(&mut self, e: EstimatorError) {
        self.sink.record(&EstimatorEvent::IdentificationFailed {
            reason: e.to_string(),
        });
        self.buffer.clear();
        self.transition(IdentificationState::Failed);
    }

    fn on_drift(&mut self, drift: Drift) {
        self.sink.record(&EstimatorEvent::DriftDetected {
            recent_j: drift.recent_j,
            baseline_j: drift.baseline_j,
            relative_change: drift.relative_change,
        });
        self.tracker.clear_history();
        self.begin_collection();
    }

    fn transition(&mut self, to: IdentificationState) {
        if to != self.state {
            self.sink.record(&EstimatorEvent::StateChanged {
                from: self.state,
                to,
                at: self.now,
            });
        }
        self.state = to;
        self.time_in_state = 0.0;
    }

    /// Return to power-up state, including control time, so a replay after
    /// `reset` reproduces the same estimates.
    pub fn reset(&mut self) {
        self.state = IdentificationState::Idle;
        self.buffer.clear();
        self.tracker = RecursiveTracker::new(
            Parameters::INITIAL,
            self.cfg.forgetting_factor,
            self.cfg.history_capacity,
        );
        self.residual = None;
        self.time_in_state = 0.0;
        self.collect_time = 0.0;
        self.now = 0.0;
    }

    pub fn state(&self) -> IdentificationState {
        self.state
    }

    pub fn theta(&self) -> Parameters {
        self.tracker.parameters()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn history_len(&self) -> usize {
        self.tracker.history_len()
    }

    pub fn convergence_count(&self) -> usize {
        self.tracker.convergence_count()
    }

    /// Current RLS covariance P.
    pub fn covariance(&self) -> Matrix3<f64> {
        *self.tracker.covariance()
    }

    pub fn uncertainty(&self) -> f64 {
        match self.state {
            IdentificationState::Idle
            | IdentificationState::Collecting
            | IdentificationState::Failed => 100.0,
            IdentificationState::Identifying => 50.0,
            IdentificationState::Confirmed => self
                .residual
                .map_or(100.0, |r| (r * 50.0).clamp(1.0, 100.0)),
            IdentificationState::Tracking => {
                let j = self.tracker.parameters().j_total;
                let var = self.tracker.covariance()[(0, 0)].max(0.0);
                let pct = var.sqrt() / j.abs().max(EPS) * 100.0;
                if pct.is_finite() {
                    pct.clamp(0.1, 100.0)
                } else {
                    100.0
                }
            }
        }
    }

    pub fn confidence(&self) -> f64 {
        match self.state {
            IdentificationState::Idle | IdentificationState::Failed => 0.0,
            IdentificationState::Collecting => 0.3,
            IdentificationState::Identifying => 0.5,
            IdentificationState::Confirmed => 0.8,
            IdentificationState::Tracking => {
                (0.9 + self.tracker.convergence_count() as f64 / 100.0).min(1.0)
            }
        }
    }

    /// Areal density back-calculated from the current J at the reference
    /// radius. Reported in every state; before identification it reflects the
    /// initial θ.
    pub fn density(&self) -> f64 {
        let j_web = self.tracker.parameters().j_total - self.cfg.j_motor - self.cfg.j_roller;
        let denom = (PI * self.cfg.web_width / 2.0)
            * (DENSITY_REFERENCE_RADIUS.powi(4) - self.cfg.core_radius.powi(4));
        if denom.abs() < EPS {
            return self.cfg.nominal_density;
        }
        (j_web / denom).clamp(DENSITY_MIN, DENSITY_MAX)
    }

    /// Expected total inertia of a roll wound to `radius`.
    ///
    /// With `density == None` the back-calculated density is used once the
    /// identifier is confirmed, the nominal density before.
    pub fn analytical_inertia(&self, radius: f64, density: Option<f64>) -> f64 {
        let rho = density.unwrap_or_else(|| {
            if self.state.is_identified() {
                self.density()
            } else {
                self.cfg.nominal_density
            }
        });
        let web = rho * PI * self.cfg.web_width / 2.0
            * (radius.powi(4) - self.cfg.core_radius.powi(4));
        self.cfg.j_motor + self.cfg.j_roller + web
    }

    pub fn estimate(&self) -> InertiaEstimate {
        let p = self.tracker.parameters();
        InertiaEstimate {
            j_total: p.j_total,
            j_web: p.j_total - self.cfg.j_motor - self.cfg.j_roller,
            f_coulomb: p.f_coulomb,
            f_viscous: p.f_viscous,
            density: self.density(),
            uncertainty_pct: self.uncertainty(),
            confidence: self.confidence(),
            residual: self.residual,
            state: self.state,
            timestamp: self.now,
            sample_count: self.buffer.len(),
        }
    }
}
