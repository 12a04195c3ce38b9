//! Sensorless web tension.
//!
//! At standstill the only usable information is the torque balance on the
//! winding shaft; at speed the span model (or a load cell) is better. The
//! observer blends both with a weight that ramps with |ω| and smooths the
//! result with an EMA.

use winder_traits::{FrictionObserver, SpanModel};

use crate::config::TensionCfg;
use crate::error::Result;
use crate::events::{EstimatorEvent, EventSink, TracingSink};
use crate::util::ramp;

/// Smallest inertia used in the torque balance (kg·m²).
const MIN_INERTIA: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensionMode {
    Torque,
    Fusion,
    Span,
}

impl std::fmt::Display for TensionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Torque => "torque",
            Self::Fusion => "fusion",
            Self::Span => "span",
        })
    }
}

/// Inputs of one observer cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensionInput {
    /// Motor torque (N·m); negative while braking the winder.
    pub torque: f64,
    pub omega: f64,
    pub alpha: f64,
    pub radius: f64,
    /// Upstream roller peripheral speed (m/s).
    pub v_upstream: f64,
    /// Downstream roller peripheral speed (m/s).
    pub v_downstream: f64,
    /// Total inertia estimate; `None` uses the configured nominal inertia.
    pub total_inertia: Option<f64>,
    pub upstream_strain: Option<f64>,
    /// Overrides the configured step for this cycle.
    pub dt: Option<f64>,
    /// Load-cell reading; replaces the span model at full speed.
    pub tension_measured: Option<f64>,
}

impl TensionInput {
    pub fn new(
        torque: f64,
        omega: f64,
        alpha: f64,
        radius: f64,
        v_upstream: f64,
        v_downstream: f64,
    ) -> Self {
        Self {
            torque,
            omega,
            alpha,
            radius,
            v_upstream,
            v_downstream,
            total_inertia: None,
            upstream_strain: None,
            dt: None,
            tension_measured: None,
        }
    }

    pub fn with_inertia(mut self, j: f64) -> Self {
        self.total_inertia = Some(j);
        self
    }

    pub fn with_measured_tension(mut self, t: f64) -> Self {
        self.tension_measured = Some(t);
        self
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }

    pub fn with_upstream_strain(mut self, strain: f64) -> Self {
        self.upstream_strain = Some(strain);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensionEstimate {
    /// Blended, filtered tension (N).
    pub tension: f64,
    pub tension_tau: f64,
    pub tension_span: f64,
    pub mode: TensionMode,
    pub confidence: f64,
    /// Share of the span estimate in the blend, 0..=1.
    pub weight: f64,
    pub friction: f64,
    pub timestamp: f64,
}

pub struct TensionObserver {
    cfg: TensionCfg,
    span: Box<dyn SpanModel + Send>,
    friction: Option<Box<dyn FrictionObserver + Send>>,
    last_tension: f64,
    last_tau: f64,
    last_span: f64,
    has_estimate: bool,
    now: f64,
    sink: Box<dyn EventSink>,
}

impl std::fmt::Debug for TensionObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensionObserver")
            .field("tension", &self.last_tension)
            .field("has_estimate", &self.has_estimate)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl TensionObserver {
    pub fn new(cfg: TensionCfg, span: impl SpanModel + Send + 'static) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        let floor = cfg.tension_min;
        Ok(Self {
            cfg,
            span: Box::new(span),
            friction: None,
            last_tension: floor,
            last_tau: floor,
            last_span: floor,
            has_estimate: false,
            now: 0.0,
            sink: Box::new(TracingSink),
        })
    }

    pub fn with_friction_observer(
        mut self,
        observer: impl FrictionObserver + Send + 'static,
    ) -> Self {
        self.friction = Some(Box::new(observer));
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    fn limit(&self, t: f64) -> f64 {
        t.clamp(self.cfg.tension_min, self.cfg.tension_max)
    }

    pub fn update(&mut self, input: &TensionInput) -> TensionEstimate {
        let dt = input
            .dt
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(self.cfg.dt);
        self.now += dt;
        let j = input
            .total_inertia
            .filter(|j| j.is_finite())
            .unwrap_or(self.cfg.j_nominal)
            .max(MIN_INERTIA);

        let friction = match self.friction.as_mut() {
            Some(obs) => obs.estimate_friction(input.omega, input.torque, dt, j),
            None => 0.0,
        };
        let friction = if friction.is_finite() { friction } else { 0.0 };

        if input.radius.abs() >= self.cfg.min_radius {
            let raw = (j * input.alpha - input.torque + friction) / input.radius;
            if raw.is_finite() {
                self.last_tau = self.limit(raw);
            } else {
                self.sink.record(&EstimatorEvent::NonFiniteInput {
                    estimator: "tension",
                });
            }
        } else {
            self.sink.record(&EstimatorEvent::TensionRadiusTooSmall {
                radius: input.radius,
            });
        }
        let tension_tau = self.last_tau;

        let span = self.span.update(
            input.v_upstream,
            input.v_downstream,
            dt,
            input.upstream_strain,
        );
        if span.is_finite() {
            self.last_span = span;
        }
        let omega_abs = input.omega.abs();
        let tension_span = match input.tension_measured {
            Some(m) if m.is_finite() && omega_abs >= self.cfg.omega_max => m,
            _ => self.last_span,
        };

        let weight = if omega_abs.is_finite() {
            ramp(omega_abs, self.cfg.omega_min, self.cfg.omega_max)
        } else {
            0.0
        };
        let blended = self.limit((1.0 - weight) * tension_tau + weight * tension_span);
        let filtered = if self.has_estimate {
            (1.0 - self.cfg.ema_alpha) * self.last_tension + self.cfg.ema_alpha * blended
        } else {
            self.has_estimate = true;
            blended
        };
        self.last_tension = self.limit(filtered);

        let mode = if weight >= 0.99 {
            TensionMode::Span
        } else if weight > 0.01 {
            TensionMode::Fusion
        } else {
            TensionMode::Torque
        };

        TensionEstimate {
            tension: self.last_tension,
            tension_tau,
            tension_span,
            mode,
            confidence: 0.7 + 0.2 * weight,
            weight,
            friction,
            timestamp: self.now,
        }
    }

    /// Forget the filter state and restart the span and friction models.
    pub fn reset(&mut self) {
        let floor = self.cfg.tension_min;
        self.last_tension = floor;
        self.last_tau = floor;
        self.last_span = floor;
        self.has_estimate = false;
        self.now = 0.0;
        self.span.reset();
        if let Some(obs) = self.friction.as_mut() {
            obs.reset();
        }
    }

    pub fn tension(&self) -> f64 {
        self.last_tension
    }
}
