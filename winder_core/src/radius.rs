//! Winding radius from two independent measurements.
//!
//! - velocity ratio: `R = v / ω`, accurate once the line runs steadily;
//! - thickness integration: `R² = R0² + e·ℓ/π` over the wound length `ℓ`,
//!   reliable from the first turn but drifting with gauge error.
//!
//! The two are fused, then smoothed over the last five fused values with
//! weights that lean harder on the newest value the longer the line runs.

use crate::config::RadiusCfg;
use crate::error::Result;
use crate::events::{EstimatorEvent, EventSink, TracingSink};
use crate::util::EPS;

const HISTORY: usize = 5;
/// Below this |ω| the velocity ratio is not attempted (rad/s).
const MIN_OMEGA: f64 = 0.1;
/// Accepted velocity-ratio band, as multiples of R0.
const VELOCITY_BAND: (f64, f64) = (0.8, 10.0);
/// Wound length required before running mode may engage (m).
const RUNNING_MIN_LENGTH: f64 = 1.0;
/// Below this wound length fusion still trusts integration noticeably (m).
const EARLY_LENGTH: f64 = 0.1;

const WEIGHTS_STARTUP: [f64; HISTORY] = [0.1, 0.15, 0.2, 0.25, 0.3];
const WEIGHTS_RUNNING_NEW: [f64; HISTORY] = [0.05, 0.1, 0.15, 0.2, 0.5];
const WEIGHTS_RUNNING: [f64; HISTORY] = [0.02, 0.03, 0.05, 0.10, 0.80];
const WEIGHTS_RUNNING_SETTLED: [f64; HISTORY] = [0.01, 0.01, 0.02, 0.06, 0.90];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusMode {
    Startup,
    Running,
}

impl std::fmt::Display for RadiusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Running => "running",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusMethod {
    Velocity,
    Integration,
    Fusion,
}

impl std::fmt::Display for RadiusMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Velocity => "velocity",
            Self::Integration => "integration",
            Self::Fusion => "fusion",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusEstimate {
    /// Filtered radius (m), never below R0.
    pub radius: f64,
    pub mode: RadiusMode,
    pub confidence: f64,
    pub method: RadiusMethod,
}

/// Snapshot of the calculator's internal state.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusStateInfo {
    pub current_radius: f64,
    pub mode: RadiusMode,
    pub accumulated_length: f64,
    pub running_count: usize,
    pub r0: f64,
    /// Fused estimates, oldest first.
    pub history: [f64; HISTORY],
}

pub struct RadiusCalculator {
    cfg: RadiusCfg,
    last: f64,
    mode: RadiusMode,
    accumulated: f64,
    running_count: usize,
    history: [f64; HISTORY],
    sink: Box<dyn EventSink>,
}

impl std::fmt::Debug for RadiusCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadiusCalculator")
            .field("radius", &self.last)
            .field("mode", &self.mode)
            .field("accumulated", &self.accumulated)
            .finish_non_exhaustive()
    }
}

impl RadiusCalculator {
    pub fn new(cfg: RadiusCfg) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        let r0 = cfg.r0;
        Ok(Self {
            cfg,
            last: r0,
            mode: RadiusMode::Startup,
            accumulated: 0.0,
            running_count: 0,
            history: [r0; HISTORY],
            sink: Box::new(TracingSink),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// `linear_velocity` is in m/min, `angular_velocity` in rad/s, the film
    /// thickness in m and `dt` in s. A non-positive `dt` skips integration.
    pub fn estimate(
        &mut self,
        linear_velocity: f64,
        angular_velocity: f64,
        measured_film_thickness: f64,
        dt: f64,
    ) -> RadiusEstimate {
        let v = if linear_velocity.is_finite() {
            linear_velocity
        } else {
            self.sink.record(&EstimatorEvent::NonFiniteInput {
                estimator: "radius",
            });
            0.0
        };
        let thickness = if measured_film_thickness.is_finite() && measured_film_thickness > 0.0 {
            measured_film_thickness
        } else {
            self.cfg.nominal_thickness
        };

        let r_v = self.by_velocity(v, angular_velocity);
        let r_int = self.by_integration(v, thickness, dt);
        self.update_mode(v, r_v.is_some());
        let fused = self.fuse(r_v, r_int);
        let radius = self.filter(fused).max(self.cfg.r0);
        self.last = radius;

        let (confidence, method) = match (self.mode, r_v) {
            (RadiusMode::Running, Some(rv)) => {
                let err = (rv - r_int).abs() / r_int.max(EPS);
                ((1.0 - 5.0 * err).clamp(0.0, 1.0), RadiusMethod::Velocity)
            }
            (RadiusMode::Running, None) => (0.6, RadiusMethod::Integration),
            (RadiusMode::Startup, rv) => (
                if self.accumulated < 0.5 { 0.5 } else { 0.7 },
                if rv.is_some() {
                    RadiusMethod::Fusion
                } else {
                    RadiusMethod::Integration
                },
            ),
        };

        RadiusEstimate {
            radius,
            mode: self.mode,
            confidence,
            method,
        }
    }

    fn by_velocity(&self, v: f64, omega: f64) -> Option<f64> {
        if !omega.is_finite() || omega.abs() < MIN_OMEGA {
            return None;
        }
        let r = (v / 60.0) / omega;
        let (lo, hi) = VELOCITY_BAND;
        (r >= lo * self.cfg.r0 && r <= hi * self.cfg.r0).then_some(r)
    }

    fn by_integration(&mut self, v: f64, thickness: f64, dt: f64) -> f64 {
        if dt.is_finite() && dt > 0.0 {
            let next = self.accumulated + v.abs() / 60.0 * dt;
            if next.is_finite() {
                self.accumulated = next;
            }
        }
        if self.accumulated <= 0.0 {
            return self.last;
        }
        let r0_sq = self.cfg.r0 * self.cfg.r0;
        let r = (r0_sq + self.accumulated * thickness / std::f64::consts::PI)
            .max(r0_sq)
            .sqrt();
        if r.is_finite() { r } else { self.last }
    }

    fn update_mode(&mut self, v: f64, velocity_ok: bool) {
        let threshold = self.cfg.min_velocity_threshold;
        let next = match self.mode {
            RadiusMode::Startup
                if v > threshold && self.accumulated > RUNNING_MIN_LENGTH && velocity_ok =>
            {
                RadiusMode::Running
            }
            RadiusMode::Running => {
                self.running_count += 1;
                if v < threshold * 0.5 {
                    RadiusMode::Startup
                } else {
                    RadiusMode::Running
                }
            }
            RadiusMode::Startup => RadiusMode::Startup,
        };
        if next != self.mode {
            self.sink.record(&EstimatorEvent::RadiusModeChanged {
                from: self.mode,
                to: next,
                accumulated_length: self.accumulated,
            });
            self.mode = next;
            self.running_count = 0;
        }
    }

    fn fuse(&self, r_v: Option<f64>, r_int: f64) -> f64 {
        match r_v {
            None => r_int,
            Some(rv) if self.accumulated < EARLY_LENGTH => 0.7 * rv + 0.3 * r_int,
            Some(rv) => 0.98 * rv + 0.02 * r_int,
        }
    }

    fn filter(&mut self, fused: f64) -> f64 {
        self.history.rotate_left(1);
        self.history[HISTORY - 1] = fused;
        let weights = match self.mode {
            RadiusMode::Running if self.running_count > 10 => &WEIGHTS_RUNNING_SETTLED,
            RadiusMode::Running if self.running_count > 5 => &WEIGHTS_RUNNING,
            RadiusMode::Running => &WEIGHTS_RUNNING_NEW,
            RadiusMode::Startup => &WEIGHTS_STARTUP,
        };
        let total: f64 = weights.iter().sum();
        self.history
            .iter()
            .zip(weights)
            .map(|(r, w)| r * w)
            .sum::<f64>()
            / total
    }

    /// Start a new roll. `r0` optionally re-cores the calculator.
    pub fn reset(&mut self, r0: Option<f64>) {
        if let Some(r) = r0.filter(|r| r.is_finite() && *r > 0.0) {
            self.cfg.r0 = r;
        }
        self.last = self.cfg.r0;
        self.mode = RadiusMode::Startup;
        self.accumulated = 0.0;
        self.running_count = 0;
        self.history = [self.cfg.r0; HISTORY];
    }

    pub fn radius(&self) -> f64 {
        self.last
    }

    pub fn mode(&self) -> RadiusMode {
        self.mode
    }

    pub fn state_info(&self) -> RadiusStateInfo {
        RadiusStateInfo {
            current_radius: self.last,
            mode: self.mode,
            accumulated_length: self.accumulated,
            running_count: self.running_count,
            r0: self.cfg.r0,
            history: self.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;

    fn calc() -> RadiusCalculator {
        RadiusCalculator::new(RadiusCfg::default())
            .unwrap()
            .with_sink(Box::new(NullSink))
    }

    #[test]
    fn standstill_reports_core_radius() {
        let mut c = calc();
        let e = c.estimate(0.0, 0.0, 50e-6, 0.01);
        assert!((e.radius - 0.05).abs() < 1e-12);
        assert_eq!(e.mode, RadiusMode::Startup);
        assert_eq!(e.method, RadiusMethod::Integration);
        assert_eq!(e.confidence, 0.5);
    }

    #[test]
    fn velocity_ratio_outside_band_is_rejected() {
        let c = calc();
        // 0.03 m < 0.8·R0
        assert_eq!(c.by_velocity(60.0 * 0.03, 1.0), None);
        // 0.6 m > 10·R0
        assert_eq!(c.by_velocity(60.0 * 0.6, 1.0), None);
        assert_eq!(c.by_velocity(60.0 * 0.1, 0.05), None);
        assert!((c.by_velocity(60.0 * 0.1, 1.0).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn bad_thickness_falls_back_to_nominal() {
        let mut a = calc();
        let mut b = calc();
        for _ in 0..50 {
            a.estimate(50.0, 0.0, f64::NAN, 0.01);
            b.estimate(50.0, 0.0, 50e-6, 0.01);
        }
        assert_eq!(a.radius(), b.radius());
    }

    #[test]
    fn reset_can_recore() {
        let mut c = calc();
        for _ in 0..10 {
            c.estimate(50.0, 16.0, 50e-6, 0.01);
        }
        c.reset(Some(0.08));
        let info = c.state_info();
        assert_eq!(info.r0, 0.08);
        assert_eq!(info.current_radius, 0.08);
        assert_eq!(info.history, [0.08; 5]);
        assert_eq!(info.accumulated_length, 0.0);
    }
}
