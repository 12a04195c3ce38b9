//! Test and helper doubles for winder_core.

use std::sync::{Arc, Mutex};

use winder_traits::SpanModel;

use crate::events::{EstimatorEvent, EventSink};
use crate::util::sign;

/// Keeps every event; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EstimatorEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EstimatorEvent> {
        self.events
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&EstimatorEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &EstimatorEvent) {
        if let Ok(mut v) = self.events.lock() {
            v.push(event.clone());
        }
    }
}

/// Span model that always reports the same tension.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpan(pub f64);

impl SpanModel for FixedSpan {
    fn update(&mut self, _v_up: f64, _v_down: f64, _dt: f64, _strain: Option<f64>) -> f64 {
        self.0
    }

    fn tension(&self) -> f64 {
        self.0
    }

    fn reset(&mut self) {}
}

/// Plant parameters of the synthetic excitation profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfilePlant {
    pub j_total: f64,
    pub f_coulomb: f64,
    pub f_viscous: f64,
    pub web_tension: f64,
    pub radius: f64,
}

impl Default for ProfilePlant {
    fn default() -> Self {
        Self {
            j_total: 0.15,
            f_coulomb: 3.0,
            f_viscous: 0.05,
            web_tension: 50.0,
            radius: 0.10,
        }
    }
}

/// One cycle of the profile: `(torque, omega, alpha, web_tension, radius)`.
pub type ProfileSample = (f64, f64, f64, f64, f64);

/// Multi-phase excitation: ramp 5→55 rad/s over 0.3 s, hold 20 rad/s until
/// 0.9 s, brake 20→6 rad/s over 0.2 s, hold. Torque is exact for `plant`.
pub fn excitation_profile(n: usize, dt: f64, plant: ProfilePlant) -> Vec<ProfileSample> {
    (0..n)
        .map(|i| {
            let t = i as f64 * dt;
            let (omega, alpha) = if t < 0.3 {
                (5.0 + 50.0 * t / 0.3, 50.0 / 0.3)
            } else if t < 0.9 {
                (20.0, 0.0)
            } else if t < 1.1 {
                (20.0 - 14.0 * (t - 0.9) / 0.2, -70.0)
            } else {
                (6.0, 0.0)
            };
            let torque = plant.j_total * alpha
                + plant.f_coulomb * sign(omega)
                + plant.f_viscous * omega
                + plant.web_tension * plant.radius;
            (torque, omega, alpha, plant.web_tension, plant.radius)
        })
        .collect()
}

/// xorshift64; deterministic noise for tests and benches.
#[derive(Debug, Clone)]
pub struct XorShift64(u64);

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}
