//! Disturbance observer for shaft friction torque.
//!
//! The shaft speed is predicted from the applied torque minus the current
//! friction estimate; the prediction error corrects both the speed state and
//! the friction estimate. With a zero gain the observer degenerates to the
//! static `f_c·sign(ω) + f_v·ω` model.

use winder_traits::FrictionObserver;

use crate::config::FrictionCfg;
use crate::error::Result;
use crate::util::{EPS, sign};

#[derive(Debug, Clone)]
pub struct DisturbanceFrictionObserver {
    cfg: FrictionCfg,
    speed: Option<f64>,
    friction: f64,
}

impl DisturbanceFrictionObserver {
    pub fn new(cfg: FrictionCfg) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        Ok(Self {
            cfg,
            speed: None,
            friction: 0.0,
        })
    }

    fn model(&self, velocity: f64) -> f64 {
        self.cfg.coulomb * sign(velocity) + self.cfg.viscous * velocity
    }
}

impl FrictionObserver for DisturbanceFrictionObserver {
    fn estimate_friction(&mut self, velocity: f64, torque: f64, dt: f64, inertia: f64) -> f64 {
        if self.cfg.gain == 0.0 {
            return self.model(velocity);
        }
        if ![velocity, torque, dt, inertia].iter().all(|v| v.is_finite()) {
            return self.friction;
        }
        let inertia = inertia.max(EPS);
        let speed = *self.speed.get_or_insert(velocity);
        let predicted = speed + dt / inertia * (torque - self.friction);
        let err = velocity - predicted;
        self.speed = Some(predicted + self.cfg.gain * err * dt);
        self.friction -= self.cfg.gain * err * inertia * dt;
        self.friction
    }

    fn reset(&mut self) {
        self.speed = None;
        self.friction = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gain_returns_static_model() {
        let mut obs = DisturbanceFrictionObserver::new(FrictionCfg {
            gain: 0.0,
            coulomb: 3.0,
            viscous: 0.05,
        })
        .unwrap();
        assert!((obs.estimate_friction(10.0, 0.0, 0.01, 0.1) - 3.5).abs() < 1e-12);
        assert!((obs.estimate_friction(-10.0, 0.0, 0.01, 0.1) + 3.5).abs() < 1e-12);
        assert_eq!(obs.estimate_friction(0.0, 0.0, 0.01, 0.1), 0.0);
    }

    #[test]
    fn converges_to_balancing_torque_at_constant_speed() {
        let mut obs = DisturbanceFrictionObserver::new(FrictionCfg {
            gain: 10.0,
            ..FrictionCfg::default()
        })
        .unwrap();
        let mut f = 0.0;
        for _ in 0..2000 {
            f = obs.estimate_friction(10.0, 2.0, 0.01, 0.1);
        }
        assert!((f - 2.0).abs() < 1e-3, "{f}");
        obs.reset();
        assert_eq!(obs.friction, 0.0);
    }
}
