//! `From` implementations bridging `winder_config` types to `winder_core` types.

use crate::config::{FrictionCfg, InertiaCfg, RadiusCfg, SpanCfg, TensionCfg};

// ── InertiaCfg ───────────────────────────────────────────────────────────────

impl From<&winder_config::InertiaCfg> for InertiaCfg {
    fn from(c: &winder_config::InertiaCfg) -> Self {
        Self {
            dt: c.dt,
            j_motor: c.j_motor,
            j_roller: c.j_roller,
            core_radius: c.core_radius,
            web_width: c.web_width,
            forgetting_factor: c.forgetting_factor,
            min_samples: c.min_samples,
            max_samples: c.max_samples,
            residual_threshold: c.residual_threshold,
            collect_timeout_s: c.collect_timeout_s,
            confirm_hold_s: c.confirm_hold_s,
            drift_threshold: c.drift_threshold,
            nominal_density: c.nominal_density,
            ..Self::default()
        }
    }
}

// ── RadiusCfg ────────────────────────────────────────────────────────────────

impl From<&winder_config::RadiusCfg> for RadiusCfg {
    fn from(c: &winder_config::RadiusCfg) -> Self {
        Self {
            r0: c.r0,
            nominal_thickness: c.nominal_thickness,
            min_velocity_threshold: c.min_velocity_threshold,
        }
    }
}

// ── TensionCfg ───────────────────────────────────────────────────────────────

impl From<&winder_config::TensionCfg> for TensionCfg {
    fn from(c: &winder_config::TensionCfg) -> Self {
        Self {
            dt: c.dt,
            omega_min: c.omega_min,
            omega_max: c.omega_max,
            ema_alpha: c.ema_alpha,
            tension_min: c.tension_min,
            tension_max: c.tension_max,
            j_nominal: c.j_nominal,
            min_radius: c.min_radius,
        }
    }
}

// ── SpanCfg ──────────────────────────────────────────────────────────────────

impl From<&winder_config::SpanCfg> for SpanCfg {
    fn from(c: &winder_config::SpanCfg) -> Self {
        Self {
            length: c.length,
            young_modulus: c.young_modulus,
            viscosity: c.viscosity,
            thickness: c.thickness,
            width: c.width,
            initial_tension: c.initial_tension,
        }
    }
}

// ── FrictionCfg ──────────────────────────────────────────────────────────────

impl From<&winder_config::FrictionCfg> for FrictionCfg {
    fn from(c: &winder_config::FrictionCfg) -> Self {
        Self {
            gain: c.gain,
            coulomb: c.coulomb,
            viscous: c.viscous,
        }
    }
}
