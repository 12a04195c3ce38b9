//! Runtime configuration for the estimators.
//!
//! These are the structs the estimator constructors take. They are separate
//! from the TOML-deserialized config in `winder_config`; see `conversions`.

use crate::error::BuildError;

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Inertia/friction identifier configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct InertiaCfg {
    /// Fixed control period (s). Drives every time-based transition.
    pub dt: f64,
    /// Motor rotor inertia (kg·m²).
    pub j_motor: f64,
    /// Empty roller/mandrel inertia (kg·m²).
    pub j_roller: f64,
    /// Core radius of the roll (m).
    pub core_radius: f64,
    /// Web width along the roll axis (m).
    pub web_width: f64,
    /// RLS forgetting factor λ in (0, 1].
    pub forgetting_factor: f64,
    /// Buffered samples required before a batch identification.
    pub min_samples: usize,
    /// Sample buffer capacity; oldest samples are evicted beyond it.
    pub max_samples: usize,
    /// Batch fit accepted when the normalized residual is below this.
    pub residual_threshold: f64,
    /// Collection watchdog in control time (s).
    pub collect_timeout_s: f64,
    /// Dwell in Confirmed before tracking starts (s).
    pub confirm_hold_s: f64,
    /// Relative J change between history windows that flags drift.
    pub drift_threshold: f64,
    /// Areal density reported before identification (kg/m²).
    pub nominal_density: f64,
    /// Parameter vectors retained by the tracker.
    pub history_capacity: usize,
}

impl Default for InertiaCfg {
    fn default() -> Self {
        Self {
            dt: 0.01,
            j_motor: 0.05,
            j_roller: 0.02,
            core_radius: 0.05,
            web_width: 1.0,
            forgetting_factor: 0.995,
            min_samples: 100,
            max_samples: 500,
            residual_threshold: 0.15,
            collect_timeout_s: 30.0,
            confirm_hold_s: 2.0,
            drift_threshold: 0.2,
            nominal_density: 1500.0,
            history_capacity: 1000,
        }
    }
}

impl InertiaCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !positive(self.dt) {
            return Err(BuildError::InvalidConfig("inertia dt must be > 0"));
        }
        if !non_negative(self.j_motor) || !non_negative(self.j_roller) {
            return Err(BuildError::InvalidConfig(
                "motor and roller inertia must be >= 0",
            ));
        }
        if !positive(self.core_radius) || !positive(self.web_width) {
            return Err(BuildError::InvalidConfig(
                "core radius and web width must be > 0",
            ));
        }
        if !(self.forgetting_factor > 0.0 && self.forgetting_factor <= 1.0) {
            return Err(BuildError::InvalidConfig(
                "forgetting factor must be in (0, 1]",
            ));
        }
        if self.min_samples < 2 {
            return Err(BuildError::InvalidConfig("min_samples must be >= 2"));
        }
        if self.max_samples < self.min_samples {
            return Err(BuildError::InvalidConfig(
                "max_samples must be >= min_samples",
            ));
        }
        if !positive(self.residual_threshold) {
            return Err(BuildError::InvalidConfig("residual threshold must be > 0"));
        }
        if !positive(self.collect_timeout_s) || !non_negative(self.confirm_hold_s) {
            return Err(BuildError::InvalidConfig(
                "collection timeout must be > 0 and confirm hold >= 0",
            ));
        }
        if !positive(self.drift_threshold) {
            return Err(BuildError::InvalidConfig("drift threshold must be > 0"));
        }
        if !positive(self.nominal_density) {
            return Err(BuildError::InvalidConfig("nominal density must be > 0"));
        }
        if self.history_capacity < 20 {
            return Err(BuildError::InvalidConfig(
                "history capacity must hold the drift window (>= 20)",
            ));
        }
        Ok(())
    }
}

/// Radius estimator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusCfg {
    /// Core radius R0 (m).
    pub r0: f64,
    /// Film thickness used when the gauge reading is unusable (m).
    pub nominal_thickness: f64,
    /// Line speed gating running mode (m/min). Running drops back to startup
    /// below half of it.
    pub min_velocity_threshold: f64,
}

impl Default for RadiusCfg {
    fn default() -> Self {
        Self {
            r0: 0.05,
            nominal_thickness: 50e-6,
            min_velocity_threshold: 10.0,
        }
    }
}

impl RadiusCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !positive(self.r0) {
            return Err(BuildError::InvalidConfig("R0 must be > 0"));
        }
        if !positive(self.nominal_thickness) {
            return Err(BuildError::InvalidConfig("nominal thickness must be > 0"));
        }
        if !non_negative(self.min_velocity_threshold) {
            return Err(BuildError::InvalidConfig(
                "min velocity threshold must be >= 0",
            ));
        }
        Ok(())
    }
}

/// Tension observer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TensionCfg {
    /// Default step (s) when the caller does not override it.
    pub dt: f64,
    pub omega_min: f64,
    pub omega_max: f64,
    /// Output EMA coefficient in (0, 1].
    pub ema_alpha: f64,
    pub tension_min: f64,
    pub tension_max: f64,
    pub j_nominal: f64,
    /// Radii below this hold the previous torque-balance estimate.
    pub min_radius: f64,
}

impl Default for TensionCfg {
    fn default() -> Self {
        Self {
            dt: 0.01,
            omega_min: 1.0,
            omega_max: 5.0,
            ema_alpha: 0.15,
            tension_min: 0.0,
            tension_max: 2000.0,
            j_nominal: 0.1,
            min_radius: 1e-4,
        }
    }
}

impl TensionCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !positive(self.dt) {
            return Err(BuildError::InvalidConfig("tension dt must be > 0"));
        }
        if !non_negative(self.omega_min) || !(self.omega_max.is_finite()) {
            return Err(BuildError::InvalidConfig("omega limits must be finite and >= 0"));
        }
        if self.omega_min >= self.omega_max {
            return Err(BuildError::InvalidConfig("omega_min must be < omega_max"));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(BuildError::InvalidConfig("ema alpha must be in (0, 1]"));
        }
        if !(self.tension_min.is_finite() && self.tension_max.is_finite())
            || self.tension_min > self.tension_max
        {
            return Err(BuildError::InvalidConfig(
                "tension_min must be <= tension_max",
            ));
        }
        if !positive(self.j_nominal) || !positive(self.min_radius) {
            return Err(BuildError::InvalidConfig(
                "nominal inertia and min radius must be > 0",
            ));
        }
        Ok(())
    }
}

/// Elastic web span between two driven rollers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanCfg {
    pub length: f64,
    pub young_modulus: f64,
    /// Kelvin–Voigt damping (Pa·s); 0 gives a purely elastic span.
    pub viscosity: f64,
    pub thickness: f64,
    pub width: f64,
    pub initial_tension: f64,
}

impl Default for SpanCfg {
    fn default() -> Self {
        Self {
            length: 1.0,
            young_modulus: 2.0e9,
            viscosity: 0.0,
            thickness: 50e-6,
            width: 1.0,
            initial_tension: 0.0,
        }
    }
}

impl SpanCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !positive(self.length) {
            return Err(BuildError::InvalidConfig("span length must be > 0"));
        }
        if !positive(self.young_modulus) || !non_negative(self.viscosity) {
            return Err(BuildError::InvalidConfig(
                "young modulus must be > 0 and viscosity >= 0",
            ));
        }
        if !positive(self.thickness) || !positive(self.width) {
            return Err(BuildError::InvalidConfig(
                "span thickness and width must be > 0",
            ));
        }
        if !non_negative(self.initial_tension) {
            return Err(BuildError::InvalidConfig("initial tension must be >= 0"));
        }
        Ok(())
    }
}

/// Disturbance friction observer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrictionCfg {
    /// Observer gain (1/s). Zero disables adaptation.
    pub gain: f64,
    /// Static Coulomb torque of the fallback model (N·m).
    pub coulomb: f64,
    /// Static viscous coefficient of the fallback model (N·m·s/rad).
    pub viscous: f64,
}

impl FrictionCfg {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !non_negative(self.gain) {
            return Err(BuildError::InvalidConfig("friction gain must be >= 0"));
        }
        if !non_negative(self.coulomb) || !non_negative(self.viscous) {
            return Err(BuildError::InvalidConfig(
                "friction model coefficients must be >= 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        InertiaCfg::default().validate().unwrap();
        RadiusCfg::default().validate().unwrap();
        TensionCfg::default().validate().unwrap();
        SpanCfg::default().validate().unwrap();
        FrictionCfg::default().validate().unwrap();
    }

    #[test]
    fn nan_dt_is_rejected() {
        let cfg = InertiaCfg {
            dt: f64::NAN,
            ..InertiaCfg::default()
        };
        assert!(cfg.validate().is_err());
    }
}
