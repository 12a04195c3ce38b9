#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and process-trace parsing for the winder estimators.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The trace CSV loader enforces headers so a recorded run can be replayed
//!   through the estimators sample by sample.
use serde::{Deserialize, Serialize};

/// One recorded control cycle.
///
/// Expected headers:
/// t,torque,omega,alpha,web_tension,radius,linear_velocity,thickness,v_upstream,v_downstream
///
/// An optional trailing `tension_measured` column carries a load-cell reading;
/// empty cells mean "no reading this cycle".
///
/// Example:
/// t,torque,omega,alpha,web_tension,radius,linear_velocity,thickness,v_upstream,v_downstream
/// 0.00,12.5,5.0,166.7,50.0,0.10,30.0,5e-5,0.50,0.50
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub t: f64,
    /// Motor torque command (N·m).
    pub torque: f64,
    /// Shaft angular velocity (rad/s).
    pub omega: f64,
    /// Shaft angular acceleration (rad/s²).
    pub alpha: f64,
    /// Web tension used by the inertia identifier's load term (N).
    pub web_tension: f64,
    /// Winding radius used by the inertia identifier's load term (m).
    pub radius: f64,
    /// Line speed (m/min).
    pub linear_velocity: f64,
    /// Measured film thickness (m).
    pub thickness: f64,
    /// Upstream roller peripheral speed (m/s).
    pub v_upstream: f64,
    /// Downstream roller peripheral speed (m/s).
    pub v_downstream: f64,
    #[serde(default)]
    pub tension_measured: Option<f64>,
}

pub const TRACE_HEADERS: [&str; 10] = [
    "t",
    "torque",
    "omega",
    "alpha",
    "web_tension",
    "radius",
    "linear_velocity",
    "thickness",
    "v_upstream",
    "v_downstream",
];

pub const TRACE_OPTIONAL_HEADER: &str = "tension_measured";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct InertiaCfg {
    /// Control period (s).
    pub dt: f64,
    pub j_motor: f64,
    pub j_roller: f64,
    pub core_radius: f64,
    /// Web width along the roll axis (m).
    pub web_width: f64,
    /// RLS forgetting factor, (0, 1].
    pub forgetting_factor: f64,
    pub min_samples: usize,
    pub max_samples: usize,
    pub residual_threshold: f64,
    /// Give up collecting after this much control time (s).
    pub collect_timeout_s: f64,
    /// Hold in Confirmed this long before tracking (s).
    pub confirm_hold_s: f64,
    /// Relative J change that flags drift.
    pub drift_threshold: f64,
    /// Areal density assumed before identification (kg/m²).
    pub nominal_density: f64,
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
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RadiusCfg {
    /// Core radius (m); the floor of every reported radius.
    pub r0: f64,
    /// Thickness used when the gauge reading is missing or non-positive (m).
    pub nominal_thickness: f64,
    /// Line speed above which running mode may engage (m/min).
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

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TensionCfg {
    pub dt: f64,
    /// At or below this speed only the torque balance is trusted (rad/s).
    pub omega_min: f64,
    /// At or above this speed only the span model is trusted (rad/s).
    pub omega_max: f64,
    pub ema_alpha: f64,
    pub tension_min: f64,
    pub tension_max: f64,
    /// Inertia used when no estimate is supplied (kg·m²).
    pub j_nominal: f64,
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

/// Kelvin–Voigt web span between the unwind and the winder.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SpanCfg {
    /// Free span length (m).
    pub length: f64,
    /// Young's modulus (Pa).
    pub young_modulus: f64,
    /// Internal damping (Pa·s).
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

/// Disturbance friction observer. A zero gain returns the static
/// `coulomb * sign(v) + viscous * v` model.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FrictionCfg {
    pub gain: f64,
    pub coulomb: f64,
    pub viscous: f64,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub inertia: InertiaCfg,
    pub radius: RadiusCfg,
    pub tension: TensionCfg,
    pub span: SpanCfg,
    pub friction: FrictionCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Inertia
        let i = &self.inertia;
        if !positive(i.dt) {
            eyre::bail!("inertia.dt must be > 0");
        }
        if !non_negative(i.j_motor) {
            eyre::bail!("inertia.j_motor must be >= 0");
        }
        if !non_negative(i.j_roller) {
            eyre::bail!("inertia.j_roller must be >= 0");
        }
        if !positive(i.core_radius) {
            eyre::bail!("inertia.core_radius must be > 0");
        }
        if !positive(i.web_width) {
            eyre::bail!("inertia.web_width must be > 0");
        }
        if !(i.forgetting_factor > 0.0 && i.forgetting_factor <= 1.0) {
            eyre::bail!("inertia.forgetting_factor must be in (0.0, 1.0]");
        }
        if i.min_samples < 2 {
            eyre::bail!("inertia.min_samples must be >= 2");
        }
        if i.max_samples < i.min_samples {
            eyre::bail!("inertia.max_samples must be >= inertia.min_samples");
        }
        if !positive(i.residual_threshold) {
            eyre::bail!("inertia.residual_threshold must be > 0");
        }
        if !positive(i.collect_timeout_s) {
            eyre::bail!("inertia.collect_timeout_s must be > 0");
        }
        if !non_negative(i.confirm_hold_s) {
            eyre::bail!("inertia.confirm_hold_s must be >= 0");
        }
        if !positive(i.drift_threshold) {
            eyre::bail!("inertia.drift_threshold must be > 0");
        }
        if !positive(i.nominal_density) {
            eyre::bail!("inertia.nominal_density must be > 0");
        }

        // Radius
        if !positive(self.radius.r0) {
            eyre::bail!("radius.r0 must be > 0");
        }
        if !positive(self.radius.nominal_thickness) {
            eyre::bail!("radius.nominal_thickness must be > 0");
        }
        if !non_negative(self.radius.min_velocity_threshold) {
            eyre::bail!("radius.min_velocity_threshold must be >= 0");
        }

        // Tension
        let t = &self.tension;
        if !positive(t.dt) {
            eyre::bail!("tension.dt must be > 0");
        }
        if !non_negative(t.omega_min) {
            eyre::bail!("tension.omega_min must be >= 0");
        }
        if !(t.omega_max.is_finite() && t.omega_max > t.omega_min) {
            eyre::bail!("tension.omega_max must be > tension.omega_min");
        }
        if !(t.ema_alpha > 0.0 && t.ema_alpha <= 1.0) {
            eyre::bail!("tension.ema_alpha must be in (0.0, 1.0]");
        }
        if !(t.tension_min.is_finite() && t.tension_max.is_finite()) {
            eyre::bail!("tension.tension_min and tension.tension_max must be finite");
        }
        if t.tension_min > t.tension_max {
            eyre::bail!("tension.tension_min must be <= tension.tension_max");
        }
        if !positive(t.j_nominal) {
            eyre::bail!("tension.j_nominal must be > 0");
        }
        if !positive(t.min_radius) {
            eyre::bail!("tension.min_radius must be > 0");
        }

        // Span
        let s = &self.span;
        if !positive(s.length) {
            eyre::bail!("span.length must be > 0");
        }
        if !positive(s.young_modulus) {
            eyre::bail!("span.young_modulus must be > 0");
        }
        if !non_negative(s.viscosity) {
            eyre::bail!("span.viscosity must be >= 0");
        }
        if !positive(s.thickness) || !positive(s.width) {
            eyre::bail!("span.thickness and span.width must be > 0");
        }
        if !non_negative(s.initial_tension) {
            eyre::bail!("span.initial_tension must be >= 0");
        }

        // Friction
        if !non_negative(self.friction.gain) {
            eyre::bail!("friction.gain must be >= 0");
        }
        if !non_negative(self.friction.coulomb) || !non_negative(self.friction.viscous) {
            eyre::bail!("friction.coulomb and friction.viscous must be >= 0");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// Load a recorded trace. Headers must be exactly [`TRACE_HEADERS`],
/// optionally followed by [`TRACE_OPTIONAL_HEADER`].
pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<&str> = headers.iter().collect();
    let required_ok = actual.len() >= TRACE_HEADERS.len()
        && actual[..TRACE_HEADERS.len()] == TRACE_HEADERS[..];
    let tail_ok = match &actual[TRACE_HEADERS.len().min(actual.len())..] {
        [] => true,
        [extra] => *extra == TRACE_OPTIONAL_HEADER,
        _ => false,
    };
    if !(required_ok && tail_ok) {
        eyre::bail!(
            "trace CSV must have headers '{}[,{}]', got: {}",
            TRACE_HEADERS.join(","),
            TRACE_OPTIONAL_HEADER,
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no samples", path);
    }
    if let Some(pos) = rows.windows(2).position(|w| w[1].t < w[0].t) {
        eyre::bail!(
            "trace timestamps must be non-decreasing (row {} goes backwards)",
            pos + 3
        );
    }

    Ok(rows)
}
