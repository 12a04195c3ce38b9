//! Capabilities of the plant-side collaborators the estimators consult.
//!
//! The estimators own their state but delegate two physical sub-models:
//! the tension of the web span between rollers and the friction torque on
//! the winding shaft. Both are swappable so a site can plug in a
//! calibrated model or a test double.

/// Tension model of the free web span between two driven rollers.
pub trait SpanModel {
    /// Advance the span by `dt` seconds given the peripheral speeds of the
    /// upstream and downstream rollers (m/s) and return the tension in N.
    ///
    /// `upstream_strain` is the strain of material entering the span; `None`
    /// means unstrained material.
    fn update(
        &mut self,
        v_upstream: f64,
        v_downstream: f64,
        dt: f64,
        upstream_strain: Option<f64>,
    ) -> f64;

    /// Last tension computed by [`SpanModel::update`].
    fn tension(&self) -> f64;

    /// Return to the unstrained initial condition.
    fn reset(&mut self);
}

/// Online friction torque estimate for the winding shaft.
///
/// Implementations must return friction only; any tension load the caller
/// feeds to a tension observer separately must not be folded in here.
pub trait FrictionObserver {
    /// Friction torque (N·m) for the current shaft `velocity` (rad/s), the
    /// applied `torque` (N·m), the step `dt` (s) and the current total
    /// `inertia` estimate (kg·m²).
    fn estimate_friction(&mut self, velocity: f64, torque: f64, dt: f64, inertia: f64) -> f64;

    fn reset(&mut self) {}
}

impl<T: SpanModel + ?Sized> SpanModel for Box<T> {
    fn update(
        &mut self,
        v_upstream: f64,
        v_downstream: f64,
        dt: f64,
        upstream_strain: Option<f64>,
    ) -> f64 {
        (**self).update(v_upstream, v_downstream, dt, upstream_strain)
    }

    fn tension(&self) -> f64 {
        (**self).tension()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

impl<T: FrictionObserver + ?Sized> FrictionObserver for Box<T> {
    fn estimate_friction(&mut self, velocity: f64, torque: f64, dt: f64, inertia: f64) -> f64 {
        (**self).estimate_friction(velocity, torque, dt, inertia)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
