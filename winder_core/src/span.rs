//! Kelvin–Voigt web span.
//!
//! Strain in the span obeys mass conservation between two rollers:
//! `dε/dt = (v_up/L)(ε_up − ε) + (v_down − v_up)/L`, and tension follows
//! `T = max(0, (E·ε + η·dε/dt)·A)` with `A` the web cross-section.

use winder_traits::SpanModel;

use crate::config::SpanCfg;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ElasticSpan {
    cfg: SpanCfg,
    strain: f64,
    tension: f64,
}

impl ElasticSpan {
    pub fn new(cfg: SpanCfg) -> Result<Self> {
        cfg.validate().map_err(eyre::Report::new)?;
        let mut span = Self {
            cfg,
            strain: 0.0,
            tension: 0.0,
        };
        span.reset();
        Ok(span)
    }

    fn section(&self) -> f64 {
        self.cfg.thickness * self.cfg.width
    }

    pub fn strain(&self) -> f64 {
        self.strain
    }
}

impl SpanModel for ElasticSpan {
    fn update(
        &mut self,
        v_upstream: f64,
        v_downstream: f64,
        dt: f64,
        upstream_strain: Option<f64>,
    ) -> f64 {
        let l = self.cfg.length;
        let eps_up = upstream_strain.unwrap_or(0.0);
        let rate = (v_upstream / l) * (eps_up - self.strain) + (v_downstream - v_upstream) / l;
        let strain = self.strain + rate * dt;
        if !(strain.is_finite() && rate.is_finite()) {
            return self.tension;
        }
        self.strain = strain;
        let stress = self.cfg.young_modulus * strain + self.cfg.viscosity * rate;
        self.tension = (stress * self.section()).max(0.0);
        self.tension
    }

    fn tension(&self) -> f64 {
        self.tension
    }

    fn reset(&mut self) {
        self.tension = self.cfg.initial_tension;
        self.strain = self.cfg.initial_tension / (self.cfg.young_modulus * self.section());
    }
}
