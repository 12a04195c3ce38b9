//! Trace replay: config mapping, estimator assembly, and per-cycle output.

use std::io::Write;

use eyre::WrapErr;
use serde_json::json;
use winder_config::{Config, TraceRow};
use winder_core::error::Result as CoreResult;
use winder_core::{
    DisturbanceFrictionObserver, ElasticSpan, IdentificationState, InertiaEstimate,
    InertiaEstimator, RadiusCalculator, RadiusEstimate, TensionEstimate, TensionInput,
    TensionObserver,
};

/// The three estimators wired from one config.
pub struct Estimators {
    pub inertia: InertiaEstimator,
    pub radius: RadiusCalculator,
    pub tension: TensionObserver,
}

/// Map file config to runtime configs and build the estimators.
pub fn build_estimators(cfg: &Config, with_friction: bool) -> CoreResult<Estimators> {
    // Builder/config mapping via From impls in winder_core::conversions
    let inertia = InertiaEstimator::new((&cfg.inertia).into())?;
    let radius = RadiusCalculator::new((&cfg.radius).into())?;
    let span = ElasticSpan::new((&cfg.span).into())?;
    let mut tension = TensionObserver::new((&cfg.tension).into(), span)?;
    if with_friction {
        tension =
            tension.with_friction_observer(DisturbanceFrictionObserver::new((&cfg.friction).into())?);
    }
    Ok(Estimators {
        inertia,
        radius,
        tension,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayOpts {
    pub json: bool,
    pub summary: bool,
    pub every: usize,
}

/// Estimates produced for one trace row.
#[derive(Debug, Clone, Copy)]
pub struct Cycle {
    pub t: f64,
    pub inertia: InertiaEstimate,
    pub radius: RadiusEstimate,
    pub tension: TensionEstimate,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplaySummary {
    pub cycles: usize,
    /// Trace time at which the identifier first confirmed a fit.
    pub identified_at: Option<f64>,
    pub last: Cycle,
}

impl Estimators {
    /// Advance all estimators by one recorded cycle.
    ///
    /// The identifier sees the recorded radius; the tension observer uses the
    /// calculator's estimate and receives J_total once a fit is confirmed.
    pub fn step(&mut self, row: &TraceRow, dt: f64) -> Cycle {
        let inertia = self.inertia.update(
            row.torque,
            row.omega,
            row.alpha,
            row.web_tension,
            row.radius,
        );
        let radius = self
            .radius
            .estimate(row.linear_velocity, row.omega, row.thickness, dt);

        let mut input = TensionInput::new(
            row.torque,
            row.omega,
            row.alpha,
            radius.radius,
            row.v_upstream,
            row.v_downstream,
        )
        .with_dt(dt);
        if inertia.state.is_identified() {
            input = input.with_inertia(inertia.j_total);
        }
        if let Some(m) = row.tension_measured {
            input = input.with_measured_tension(m);
        }
        let tension = self.tension.update(&input);

        Cycle {
            t: row.t,
            inertia,
            radius,
            tension,
        }
    }
}

/// Replay `rows` through `est`, writing records to `out`.
pub fn run_replay(
    est: &mut Estimators,
    rows: &[TraceRow],
    nominal_dt: f64,
    opts: ReplayOpts,
    out: &mut impl Write,
) -> eyre::Result<ReplaySummary> {
    let every = opts.every.max(1);
    let mut prev_t: Option<f64> = None;
    let mut identified_at = None;
    let mut last = None;

    for (idx, row) in rows.iter().enumerate() {
        let dt = match prev_t {
            Some(p) if row.t - p > 0.0 => row.t - p,
            _ => nominal_dt,
        };
        prev_t = Some(row.t);

        let cycle = est.step(row, dt);
        if identified_at.is_none() && cycle.inertia.state == IdentificationState::Confirmed {
            identified_at = Some(cycle.t);
            tracing::info!(
                t = cycle.t,
                j_total = cycle.inertia.j_total,
                "inertia identified"
            );
        }
        if !opts.summary && idx % every == 0 {
            write_cycle(out, &cycle, opts.json).wrap_err("write replay record")?;
        }
        last = Some(cycle);
    }

    let last = last.ok_or_else(|| eyre::eyre!("trace has no samples"))?;
    let summary = ReplaySummary {
        cycles: rows.len(),
        identified_at,
        last,
    };
    if opts.summary {
        write_summary(out, &summary, opts.json).wrap_err("write replay summary")?;
    }
    Ok(summary)
}

fn cycle_json(c: &Cycle) -> serde_json::Value {
    json!({
        "t": c.t,
        "inertia": {
            "state": c.inertia.state.as_str(),
            "j_total": c.inertia.j_total,
            "j_web": c.inertia.j_web,
            "f_coulomb": c.inertia.f_coulomb,
            "f_viscous": c.inertia.f_viscous,
            "density": c.inertia.density,
            "uncertainty_pct": c.inertia.uncertainty_pct,
            "confidence": c.inertia.confidence,
        },
        "radius": {
            "radius": c.radius.radius,
            "mode": c.radius.mode.to_string(),
            "method": c.radius.method.to_string(),
            "confidence": c.radius.confidence,
        },
        "tension": {
            "tension": c.tension.tension,
            "tension_tau": c.tension.tension_tau,
            "tension_span": c.tension.tension_span,
            "mode": c.tension.mode.to_string(),
            "weight": c.tension.weight,
            "confidence": c.tension.confidence,
        },
    })
}

fn write_cycle(out: &mut impl Write, c: &Cycle, json: bool) -> std::io::Result<()> {
    if json {
        writeln!(out, "{}", cycle_json(c))
    } else {
        writeln!(
            out,
            "t={:8.3}s  J={:.4} kg·m² [{}]  R={:.4} m [{}]  T={:7.2} N [{}]",
            c.t,
            c.inertia.j_total,
            c.inertia.state,
            c.radius.radius,
            c.radius.mode,
            c.tension.tension,
            c.tension.mode,
        )
    }
}

fn write_summary(out: &mut impl Write, s: &ReplaySummary, json: bool) -> std::io::Result<()> {
    if json {
        let mut obj = cycle_json(&s.last);
        obj["cycles"] = json!(s.cycles);
        obj["identified_at"] = json!(s.identified_at);
        return writeln!(out, "{obj}");
    }
    let c = &s.last;
    writeln!(out, "--- Replay Summary ---")?;
    writeln!(out, "Cycles: {}", s.cycles)?;
    match s.identified_at {
        Some(t) => writeln!(out, "Identified at: {t:.3} s")?,
        None => writeln!(out, "Identified at: never")?,
    }
    writeln!(
        out,
        "Inertia: J={:.4} kg·m², Fc={:.3} N·m, Fv={:.4} N·m·s [{}] (confidence {:.2})",
        c.inertia.j_total,
        c.inertia.f_coulomb,
        c.inertia.f_viscous,
        c.inertia.state,
        c.inertia.confidence
    )?;
    writeln!(
        out,
        "Radius: {:.4} m [{}, {}] (confidence {:.2})",
        c.radius.radius, c.radius.mode, c.radius.method, c.radius.confidence
    )?;
    writeln!(
        out,
        "Tension: {:.2} N [{}] (confidence {:.2})",
        c.tension.tension, c.tension.mode, c.tension.confidence
    )?;
    writeln!(out, "----------------------")
}

#[cfg(test)]
mod tests {
    use super::*;
    use winder_core::NullSink;

    fn row(t: f64, v: f64, omega: f64) -> TraceRow {
        TraceRow {
            t,
            torque: -5.0,
            omega,
            alpha: 0.0,
            web_tension: 50.0,
            radius: 0.1,
            linear_velocity: v,
            thickness: 50e-6,
            v_upstream: 0.0,
            v_downstream: 0.0,
            tension_measured: None,
        }
    }

    fn quiet(cfg: &Config) -> Estimators {
        let est = build_estimators(cfg, false).unwrap();
        Estimators {
            inertia: est.inertia.with_sink(Box::new(NullSink)),
            radius: est.radius.with_sink(Box::new(NullSink)),
            tension: est.tension.with_sink(Box::new(NullSink)),
        }
    }

    #[test]
    fn one_record_per_printed_cycle() {
        let cfg = Config::default();
        let rows: Vec<TraceRow> = (0..10).map(|i| row(f64::from(i) * 0.01, 0.0, 0.0)).collect();
        let mut est = quiet(&cfg);
        let mut out = Vec::new();
        let opts = ReplayOpts {
            json: true,
            summary: false,
            every: 3,
        };
        let s = run_replay(&mut est, &rows, 0.01, opts, &mut out).unwrap();
        assert_eq!(s.cycles, 10);
        let text = String::from_utf8(out).unwrap();
        // cycles 0, 3, 6, 9
        assert_eq!(text.lines().count(), 4);
        for line in text.lines() {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(v["inertia"]["state"], "idle");
            // 5 N·m over the 0.05 m core
            assert!((v["tension"]["tension"].as_f64().unwrap() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn summary_only_prints_once() {
        let cfg = Config::default();
        let rows: Vec<TraceRow> = (0..5).map(|i| row(f64::from(i) * 0.01, 30.0, 5.0)).collect();
        let mut est = quiet(&cfg);
        let mut out = Vec::new();
        let opts = ReplayOpts {
            json: false,
            summary: true,
            every: 1,
        };
        let s = run_replay(&mut est, &rows, 0.01, opts, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Cycles: 5"));
        assert!(text.contains("Identified at: never"));
        assert_eq!(s.identified_at, None);
    }

    #[test]
    fn repeated_timestamp_uses_nominal_dt() {
        let cfg = Config::default();
        let mut a = quiet(&cfg);
        let mut b = quiet(&cfg);
        let rows = [row(0.0, 30.0, 5.0), row(0.0, 30.0, 5.0)];
        let mut sink = Vec::new();
        let opts = ReplayOpts {
            json: true,
            summary: true,
            every: 1,
        };
        run_replay(&mut a, &rows, 0.01, opts, &mut sink).unwrap();
        b.step(&rows[0], 0.01);
        b.step(&rows[1], 0.01);
        assert_eq!(a.radius.state_info(), b.radius.state_info());
    }
}
