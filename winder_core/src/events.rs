//! Observability sink owned by each estimator.
//!
//! Estimators never log through ambient globals; they hand typed events to
//! the sink they were built with. [`TracingSink`] is the default.

use crate::inertia::IdentificationState;
use crate::radius::RadiusMode;

/// Identification phase of the batch solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Viscous,
    CoulombInertia,
    InertiaRefinement,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Viscous => "viscous",
            Self::CoulombInertia => "coulomb_inertia",
            Self::InertiaRefinement => "inertia_refinement",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorEvent {
    StateChanged {
        from: IdentificationState,
        to: IdentificationState,
        at: f64,
    },
    PhaseSkipped {
        phase: Phase,
        reason: &'static str,
    },
    Identified {
        j_total: f64,
        f_coulomb: f64,
        f_viscous: f64,
        residual: f64,
        accepted: bool,
    },
    IdentificationFailed {
        reason: String,
    },
    CollectionTimeout {
        elapsed: f64,
        buffered: usize,
    },
    DriftDetected {
        recent_j: f64,
        baseline_j: f64,
        relative_change: f64,
    },
    TrackerRejected {
        reason: String,
    },
    NonFiniteInput {
        estimator: &'static str,
    },
    RadiusModeChanged {
        from: RadiusMode,
        to: RadiusMode,
        accumulated_length: f64,
    },
    TensionRadiusTooSmall {
        radius: f64,
    },
}

pub trait EventSink: Send {
    fn record(&self, event: &EstimatorEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &EstimatorEvent) {}
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &EstimatorEvent) {
        match event {
            EstimatorEvent::StateChanged { from, to, at } => {
                tracing::info!(from = %from, to = %to, t = at, "identification state changed");
            }
            EstimatorEvent::PhaseSkipped { phase, reason } => {
                tracing::debug!(phase = %phase, reason, "identification phase skipped");
            }
            EstimatorEvent::Identified {
                j_total,
                f_coulomb,
                f_viscous,
                residual,
                accepted,
            } => {
                tracing::info!(
                    j_total,
                    f_coulomb,
                    f_viscous,
                    residual,
                    accepted,
                    "batch identification finished"
                );
            }
            EstimatorEvent::IdentificationFailed { reason } => {
                tracing::warn!(reason = %reason, "batch identification failed");
            }
            EstimatorEvent::CollectionTimeout { elapsed, buffered } => {
                tracing::warn!(elapsed, buffered, "collection timed out, identifier failed");
            }
            EstimatorEvent::DriftDetected {
                recent_j,
                baseline_j,
                relative_change,
            } => {
                tracing::warn!(
                    recent_j,
                    baseline_j,
                    relative_change,
                    "inertia drift detected, re-identifying"
                );
            }
            EstimatorEvent::TrackerRejected { reason } => {
                tracing::warn!(reason = %reason, "RLS update rejected, keeping previous parameters");
            }
            EstimatorEvent::NonFiniteInput { estimator } => {
                tracing::debug!(estimator, "non-finite input ignored");
            }
            EstimatorEvent::RadiusModeChanged {
                from,
                to,
                accumulated_length,
            } => {
                tracing::info!(from = %from, to = %to, accumulated_length, "radius mode changed");
            }
            EstimatorEvent::TensionRadiusTooSmall { radius } => {
                tracing::debug!(radius, "radius below minimum, holding torque-balance tension");
            }
        }
    }
}
