#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Real-time estimators for a web winder (hardware-agnostic).
//!
//! Three independent, per-cycle estimators infer what the drive cannot
//! measure directly:
//!
//! - **Inertia/friction** (`inertia`): batch identification over an
//!   excitation window, then RLS tracking with drift detection.
//! - **Radius** (`radius`): velocity ratio fused with thickness integration.
//! - **Tension** (`tension`): torque balance blended with a span model by
//!   shaft speed.
//!
//! None of them calls another. The caller feeds each one every cycle and may
//! pass the identified inertia into the tension observer. Plant-side models
//! are injected through `winder_traits::{SpanModel, FrictionObserver}`;
//! `span` and `friction` provide reference implementations.
//!
//! Every `update` returns a well-formed estimate. Numerical trouble is
//! reported through the estimator's [`events::EventSink`], never as an error.

pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod friction;
pub mod inertia;
pub mod mocks;
pub mod radius;
pub mod ring;
pub mod span;
pub mod tension;
pub mod util;

pub use config::{FrictionCfg, InertiaCfg, RadiusCfg, SpanCfg, TensionCfg};
pub use error::{BuildError, EstimatorError, Result};
pub use events::{EstimatorEvent, EventSink, NullSink, TracingSink};
pub use friction::DisturbanceFrictionObserver;
pub use inertia::{
    IdentificationState, InertiaEstimate, InertiaEstimator, Parameters, Sample,
};
pub use radius::{RadiusCalculator, RadiusEstimate, RadiusMethod, RadiusMode, RadiusStateInfo};
pub use span::ElasticSpan;
pub use tension::{TensionEstimate, TensionInput, TensionMode, TensionObserver};
