use thiserror::Error;

/// Constructor-time rejection of a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Numerical failure inside a solve. Never crosses an estimator's `update`;
/// the estimator maps it to a state transition or keeps its previous value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorError {
    #[error("singular normal equations")]
    Singular,
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("sample buffer is empty")]
    EmptyBuffer,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

