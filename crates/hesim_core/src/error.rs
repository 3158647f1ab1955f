use thiserror::Error;

use crate::model::{LoanId, ZoneId};

/// Configuration problems detected by `SimulationConfig::validate` before any path runs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must lie in [0, 1] (got {value})")]
    RateOutOfRange { field: &'static str, value: f64 },

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("correlation matrix is {rows}x{cols} but {zones} zones are configured")]
    CorrelationShape {
        rows: usize,
        cols: usize,
        zones: usize,
    },

    #[error("correlation matrix is not positive semi-definite (pivot {pivot} at row {row})")]
    NotPositiveSemiDefinite { row: usize, pivot: f64 },

    #[error("{tier} split sums to {sum}, expected exactly 1")]
    TierWeights { tier: &'static str, sum: f64 },

    #[error("loan {loan:?} references unknown zone {zone:?}")]
    UnknownZone { loan: LoanId, zone: ZoneId },

    #[error("portfolio is empty")]
    EmptyPortfolio,
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Transient failures of a single Monte Carlo path. These are retried once
/// with fresh randomness before the path is excluded from aggregates.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PathError {
    #[error("non-finite value in {context}")]
    NonFinite { context: String },

    #[error("reinvestment collaborator failed: {0}")]
    Reinvestment(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// An upstream contract was broken (negative property value, zero loan
    /// amount). Never retried.
    #[error("invariant violated in {context}: {detail}")]
    Invariant { context: &'static str, detail: String },
}

impl SimulationError {
    pub(crate) fn invariant(context: &'static str, detail: impl Into<String>) -> Self {
        SimulationError::Invariant {
            context,
            detail: detail.into(),
        }
    }

    /// Whether a Monte Carlo path failing with this error may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SimulationError::Path(_))
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;

/// Guard used at numeric hand-off points inside a path.
pub(crate) fn ensure_finite(value: f64, context: &str) -> std::result::Result<f64, PathError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PathError::NonFinite {
            context: context.to_string(),
        })
    }
}
