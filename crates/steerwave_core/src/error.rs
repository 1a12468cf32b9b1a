//! Error types for the transform engine.
//!
//! Invalid configuration and inconsistent geometry fail fast at the call that
//! introduces them. Numeric degeneracies (DC evaluation, tied eigenvalues) are
//! never reported here; they resolve to well-defined values in place.

use thiserror::Error;

/// Result type alias for transform engine operations.
pub type WaveletResult<T> = Result<T, WaveletError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaveletError {
    /// A configuration value is out of range or unsupported.
    #[error("invalid {parameter}: {reason}")]
    Configuration {
        parameter: &'static str,
        reason: String,
    },

    /// Grid shapes do not fit the requested operation.
    #[error("geometry mismatch: {0}")]
    Geometry(String),
}

impl WaveletError {
    pub(crate) fn configuration(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            parameter,
            reason: reason.into(),
        }
    }

    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry(message.into())
    }

    /// True for configuration errors (as opposed to geometric ones).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
