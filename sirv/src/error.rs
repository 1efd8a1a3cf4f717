//! Error types for the SIRV engine and analyzer.

use thiserror::Error;

/// Result alias used throughout the library.
pub type SirvResult<T> = Result<T, SirvError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SirvError {
    /// A configuration value is out of its admissible range.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The adaptive solver shrank its step below what f64 time can resolve.
    #[error("adaptive solver step size underflow at t={t} (h={step:e})")]
    StepSizeUnderflow { t: f64, step: f64 },

    #[error("adaptive solver exceeded {max_steps} steps before reaching t={horizon}")]
    TooManySteps { max_steps: usize, horizon: f64 },
}

impl SirvError {
    pub fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter { name, value, reason }
    }
}

/// `value` must be finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> SirvResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SirvError::invalid(name, value, "must be finite and > 0"))
    }
}

/// `value` must be finite and >= 0.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> SirvResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SirvError::invalid(name, value, "must be finite and >= 0"))
    }
}
