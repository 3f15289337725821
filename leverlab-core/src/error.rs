//! Engine-level error conditions.
//!
//! Only two things can stop a run from starting: bad input data and bad
//! configuration. Everything that happens once the loop is running (rejected
//! orders, liquidations) is recorded in the result instead of returned as an error.

use thiserror::Error;

/// Errors raised before the bar loop starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("price data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl EngineError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn data(reason: impl Into<String>) -> Self {
        Self::DataUnavailable(reason.into())
    }
}

/// Reject a value that must be a finite number strictly greater than zero.
pub(crate) fn require_positive(field: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(field, format!("must be > 0, got {value}")))
    }
}

/// Reject a value that must be a finite number greater than or equal to zero.
pub(crate) fn require_non_negative(field: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(field, format!("must be >= 0, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_check() {
        assert!(require_positive("leverage", 1.0).is_ok());
        assert!(require_positive("leverage", 0.0).is_err());
        assert!(require_positive("leverage", -2.0).is_err());
        assert!(require_positive("leverage", f64::NAN).is_err());
    }

    #[test]
    fn non_negative_check() {
        assert!(require_non_negative("fee_taker", 0.0).is_ok());
        assert!(require_non_negative("fee_taker", -0.0001).is_err());
        assert!(require_non_negative("fee_taker", f64::INFINITY).is_err());
    }

    #[test]
    fn display_names_the_field() {
        let err = EngineError::invalid("window", "must be >= 1");
        assert_eq!(err.to_string(), "invalid configuration: window: must be >= 1");
    }
}
