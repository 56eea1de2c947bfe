//! # Access Gate Errors
//!
//! Error types for feature access checks.

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Gate error types
///
/// Denials are user-visible and recoverable (upgrade or wait for the window
/// to reset). Store failures are never surfaced as-is to tool pages: a failed
/// check becomes a denial and a failed increment is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Feature is disabled for the caller's level
    #[error("Feature '{feature}' is disabled for level '{level}'")]
    FeatureDisabled { feature: String, level: String },

    /// Usage quota exhausted for the current window
    #[error("Quota exceeded for '{feature}': {used} / {limit}")]
    QuotaExceeded {
        feature: String,
        used: u64,
        limit: u64,
    },

    /// Usage store could not be reached
    #[error("Usage store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Usage store did not answer in time
    #[error("Usage store timed out after {timeout_ms}ms")]
    StoreTimeout { timeout_ms: u64 },

    /// No policy entry for (level, feature); treated as disabled
    #[error("No quota policy for '{feature}' at level '{level}'")]
    ConfigurationGap { feature: String, level: String },

    /// Feature name is not one of the known tools
    #[error("Unknown feature: {name}")]
    UnknownFeature { name: String },

    /// Access level name is not recognized
    #[error("Unknown access level: {name}")]
    UnknownAccessLevel { name: String },
}

impl GateError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::FeatureDisabled { .. } => 403,
            Self::QuotaExceeded { .. } => 429,
            Self::StoreUnavailable { .. } => 503,
            Self::StoreTimeout { .. } => 503,
            Self::ConfigurationGap { .. } => 403,
            Self::UnknownFeature { .. } => 400,
            Self::UnknownAccessLevel { .. } => 400,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FeatureDisabled { .. } => "FEATURE_DISABLED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::StoreTimeout { .. } => "STORE_TIMEOUT",
            Self::ConfigurationGap { .. } => "CONFIGURATION_GAP",
            Self::UnknownFeature { .. } => "UNKNOWN_FEATURE",
            Self::UnknownAccessLevel { .. } => "UNKNOWN_ACCESS_LEVEL",
        }
    }

    /// Whether this error is a policy denial rather than a failure
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::FeatureDisabled { .. } | Self::QuotaExceeded { .. } | Self::ConfigurationGap { .. }
        )
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable {
            message: err.to_string(),
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

impl From<GateError> for ErrorResponse {
    fn from(err: GateError) -> Self {
        Self {
            error: err.to_string(),
            code: err.error_code(),
            status: err.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = GateError::QuotaExceeded {
            feature: "drug_reference".to_string(),
            used: 5,
            limit: 5,
        };
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
        assert!(err.is_denial());

        let err = GateError::StoreTimeout { timeout_ms: 250 };
        assert_eq!(err.status_code(), 503);
        assert!(!err.is_denial());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: GateError = StoreError::Unavailable("connection refused".to_string()).into();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::from(GateError::UnknownFeature {
            name: "telepathy".to_string(),
        });
        assert_eq!(response.status, 400);
        assert_eq!(response.code, "UNKNOWN_FEATURE");
        assert!(response.error.contains("telepathy"));
    }
}
