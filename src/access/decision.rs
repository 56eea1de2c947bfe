//! # Access Decision
//!
//! Result of a feature access check, in the shape tool pages consume.

use serde::{Deserialize, Serialize};

use super::errors::GateError;
use super::feature::{AccessLevel, Feature};

/// Message for a feature the caller's level cannot use
pub const DISABLED_MESSAGE: &str = "feature disabled for this level";

/// Message for an exhausted quota
pub const QUOTA_EXCEEDED_MESSAGE: &str = "quota exceeded, upgrade required";

/// Message when the usage store could not be consulted
pub const CHECK_FAILED_MESSAGE: &str = "failed to check access";

/// Why a decision denies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Disabled,
    QuotaExceeded { used: u64, limit: u64 },
    CheckFailed(GateError),
}

/// Outcome of a check
///
/// `remaining` and `quota` are `None` for unlimited features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub allowed: bool,
    pub remaining: Option<u64>,
    pub quota: Option<u64>,
    pub is_disabled: bool,
    pub message: Option<String>,
    #[serde(skip)]
    pub denial: Option<Denial>,
}

impl AccessDecision {
    /// Feature is available without limit
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: None,
            quota: None,
            is_disabled: false,
            message: None,
            denial: None,
        }
    }

    /// Feature is turned off for this level
    pub fn disabled() -> Self {
        Self {
            allowed: false,
            remaining: Some(0),
            quota: Some(0),
            is_disabled: true,
            message: Some(DISABLED_MESSAGE.to_string()),
            denial: Some(Denial::Disabled),
        }
    }

    /// Limited feature with `used` of `limit` consumed in the current window
    pub fn limited(used: u64, limit: u64) -> Self {
        let remaining = limit.saturating_sub(used);
        if remaining > 0 {
            return Self::consumed(used, limit);
        }
        Self {
            allowed: false,
            remaining: Some(0),
            quota: Some(limit),
            is_disabled: false,
            message: Some(QUOTA_EXCEEDED_MESSAGE.to_string()),
            denial: Some(Denial::QuotaExceeded { used, limit }),
        }
    }

    /// One unit was just consumed, leaving `used` of `limit` in the window
    pub fn consumed(used: u64, limit: u64) -> Self {
        Self {
            allowed: true,
            remaining: Some(limit.saturating_sub(used)),
            quota: Some(limit),
            is_disabled: false,
            message: None,
            denial: None,
        }
    }

    /// The store could not be consulted; callers must treat this as a denial
    pub fn check_failed(cause: GateError) -> Self {
        Self {
            allowed: false,
            remaining: None,
            quota: None,
            is_disabled: false,
            message: Some(CHECK_FAILED_MESSAGE.to_string()),
            denial: Some(Denial::CheckFailed(cause)),
        }
    }

    /// Error equivalent of a denial; `None` when allowed.
    ///
    /// A decision read back from JSON has no recorded cause and is
    /// classified from its public fields.
    pub fn denial_error(&self, feature: Feature, level: AccessLevel) -> Option<GateError> {
        if self.allowed {
            return None;
        }
        let disabled = || GateError::FeatureDisabled {
            feature: feature.to_string(),
            level: level.to_string(),
        };
        let exceeded = |used, limit| GateError::QuotaExceeded {
            feature: feature.to_string(),
            used,
            limit,
        };
        Some(match &self.denial {
            Some(Denial::Disabled) => disabled(),
            Some(Denial::QuotaExceeded { used, limit }) => exceeded(*used, *limit),
            Some(Denial::CheckFailed(cause)) => cause.clone(),
            None if self.is_disabled => disabled(),
            None => {
                let limit = self.quota.unwrap_or(0);
                exceeded(limit.saturating_sub(self.remaining.unwrap_or(0)), limit)
            }
        })
    }

    /// Message to show on denial, falling back to a generic one
    pub fn denial_message<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limited_decision() {
        let decision = AccessDecision::limited(2, 5);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(3));
        assert_eq!(decision.quota, Some(5));
        assert!(decision.message.is_none());

        let decision = AccessDecision::limited(7, 5);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Some(0));
        assert_eq!(decision.message.as_deref(), Some(QUOTA_EXCEEDED_MESSAGE));
    }

    #[test]
    fn test_zero_quota_is_denied_but_not_disabled() {
        let decision = AccessDecision::limited(0, 0);
        assert!(!decision.allowed);
        assert!(!decision.is_disabled);
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(AccessDecision::disabled()).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["isDisabled"], true);
        assert_eq!(json["quota"], 0);
        assert_eq!(json["remaining"], 0);
        assert_eq!(json["message"], DISABLED_MESSAGE);

        let json = serde_json::to_value(AccessDecision::unlimited()).unwrap();
        assert!(json["remaining"].is_null());
        assert!(json["quota"].is_null());
        assert!(json["message"].is_null());
    }

    #[test]
    fn test_denial_message_fallback() {
        let failed = AccessDecision::check_failed(GateError::StoreTimeout { timeout_ms: 20 });
        let decision = AccessDecision {
            message: None,
            ..failed.clone()
        };
        assert_eq!(decision.denial_message("Access denied."), "Access denied.");
        assert_eq!(failed.denial_message("Access denied."), CHECK_FAILED_MESSAGE);
    }

    #[test]
    fn test_denial_error_follows_cause() {
        let level = AccessLevel::Free;
        assert!(AccessDecision::limited(1, 5)
            .denial_error(Feature::DrugReference, level)
            .is_none());

        let err = AccessDecision::disabled()
            .denial_error(Feature::AiPeerReview, level)
            .unwrap();
        assert_eq!(err.status_code(), 403);
        assert!(err.is_denial());

        let err = AccessDecision::limited(5, 5)
            .denial_error(Feature::DrugReference, level)
            .unwrap();
        assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
        assert_eq!(err.status_code(), 429);

        // Wording of the message plays no part in the classification
        let failed = AccessDecision {
            message: Some("try again later".to_string()),
            ..AccessDecision::check_failed(GateError::StoreUnavailable {
                message: "connection refused".to_string(),
            })
        };
        let err = failed.denial_error(Feature::DrugReference, level).unwrap();
        assert_eq!(err.status_code(), 503);
        assert!(!err.is_denial());
    }

    #[test]
    fn test_cause_is_not_serialized() {
        let decision = AccessDecision::limited(5, 5);
        let json = serde_json::to_value(&decision).unwrap();
        assert!(json.get("denial").is_none());

        let parsed: AccessDecision = serde_json::from_value(json).unwrap();
        assert!(parsed.denial.is_none());
        let err = parsed.denial_error(Feature::DrugReference, AccessLevel::Free).unwrap();
        assert_eq!(err.status_code(), 429);
    }
}
