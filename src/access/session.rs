//! # Session Context
//!
//! Caller identity, passed explicitly to every gate operation.

use serde::{Deserialize, Serialize};

use super::feature::AccessLevel;

/// Bucket used when an anonymous caller has neither a session key nor an address
pub const SHARED_ANONYMOUS_BUCKET: &str = "shared";

/// Whose usage is being counted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    /// Signed-in user
    User(String),
    /// Anonymous bucket (session key or client address)
    Anonymous(String),
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Anonymous(bucket) => write!(f, "anon:{}", bucket),
        }
    }
}

/// Session as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub level: AccessLevel,
    pub anonymous_key: Option<String>,
}

impl SessionContext {
    /// Signed-in user at `level`
    pub fn user(user_id: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            user_id: Some(user_id.into()),
            level,
            anonymous_key: None,
        }
    }

    /// Anonymous visitor, bucketed by `key` when known
    pub fn anonymous(key: Option<String>) -> Self {
        Self {
            user_id: None,
            level: AccessLevel::Anonymous,
            anonymous_key: key,
        }
    }

    /// Subject whose counters apply to this session
    pub fn subject(&self) -> Subject {
        match self.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Subject::User(id.to_string()),
            _ => {
                let bucket = self
                    .anonymous_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .unwrap_or(SHARED_ANONYMOUS_BUCKET);
                Subject::Anonymous(bucket.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_subject() {
        let ctx = SessionContext::user("u-42", AccessLevel::Free);
        assert_eq!(ctx.subject(), Subject::User("u-42".to_string()));
        assert_eq!(ctx.subject().to_string(), "user:u-42");
    }

    #[test]
    fn test_anonymous_buckets() {
        let ctx = SessionContext::anonymous(Some("203.0.113.9".to_string()));
        assert_eq!(ctx.subject(), Subject::Anonymous("203.0.113.9".to_string()));

        let ctx = SessionContext::anonymous(None);
        assert_eq!(ctx.subject().to_string(), "anon:shared");

        // blank user id falls back to the anonymous bucket
        let ctx = SessionContext {
            user_id: Some("  ".to_string()),
            level: AccessLevel::Free,
            anonymous_key: Some("k1".to_string()),
        };
        assert_eq!(ctx.subject(), Subject::Anonymous("k1".to_string()));
    }
}
