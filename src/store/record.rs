//! # Usage Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{Feature, QuotaWindow, Subject};

/// Identity of a usage counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageKey {
    pub subject: Subject,
    pub feature: Feature,
}

impl UsageKey {
    pub fn new(subject: Subject, feature: Feature) -> Self {
        Self { subject, feature }
    }
}

impl std::fmt::Display for UsageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.subject, self.feature)
    }
}

/// Usage counter for one subject and feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Row identifier
    pub id: Uuid,
    pub subject: Subject,
    pub feature: Feature,
    /// Uses in the current window
    pub count: u64,
    /// Start of the window `count` belongs to
    pub window_start: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Zeroed record for the window containing `now`
    pub fn fresh(key: &UsageKey, window: QuotaWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: key.subject.clone(),
            feature: key.feature,
            count: 0,
            window_start: window.start_of(now),
            updated_at: now,
        }
    }

    pub fn key(&self) -> UsageKey {
        UsageKey::new(self.subject.clone(), self.feature)
    }

    /// Reset the counter if `now` is in a later window. Returns whether it reset.
    pub fn roll_window(&mut self, window: QuotaWindow, now: DateTime<Utc>) -> bool {
        if !window.has_rolled_over(self.window_start, now) {
            return false;
        }
        self.count = 0;
        self.window_start = window.start_of(now);
        self.updated_at = now;
        true
    }

    /// Count one use
    pub fn increment(&mut self, now: DateTime<Utc>) {
        self.count = self.count.saturating_add(1);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Subject;
    use chrono::TimeZone;

    fn key() -> UsageKey {
        UsageKey::new(Subject::User("u1".to_string()), Feature::DrugReference)
    }

    #[test]
    fn test_fresh_record() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap();
        let record = UsageRecord::fresh(&key(), QuotaWindow::Daily, now);
        assert_eq!(record.count, 0);
        assert_eq!(
            record.window_start,
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(record.key(), key());
    }

    #[test]
    fn test_roll_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap();
        let mut record = UsageRecord::fresh(&key(), QuotaWindow::Daily, now);
        record.increment(now);
        record.increment(now);

        assert!(!record.roll_window(QuotaWindow::Daily, now));
        assert_eq!(record.count, 2);

        let next_day = Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap();
        assert!(record.roll_window(QuotaWindow::Daily, next_day));
        assert_eq!(record.count, 0);
        assert_eq!(
            record.window_start,
            Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap()
        );
    }
}
