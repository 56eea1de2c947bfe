//! # Feature Access Gate
//!
//! Answers "may this session use feature F right now?" and, separately,
//! records that it just did.
//!
//! `check_access` and `increment_usage` are separate round trips so a page
//! can show remaining quota before an expensive call. Two concurrent
//! requests from one subject may both pass the check and both increment;
//! callers that need strict enforcement use `try_consume`, which checks
//! and counts in a single store update.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::decision::AccessDecision;
use super::errors::{GateError, GateResult};
use super::feature::Feature;
use super::policy::{QuotaPolicy, QuotaRule};
use super::session::SessionContext;
use crate::store::{StoreResult, UsageKey, UsageRecord, UsageStore};

/// Default bound on a single store round trip
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of [`FeatureAccessGate::run_gated`]
#[derive(Debug)]
pub enum Gated<T> {
    /// Action was not run
    Denied(AccessDecision),
    /// Action ran and its use was recorded
    Performed { output: T, decision: AccessDecision },
}

impl<T> Gated<T> {
    pub fn is_performed(&self) -> bool {
        matches!(self, Self::Performed { .. })
    }

    pub fn decision(&self) -> &AccessDecision {
        match self {
            Self::Denied(decision) => decision,
            Self::Performed { decision, .. } => decision,
        }
    }

    pub fn into_output(self) -> Option<T> {
        match self {
            Self::Denied(_) => None,
            Self::Performed { output, .. } => Some(output),
        }
    }
}

/// Access state of one tool, for the tool catalogue
#[derive(Debug, Clone, Serialize)]
pub struct FeatureStatus {
    pub feature: Feature,
    pub title: &'static str,
    pub decision: AccessDecision,
}

/// Feature access and usage quota gate
#[derive(Clone)]
pub struct FeatureAccessGate {
    policy: Arc<QuotaPolicy>,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl FeatureAccessGate {
    /// Create a gate on the system clock
    pub fn new(policy: Arc<QuotaPolicy>, store: Arc<dyn UsageStore>) -> Self {
        Self {
            policy,
            store,
            clock: Arc::new(SystemClock),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Decide whether `ctx` may use `feature` now. Does not count a use.
    ///
    /// Never fails: a store error or timeout is reported as a denial.
    pub async fn check_access(&self, ctx: &SessionContext, feature: Feature) -> AccessDecision {
        let limit = match self.policy.rule_for(ctx.level, feature) {
            QuotaRule::Disabled => return AccessDecision::disabled(),
            QuotaRule::Unlimited => return AccessDecision::unlimited(),
            QuotaRule::Limited(limit) => limit,
        };

        let key = UsageKey::new(ctx.subject(), feature);
        match self.current_count(&key).await {
            Ok(used) => AccessDecision::limited(used, limit),
            Err(err) => {
                tracing::error!(key = %key, error = %err, "access check failed, denying");
                AccessDecision::check_failed(err)
            }
        }
    }

    /// Record one use of `feature` by `ctx`.
    ///
    /// Best effort: failures are logged and never reach the caller, since
    /// the action being counted has already happened.
    pub async fn increment_usage(&self, ctx: &SessionContext, feature: Feature) {
        let limit = match self.policy.rule_for(ctx.level, feature) {
            QuotaRule::Limited(limit) => limit,
            rule => {
                tracing::trace!(%feature, %rule, "usage not counted");
                return;
            }
        };

        let key = UsageKey::new(ctx.subject(), feature);
        match self.add_use(&key, None).await {
            Ok((record, _)) => {
                tracing::debug!(key = %key, count = record.count, limit, "usage recorded");
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to record usage");
            }
        }
    }

    /// Check and count one use in a single atomic store update.
    ///
    /// When allowed, `remaining` already accounts for the consumed use.
    /// Denials are never counted. Store failures deny.
    pub async fn try_consume(&self, ctx: &SessionContext, feature: Feature) -> AccessDecision {
        let limit = match self.policy.rule_for(ctx.level, feature) {
            QuotaRule::Disabled => return AccessDecision::disabled(),
            QuotaRule::Unlimited => return AccessDecision::unlimited(),
            QuotaRule::Limited(limit) => limit,
        };

        let key = UsageKey::new(ctx.subject(), feature);
        match self.add_use(&key, Some(limit)).await {
            Ok((record, true)) => AccessDecision::consumed(record.count, limit),
            Ok((record, false)) => AccessDecision::limited(record.count, limit),
            Err(err) => {
                tracing::error!(key = %key, error = %err, "consume failed, denying");
                AccessDecision::check_failed(err)
            }
        }
    }

    /// Run `action` if allowed, then count the attempt.
    ///
    /// The use is recorded once the action has run, whatever its result.
    pub async fn run_gated<F, T>(&self, ctx: &SessionContext, feature: Feature, action: F) -> Gated<T>
    where
        F: Future<Output = T>,
    {
        let decision = self.check_access(ctx, feature).await;
        if !decision.allowed {
            return Gated::Denied(decision);
        }

        let output = action.await;
        self.increment_usage(ctx, feature).await;
        Gated::Performed { output, decision }
    }

    /// Access state of every tool for `ctx`
    pub async fn feature_overview(&self, ctx: &SessionContext) -> Vec<FeatureStatus> {
        let mut statuses = Vec::with_capacity(Feature::ALL.len());
        for feature in Feature::ALL {
            statuses.push(FeatureStatus {
                feature,
                title: feature.title(),
                decision: self.check_access(ctx, feature).await,
            });
        }
        statuses
    }

    async fn call_store<T>(&self, op: impl Future<Output = StoreResult<T>>) -> GateResult<T> {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(result) => result.map_err(GateError::from),
            Err(_) => Err(GateError::StoreTimeout {
                timeout_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Count in the current window, creating or resetting the record if needed
    async fn current_count(&self, key: &UsageKey) -> GateResult<u64> {
        let window = self.policy.window();
        let now = self.clock.now();

        if let Some(record) = self.call_store(self.store.load(key)).await? {
            if !window.has_rolled_over(record.window_start, now) {
                return Ok(record.count);
            }
        }

        let fresh_key = key.clone();
        let record = self
            .call_store(self.store.update(
                key,
                Box::new(move |current: Option<UsageRecord>| match current {
                    Some(mut record) => {
                        record.roll_window(window, now);
                        record
                    }
                    None => UsageRecord::fresh(&fresh_key, window, now),
                }),
            ))
            .await?;
        Ok(record.count)
    }

    /// Add one use, refusing at `cap` when given. Returns the stored record and
    /// whether the use was added.
    async fn add_use(&self, key: &UsageKey, cap: Option<u64>) -> GateResult<(UsageRecord, bool)> {
        let window = self.policy.window();
        let now = self.clock.now();
        let added = Arc::new(AtomicBool::new(false));

        let fresh_key = key.clone();
        let flag = Arc::clone(&added);
        let record = self
            .call_store(self.store.update(
                key,
                Box::new(move |current: Option<UsageRecord>| {
                    let mut record =
                        current.unwrap_or_else(|| UsageRecord::fresh(&fresh_key, window, now));
                    record.roll_window(window, now);
                    if cap.map_or(true, |cap| record.count < cap) {
                        record.increment(now);
                        flag.store(true, Ordering::SeqCst);
                    }
                    record
                }),
            ))
            .await?;

        Ok((record, added.load(Ordering::SeqCst)))
    }
}

impl std::fmt::Debug for FeatureAccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureAccessGate")
            .field("window", &self.policy.window())
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}
