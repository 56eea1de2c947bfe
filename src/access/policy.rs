//! # Quota Policy
//!
//! Admitted usage per (access level, feature). Loaded once at startup and
//! read-only afterwards; the only source of truth for what is allowed.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{GateError, GateResult};
use super::feature::{AccessLevel, Feature};

/// Admitted usage rule for one (level, feature) pair
///
/// Configuration form is either a count (`5`) or a keyword
/// (`"unlimited"`, `"disabled"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRepr", into = "RuleRepr")]
pub enum QuotaRule {
    /// Always allowed, never counted
    Unlimited,
    /// Never allowed
    Disabled,
    /// Allowed up to `n` uses per window
    Limited(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Count(u64),
    Keyword(String),
}

impl TryFrom<RuleRepr> for QuotaRule {
    type Error = String;

    fn try_from(repr: RuleRepr) -> Result<Self, Self::Error> {
        match repr {
            RuleRepr::Count(n) => Ok(Self::Limited(n)),
            RuleRepr::Keyword(word) => match word.to_ascii_lowercase().as_str() {
                "unlimited" => Ok(Self::Unlimited),
                "disabled" => Ok(Self::Disabled),
                _ => Err(format!(
                    "invalid quota rule '{}': expected a count, \"unlimited\" or \"disabled\"",
                    word
                )),
            },
        }
    }
}

impl From<QuotaRule> for RuleRepr {
    fn from(rule: QuotaRule) -> Self {
        match rule {
            QuotaRule::Unlimited => Self::Keyword("unlimited".to_string()),
            QuotaRule::Disabled => Self::Keyword("disabled".to_string()),
            QuotaRule::Limited(n) => Self::Count(n),
        }
    }
}

impl std::fmt::Display for QuotaRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Disabled => write!(f, "disabled"),
            Self::Limited(n) => write!(f, "{} per window", n),
        }
    }
}

/// Recurring period over which usage accumulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWindow {
    /// UTC calendar day
    Daily,
    /// UTC calendar month
    Monthly,
}

impl Default for QuotaWindow {
    fn default() -> Self {
        Self::Daily
    }
}

impl QuotaWindow {
    /// Start of the window containing `now`
    pub fn start_of(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let day = now.date_naive();
        let first = match self {
            Self::Daily => day,
            Self::Monthly => day - Duration::days(i64::from(day.day0())),
        };
        first.and_time(NaiveTime::MIN).and_utc()
    }

    /// Whether `now` falls into a later window than the one starting at `window_start`
    pub fn has_rolled_over(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.start_of(now) > window_start
    }
}

impl std::fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Built-in rule table
pub fn default_rule(level: AccessLevel, feature: Feature) -> QuotaRule {
    use Feature::*;
    use QuotaRule::{Disabled, Limited, Unlimited};

    match level {
        AccessLevel::Anonymous => match feature {
            MedicalCalculator | ClinicalScoring => Limited(3),
            DrugReference => Limited(2),
            _ => Disabled,
        },
        AccessLevel::Free => match feature {
            MedicalCalculator | ClinicalScoring => Limited(20),
            DrugReference | NutritionDatabase | DiseaseLibrary | InteractionChecker => Limited(5),
            ClinicalGuidelines | AiChatbot => Limited(3),
            AiPeerReview | ExploreGemini | ExploreDeepseek | ExploreChatgpt | MindMapMaker => {
                Disabled
            }
        },
        AccessLevel::Subscriber => match feature {
            MedicalCalculator | ClinicalScoring => Unlimited,
            DrugReference | NutritionDatabase | DiseaseLibrary | InteractionChecker
            | ClinicalGuidelines => Limited(100),
            AiChatbot | AiPeerReview => Limited(50),
            ExploreGemini | ExploreDeepseek | ExploreChatgpt | MindMapMaker => Limited(20),
        },
        AccessLevel::Researcher => match feature {
            AiChatbot | AiPeerReview | ExploreGemini | ExploreDeepseek | ExploreChatgpt
            | MindMapMaker => Limited(200),
            _ => Unlimited,
        },
        AccessLevel::Administrator => Unlimited,
    }
}

/// Quota policy table
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    window: QuotaWindow,
    rules: HashMap<(AccessLevel, Feature), QuotaRule>,
    disabled_features: BTreeSet<Feature>,
}

impl QuotaPolicy {
    /// Policy with no rules; every lookup is a configuration gap
    pub fn empty(window: QuotaWindow) -> Self {
        Self {
            window,
            rules: HashMap::new(),
            disabled_features: BTreeSet::new(),
        }
    }

    /// Built-in policy covering every (level, feature) pair
    pub fn builtin(window: QuotaWindow) -> Self {
        let mut policy = Self::empty(window);
        for level in AccessLevel::ALL {
            for feature in Feature::ALL {
                policy.set_rule(level, feature, default_rule(level, feature));
            }
        }
        policy
    }

    /// Set or replace a rule
    pub fn set_rule(&mut self, level: AccessLevel, feature: Feature, rule: QuotaRule) {
        self.rules.insert((level, feature), rule);
    }

    /// Builder form of [`set_rule`](Self::set_rule)
    pub fn with_rule(mut self, level: AccessLevel, feature: Feature, rule: QuotaRule) -> Self {
        self.set_rule(level, feature, rule);
        self
    }

    /// Turn a feature off for every level
    pub fn disable_feature(&mut self, feature: Feature) {
        self.disabled_features.insert(feature);
    }

    /// Reset window
    pub fn window(&self) -> QuotaWindow {
        self.window
    }

    /// Strict lookup: a missing entry is an error
    pub fn lookup(&self, level: AccessLevel, feature: Feature) -> GateResult<QuotaRule> {
        if self.disabled_features.contains(&feature) {
            return Ok(QuotaRule::Disabled);
        }
        self.rules
            .get(&(level, feature))
            .copied()
            .ok_or_else(|| GateError::ConfigurationGap {
                feature: feature.to_string(),
                level: level.to_string(),
            })
    }

    /// Effective rule; gaps fail closed
    pub fn rule_for(&self, level: AccessLevel, feature: Feature) -> QuotaRule {
        match self.lookup(level, feature) {
            Ok(rule) => rule,
            Err(err) => {
                tracing::warn!(%level, %feature, error = %err, "no policy entry, treating feature as disabled");
                QuotaRule::Disabled
            }
        }
    }

    /// Serializable view of the whole table
    pub fn snapshot(&self) -> PolicySnapshot {
        let levels = AccessLevel::ALL
            .iter()
            .map(|&level| {
                let rules = Feature::ALL
                    .iter()
                    .map(|&feature| (feature, self.rule_for(level, feature)))
                    .collect();
                (level, rules)
            })
            .collect();

        PolicySnapshot {
            window: self.window,
            disabled_features: self.disabled_features.iter().copied().collect(),
            levels,
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::builtin(QuotaWindow::default())
    }
}

/// Effective policy, as reported to operators
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshot {
    pub window: QuotaWindow,
    pub disabled_features: Vec<Feature>,
    pub levels: BTreeMap<AccessLevel, BTreeMap<Feature, QuotaRule>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builtin_policy_is_complete() {
        let policy = QuotaPolicy::builtin(QuotaWindow::Daily);
        for level in AccessLevel::ALL {
            for feature in Feature::ALL {
                assert!(policy.lookup(level, feature).is_ok());
            }
        }
        assert_eq!(
            policy.rule_for(AccessLevel::Free, Feature::DrugReference),
            QuotaRule::Limited(5)
        );
        assert_eq!(
            policy.rule_for(AccessLevel::Administrator, Feature::AiChatbot),
            QuotaRule::Unlimited
        );
    }

    #[test]
    fn test_configuration_gap_fails_closed() {
        let policy = QuotaPolicy::empty(QuotaWindow::Daily);
        let err = policy
            .lookup(AccessLevel::Administrator, Feature::DrugReference)
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_GAP");
        assert_eq!(
            policy.rule_for(AccessLevel::Administrator, Feature::DrugReference),
            QuotaRule::Disabled
        );
    }

    #[test]
    fn test_disabled_feature_overrides_every_level() {
        let mut policy = QuotaPolicy::builtin(QuotaWindow::Daily);
        policy.disable_feature(Feature::MindMapMaker);
        assert_eq!(
            policy.rule_for(AccessLevel::Administrator, Feature::MindMapMaker),
            QuotaRule::Disabled
        );
        assert_eq!(
            policy.rule_for(AccessLevel::Administrator, Feature::AiChatbot),
            QuotaRule::Unlimited
        );
    }

    #[test]
    fn test_rule_serialization() {
        assert_eq!(serde_json::to_string(&QuotaRule::Limited(5)).unwrap(), "5");
        assert_eq!(
            serde_json::to_string(&QuotaRule::Unlimited).unwrap(),
            "\"unlimited\""
        );

        let rule: QuotaRule = serde_json::from_str("\"Disabled\"").unwrap();
        assert_eq!(rule, QuotaRule::Disabled);
        assert!(serde_json::from_str::<QuotaRule>("\"sometimes\"").is_err());
    }

    #[test]
    fn test_daily_window() {
        let window = QuotaWindow::Daily;
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 45, 0).unwrap();
        assert_eq!(
            window.start_of(now),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );

        let start = window.start_of(now);
        assert!(!window.has_rolled_over(start, now));
        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 1).unwrap();
        assert!(window.has_rolled_over(start, tomorrow));
    }

    #[test]
    fn test_monthly_window() {
        let window = QuotaWindow::Monthly;
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let start = window.start_of(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

        let later_same_month = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        assert!(!window.has_rolled_over(start, later_same_month));
        let next_month = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(window.has_rolled_over(start, next_month));
    }

    #[test]
    fn test_snapshot_covers_all_levels() {
        let snapshot = QuotaPolicy::default().snapshot();
        assert_eq!(snapshot.levels.len(), AccessLevel::ALL.len());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["levels"]["free"]["drug_reference"], 5);
        assert_eq!(json["window"], "daily");
    }
}
