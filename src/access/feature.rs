//! # Features and Access Levels
//!
//! The closed sets of gated tools and subscription tiers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::GateError;

/// A gated capability, one per tool page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Clinical calculators (BMI, dosing, ...)
    MedicalCalculator,
    /// Drug monograph lookup
    DrugReference,
    /// Food nutrient lookup
    NutritionDatabase,
    /// Disease summaries
    DiseaseLibrary,
    /// Guideline search
    ClinicalGuidelines,
    /// AI medical assistant
    AiChatbot,
    /// AI manuscript peer review
    AiPeerReview,
    /// Gemini playground
    ExploreGemini,
    /// DeepSeek playground
    ExploreDeepseek,
    /// ChatGPT playground
    ExploreChatgpt,
    /// Drug-drug interaction checker
    InteractionChecker,
    /// AI mind map generator
    MindMapMaker,
    /// Clinical scores (CHA2DS2-VASc, Wells, CURB-65, MELD, GCS)
    ClinicalScoring,
}

impl Feature {
    /// Every feature, in tool catalogue order
    pub const ALL: [Feature; 13] = [
        Feature::MedicalCalculator,
        Feature::DrugReference,
        Feature::NutritionDatabase,
        Feature::DiseaseLibrary,
        Feature::ClinicalGuidelines,
        Feature::AiChatbot,
        Feature::AiPeerReview,
        Feature::ExploreGemini,
        Feature::ExploreDeepseek,
        Feature::ExploreChatgpt,
        Feature::InteractionChecker,
        Feature::MindMapMaker,
        Feature::ClinicalScoring,
    ];

    /// Wire name, as used by tool pages and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedicalCalculator => "medical_calculator",
            Self::DrugReference => "drug_reference",
            Self::NutritionDatabase => "nutrition_database",
            Self::DiseaseLibrary => "disease_library",
            Self::ClinicalGuidelines => "clinical_guidelines",
            Self::AiChatbot => "ai_chatbot",
            Self::AiPeerReview => "ai_peer_review",
            Self::ExploreGemini => "explore_gemini",
            Self::ExploreDeepseek => "explore_deepseek",
            Self::ExploreChatgpt => "explore_chatgpt",
            Self::InteractionChecker => "interaction_checker",
            Self::MindMapMaker => "mind_map_maker",
            Self::ClinicalScoring => "clinical_scoring",
        }
    }

    /// Display title for the tool catalogue
    pub fn title(&self) -> &'static str {
        match self {
            Self::MedicalCalculator => "Medical Calculator",
            Self::DrugReference => "Drug Reference",
            Self::NutritionDatabase => "Nutrition Database",
            Self::DiseaseLibrary => "Disease Library",
            Self::ClinicalGuidelines => "Clinical Guidelines",
            Self::AiChatbot => "AI Chatbot",
            Self::AiPeerReview => "AI Peer Review",
            Self::ExploreGemini => "Explore Gemini",
            Self::ExploreDeepseek => "Explore DeepSeek",
            Self::ExploreChatgpt => "Explore ChatGPT",
            Self::InteractionChecker => "Interaction Checker",
            Self::MindMapMaker => "AI Mind Map Generator",
            Self::ClinicalScoring => "Clinical Scoring Hub",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| GateError::UnknownFeature {
                name: s.to_string(),
            })
    }
}

/// Subscription or role tier of a session
///
/// Deserialization goes through [`FromStr`], so JSON and headers accept the
/// same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AccessLevel {
    /// No signed-in user
    Anonymous,
    /// Signed in, no subscription
    Free,
    /// Paying subscriber
    Subscriber,
    /// Research tier
    Researcher,
    /// Site administrator
    Administrator,
}

impl AccessLevel {
    /// Every level, lowest tier first
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Anonymous,
        AccessLevel::Free,
        AccessLevel::Subscriber,
        AccessLevel::Researcher,
        AccessLevel::Administrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Free => "free",
            Self::Subscriber => "subscriber",
            Self::Researcher => "researcher",
            Self::Administrator => "administrator",
        }
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::Anonymous
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = GateError;

    /// Case-insensitive; the identity provider reports e.g. "Administrator"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        AccessLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| GateError::UnknownAccessLevel {
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for AccessLevel {
    type Error = GateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_round_trip() {
        for feature in Feature::ALL {
            let parsed: Feature = feature.as_str().parse().unwrap();
            assert_eq!(parsed, feature);
        }
    }

    #[test]
    fn test_unknown_feature() {
        let err = "telepathy".parse::<Feature>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_FEATURE");
    }

    #[test]
    fn test_feature_serialization() {
        let json = serde_json::to_string(&Feature::AiChatbot).unwrap();
        assert_eq!(json, "\"ai_chatbot\"");

        let parsed: Feature = serde_json::from_str("\"explore_deepseek\"").unwrap();
        assert_eq!(parsed, Feature::ExploreDeepseek);
    }

    #[test]
    fn test_access_level_parsing_is_case_insensitive() {
        assert_eq!(
            "Administrator".parse::<AccessLevel>().unwrap(),
            AccessLevel::Administrator
        );
        assert_eq!(" free ".parse::<AccessLevel>().unwrap(), AccessLevel::Free);
        assert!("platinum".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn test_access_level_json_matches_header_parsing() {
        let parsed: AccessLevel = serde_json::from_str("\"Administrator\"").unwrap();
        assert_eq!(parsed, AccessLevel::Administrator);
        let parsed: AccessLevel = serde_json::from_str("\"researcher\"").unwrap();
        assert_eq!(parsed, AccessLevel::Researcher);
        assert!(serde_json::from_str::<AccessLevel>("\"platinum\"").is_err());

        assert_eq!(
            serde_json::to_string(&AccessLevel::Subscriber).unwrap(),
            "\"subscriber\""
        );
    }

    #[test]
    fn test_default_level_is_anonymous() {
        assert_eq!(AccessLevel::default(), AccessLevel::Anonymous);
    }
}
