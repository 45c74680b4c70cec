use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}

/// Analysis features the remote service can run on an email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Highlights,
    Response,
    Tone,
    TaskExtraction,
    SubjectRecommendation,
    Clarity,
    ComplexityReduction,
    ScenarioResponses,
    Sentiment,
    PhishingDetection,
    SensitiveInfoDetection,
    ConfidentialityRating,
    BiasDetection,
    ConflictDetection,
    ArgumentMining,
}

impl Feature {
    pub const COUNT: usize = 15;

    /// All features in form order
    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::Highlights,
        Feature::Response,
        Feature::Tone,
        Feature::TaskExtraction,
        Feature::SubjectRecommendation,
        Feature::Clarity,
        Feature::ComplexityReduction,
        Feature::ScenarioResponses,
        Feature::Sentiment,
        Feature::PhishingDetection,
        Feature::SensitiveInfoDetection,
        Feature::ConfidentialityRating,
        Feature::BiasDetection,
        Feature::ConflictDetection,
        Feature::ArgumentMining,
    ];

    /// Key used in the request body
    pub fn key(&self) -> &'static str {
        match self {
            Feature::Highlights => "highlights",
            Feature::Response => "response",
            Feature::Tone => "tone",
            Feature::TaskExtraction => "task_extraction",
            Feature::SubjectRecommendation => "subject_recommendation",
            Feature::Clarity => "clarity",
            Feature::ComplexityReduction => "complexity_reduction",
            Feature::ScenarioResponses => "scenario_responses",
            Feature::Sentiment => "sentiment",
            Feature::PhishingDetection => "phishing_detection",
            Feature::SensitiveInfoDetection => "sensitive_info_detection",
            Feature::ConfidentialityRating => "confidentiality_rating",
            Feature::BiasDetection => "bias_detection",
            Feature::ConflictDetection => "conflict_detection",
            Feature::ArgumentMining => "argument_mining",
        }
    }

    /// Checkbox label shown in the form
    pub fn label(&self) -> &'static str {
        match self {
            Feature::Highlights => "Summarize Email",
            Feature::Response => "Generate Professional Response",
            Feature::Tone => "Detect Tone",
            Feature::TaskExtraction => "List Actionable Tasks",
            Feature::SubjectRecommendation => "Suggest Subject Line",
            Feature::Clarity => "Rate Clarity",
            Feature::ComplexityReduction => "Simplify Email",
            Feature::ScenarioResponses => "Scenario-Based Response",
            Feature::Sentiment => "Sentiment Analysis",
            Feature::PhishingDetection => "Detect Phishing Links",
            Feature::SensitiveInfoDetection => "Detect Sensitive Info",
            Feature::ConfidentialityRating => "Confidentiality Rating",
            Feature::BiasDetection => "Detect Biases",
            Feature::ConflictDetection => "Detect Conflicts",
            Feature::ArgumentMining => "Analyze Arguments",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl FromStr for Feature {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Feature::ALL
            .iter()
            .copied()
            .find(|feature| feature.key() == key)
            .ok_or_else(|| FormError::UnknownFeature(key.to_string()))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// On/off state for every feature. The key set is fixed to `Feature::ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSelection {
    enabled: [bool; Feature::COUNT],
}

impl Default for FeatureSelection {
    fn default() -> Self {
        Self::all(true)
    }
}

impl FeatureSelection {
    pub fn all(value: bool) -> Self {
        Self {
            enabled: [value; Feature::COUNT],
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: bool) {
        self.enabled[feature.index()] = value;
    }

    pub fn toggle(&mut self, feature: Feature) {
        let idx = feature.index();
        self.enabled[idx] = !self.enabled[idx];
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled.iter().filter(|on| **on).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, bool)> + '_ {
        Feature::ALL
            .iter()
            .map(move |feature| (*feature, self.enabled[feature.index()]))
    }
}

impl Serialize for FeatureSelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(Feature::COUNT))?;
        for (feature, enabled) in self.iter() {
            map.serialize_entry(feature.key(), &enabled)?;
        }
        map.end()
    }
}

/// Context the service uses when drafting a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scenario {
    #[default]
    General,
    #[serde(rename = "Customer Support")]
    CustomerSupport,
    #[serde(rename = "Business Proposal")]
    BusinessProposal,
    Complaint,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::General,
        Scenario::CustomerSupport,
        Scenario::BusinessProposal,
        Scenario::Complaint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::General => "General",
            Scenario::CustomerSupport => "Customer Support",
            Scenario::BusinessProposal => "Business Proposal",
            Scenario::Complaint => "Complaint",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl FromStr for Scenario {
    type Err = FormError;

    /// Accepts the display name or a snake/kebab-case variant, any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-'], " ").to_lowercase();
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str().to_lowercase() == wanted)
            .ok_or_else(|| FormError::UnknownScenario(s.trim().to_string()))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the form taken when an action is triggered.
///
/// Owned and passed by value, so nothing the user edits afterwards can leak
/// into a request that is already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    pub email_content: String,
    pub features: FeatureSelection,
    pub scenario: Scenario,
}

impl AnalysisRequest {
    pub fn new(email_content: impl Into<String>, features: FeatureSelection, scenario: Scenario) -> Self {
        Self {
            email_content: email_content.into(),
            features,
            scenario,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_default_selection_enables_everything() {
        let selection = FeatureSelection::default();
        assert_eq!(selection.enabled_count(), Feature::COUNT);
        assert!(Feature::ALL.iter().all(|f| selection.is_enabled(*f)));
    }

    #[test]
    fn test_selection_serializes_exactly_fifteen_keys() {
        let mut selection = FeatureSelection::default();
        selection.set(Feature::Tone, false);
        selection.toggle(Feature::ArgumentMining);

        let value = serde_json::to_value(selection).unwrap();
        let map = value.as_object().unwrap();

        assert_eq!(map.len(), 15);
        for feature in Feature::ALL {
            assert_eq!(map.get(feature.key()), Some(&Value::Bool(selection.is_enabled(feature))));
        }
        assert_eq!(map["tone"], Value::Bool(false));
        assert_eq!(map["argument_mining"], Value::Bool(false));
        assert_eq!(map["phishing_detection"], Value::Bool(true));
    }

    #[test]
    fn test_feature_keys_are_unique_and_parse_back() {
        let mut keys: Vec<&str> = Feature::ALL.iter().map(|f| f.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Feature::COUNT);

        for feature in Feature::ALL {
            assert_eq!(feature.key().parse::<Feature>(), Ok(feature));
        }
        assert_eq!(
            "spam_score".parse::<Feature>(),
            Err(FormError::UnknownFeature("spam_score".to_string()))
        );
    }

    #[test]
    fn test_scenario_cycles_both_ways() {
        assert_eq!(Scenario::General.next(), Scenario::CustomerSupport);
        assert_eq!(Scenario::Complaint.next(), Scenario::General);
        assert_eq!(Scenario::General.prev(), Scenario::Complaint);
        assert_eq!(Scenario::BusinessProposal.prev(), Scenario::CustomerSupport);
    }

    #[test]
    fn test_scenario_parsing() {
        assert_eq!("General".parse::<Scenario>(), Ok(Scenario::General));
        assert_eq!("customer support".parse::<Scenario>(), Ok(Scenario::CustomerSupport));
        assert_eq!("business-proposal".parse::<Scenario>(), Ok(Scenario::BusinessProposal));
        assert_eq!("COMPLAINT".parse::<Scenario>(), Ok(Scenario::Complaint));
        assert!("refund".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let request = AnalysisRequest::new("", FeatureSelection::all(false), Scenario::default());
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["email_content"], Value::String(String::new()));
        assert_eq!(body["scenario"], Value::String("General".to_string()));
        let features = body["features"].as_object().unwrap();
        assert_eq!(features.len(), 15);
        assert!(features.values().all(|v| *v == Value::Bool(false)));
        assert_eq!(body.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_scenario_serializes_display_name() {
        let value = serde_json::to_value(Scenario::CustomerSupport).unwrap();
        assert_eq!(value, Value::String("Customer Support".to_string()));
        let back: Scenario = serde_json::from_value(value).unwrap();
        assert_eq!(back, Scenario::CustomerSupport);
    }
}
