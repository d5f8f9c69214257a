use crate::models::input::{
    require_non_empty, require_text, validate_contribution_split, ValidationError,
};
use crate::models::weights::{
    BugImpactWeight, ContributionLevel, DecisionImportance, FeatureWeights, InfluenceLevel,
    MeetingImportance, Severity,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Draft,
    InProgress,
    Done,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Draft => "draft",
            FeatureStatus::InProgress => "in_progress",
            FeatureStatus::Done => "done",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(FeatureStatus::Draft),
            "in_progress" => Some(FeatureStatus::InProgress),
            "done" => Some(FeatureStatus::Done),
            _ => None,
        }
    }
}

/// A member's share of one feature, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ContributionPercent(f64);

impl ContributionPercent {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::InvalidPercent(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn fraction(self) -> f64 {
        self.0 / 100.0
    }
}

impl TryFrom<f64> for ContributionPercent {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContributionPercent> for f64 {
    fn from(value: ContributionPercent) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub member_id: String,
    pub contribution_percent: ContributionPercent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub weights: FeatureWeights,
    pub status: FeatureStatus,
    /// Set when the feature reaches `done`; never cleared.
    pub weights_locked: bool,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub contributions: Vec<FeatureContribution>,
}

/// A resolved bug. The resolver receives full credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugFix {
    pub id: String,
    pub title: Option<String>,
    pub severity: Severity,
    pub impact_weight: BugImpactWeight,
    pub resolved_by_id: String,
    pub resolved_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingContribution {
    pub member_id: String,
    pub contribution_level: ContributionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub topic: String,
    pub importance_weight: MeetingImportance,
    pub held_at: i64,
    pub contributions: Vec<MeetingContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContribution {
    pub member_id: String,
    pub influence_level: InfluenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub importance_weight: DecisionImportance,
    pub decided_at: i64,
    pub contributions: Vec<DecisionContribution>,
}

/// Partial edit of a feature's descriptive fields. `description: Some(None)`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDetailsPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

impl FeatureDetailsPatch {
    pub fn apply(self, feature: &mut Feature) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(title) = self.title {
            feature.title = title;
        }
        if let Some(description) = self.description {
            feature.description = description;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BugFixPatch {
    pub title: Option<Option<String>>,
    pub severity: Option<Severity>,
    pub impact_weight: Option<BugImpactWeight>,
    pub resolved_by_id: Option<String>,
}

impl BugFixPatch {
    pub fn apply(self, bug: &mut BugFix) -> Result<(), ValidationError> {
        if let Some(resolver) = &self.resolved_by_id {
            require_text("resolved_by_id", resolver)?;
        }
        if let Some(title) = self.title {
            bug.title = title;
        }
        if let Some(severity) = self.severity {
            bug.severity = severity;
        }
        if let Some(impact) = self.impact_weight {
            bug.impact_weight = impact;
        }
        if let Some(resolver) = self.resolved_by_id {
            bug.resolved_by_id = resolver;
        }
        Ok(())
    }
}

/// Partial edit of a meeting. A contribution list replaces the old one whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingPatch {
    pub topic: Option<String>,
    pub importance_weight: Option<MeetingImportance>,
    pub contributions: Option<Vec<MeetingContribution>>,
}

impl MeetingPatch {
    pub fn apply(self, meeting: &mut Meeting) -> Result<(), ValidationError> {
        if let Some(topic) = &self.topic {
            require_text("topic", topic)?;
        }
        if let Some(contributions) = &self.contributions {
            require_non_empty("contributions", contributions)?;
        }
        if let Some(topic) = self.topic {
            meeting.topic = topic;
        }
        if let Some(importance) = self.importance_weight {
            meeting.importance_weight = importance;
        }
        if let Some(contributions) = self.contributions {
            meeting.contributions = contributions;
        }
        Ok(())
    }
}

/// Partial edit of a decision. A contribution list replaces the old one whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub importance_weight: Option<DecisionImportance>,
    pub contributions: Option<Vec<DecisionContribution>>,
}

impl DecisionPatch {
    pub fn apply(self, decision: &mut Decision) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(contributions) = &self.contributions {
            require_non_empty("contributions", contributions)?;
        }
        if let Some(title) = self.title {
            decision.title = title;
        }
        if let Some(description) = self.description {
            decision.description = description;
        }
        if let Some(importance) = self.importance_weight {
            decision.importance_weight = importance;
        }
        if let Some(contributions) = self.contributions {
            decision.contributions = contributions;
        }
        Ok(())
    }
}

/// Checks a new feature before it is stored.
pub fn validate_feature(feature: &Feature) -> Result<(), ValidationError> {
    require_text("title", &feature.title)?;
    validate_contribution_split(&feature.id, &feature.contributions)
}

/// Checks a new meeting before it is stored.
pub fn validate_meeting(meeting: &Meeting) -> Result<(), ValidationError> {
    require_text("topic", &meeting.topic)?;
    require_non_empty("contributions", &meeting.contributions)
}

/// Checks a new decision before it is stored.
pub fn validate_decision(decision: &Decision) -> Result<(), ValidationError> {
    require_text("title", &decision.title)?;
    require_non_empty("contributions", &decision.contributions)
}
