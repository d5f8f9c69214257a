use crate::models::contribution::{BugFix, Decision, Feature, FeatureContribution, Meeting};
use crate::models::member::ActiveMember;
use std::collections::HashSet;

/// Tolerance for the "contribution percents sum to 100" check.
const PERCENT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("value {value} outside allowed range [{min}, {max}]")]
    OutOfRange { value: i64, min: u8, max: u8 },
    #[error("risk multiplier must be finite and positive, got {0}")]
    InvalidRiskMultiplier(f64),
    #[error("contribution percent must be within [0, 100], got {0}")]
    InvalidPercent(f64),
    #[error("contribution percents for feature {feature_id} sum to {sum}, expected 100")]
    ContributionSum { feature_id: String, sum: f64 },
    #[error("member {0} listed more than once")]
    DuplicateMember(String),
    #[error("unknown status: {0}")]
    UnknownStatus(String),
    #[error("period label must not be empty")]
    EmptyPeriodLabel,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

pub fn require_non_empty<T>(field: &'static str, values: &[T]) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

/// Checks the 100% split rule for one feature. An empty split is allowed.
pub fn validate_contribution_split(
    feature_id: &str,
    contributions: &[FeatureContribution],
) -> Result<(), ValidationError> {
    if contributions.is_empty() {
        return Ok(());
    }

    let sum: f64 = contributions
        .iter()
        .map(|c| c.contribution_percent.get())
        .sum();
    if (sum - 100.0).abs() > PERCENT_SUM_TOLERANCE {
        return Err(ValidationError::ContributionSum {
            feature_id: feature_id.to_string(),
            sum,
        });
    }
    Ok(())
}

/// Well-formed aggregator input.
///
/// Range checks are carried by the field types; this constructor adds the
/// cross-record rules (feature splits, unique members) so the scoring code
/// can assume them.
#[derive(Debug, Clone, Default)]
pub struct ScoringInput {
    members: Vec<ActiveMember>,
    active_ids: HashSet<String>,
    features: Vec<Feature>,
    bugs: Vec<BugFix>,
    meetings: Vec<Meeting>,
    decisions: Vec<Decision>,
}

impl ScoringInput {
    pub fn new(
        members: Vec<ActiveMember>,
        features: Vec<Feature>,
        bugs: Vec<BugFix>,
        meetings: Vec<Meeting>,
        decisions: Vec<Decision>,
    ) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(member.id.as_str()) {
                return Err(ValidationError::DuplicateMember(member.id.clone()));
            }
        }

        for feature in &features {
            validate_contribution_split(&feature.id, &feature.contributions)?;
        }

        let active_ids = members.iter().map(|m| m.id.clone()).collect();

        Ok(Self {
            members,
            active_ids,
            features,
            bugs,
            meetings,
            decisions,
        })
    }

    pub fn members(&self) -> &[ActiveMember] {
        &self.members
    }

    pub fn is_active(&self, member_id: &str) -> bool {
        self.active_ids.contains(member_id)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn bugs(&self) -> &[BugFix] {
        &self.bugs
    }

    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }
}
