//! Per-unit contribution scores and the policy values behind them.

use crate::models::contribution::FeatureStatus;
use serde::{Deserialize, Serialize};

pub const FEATURE_IMPACT_COEFF: f64 = 0.4;
pub const FEATURE_DIFFICULTY_COEFF: f64 = 0.3;
pub const FEATURE_BUSINESS_VALUE_COEFF: f64 = 0.3;
pub const BUG_SCORE_MULTIPLIER: f64 = 2.0;
pub const DECISION_SCORE_MULTIPLIER: f64 = 2.0;

/// Max share of a member's total that may come from meetings, in percent.
pub const MEETING_SCORE_CAP_PERCENT: f64 = 10.0;

/// Decimal places kept on equity percentages.
pub const PERCENT_DECIMALS: i32 = 2;

/// What the meeting cap percentage is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapBasis {
    /// `core + meeting_raw`. The ceiling grows with raw meeting score.
    UncappedTotal,
    /// `core + meeting_capped`. Capped meeting score never exceeds the
    /// percentage of the final total.
    CappedTotal,
}

impl CapBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapBasis::UncappedTotal => "uncapped_total",
            CapBasis::CappedTotal => "capped_total",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "uncapped_total" => Some(CapBasis::UncappedTotal),
            "capped_total" => Some(CapBasis::CappedTotal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub impact_coeff: f64,
    pub difficulty_coeff: f64,
    pub business_value_coeff: f64,
    pub bug_multiplier: f64,
    pub decision_multiplier: f64,
    pub meeting_cap_percent: f64,
    pub cap_basis: CapBasis,
    /// Score `in_progress` features at their current weights as well as `done` ones.
    pub include_in_progress_features: bool,
}

pub const DEFAULT_POLICY: ScoringPolicy = ScoringPolicy {
    impact_coeff: FEATURE_IMPACT_COEFF,
    difficulty_coeff: FEATURE_DIFFICULTY_COEFF,
    business_value_coeff: FEATURE_BUSINESS_VALUE_COEFF,
    bug_multiplier: BUG_SCORE_MULTIPLIER,
    decision_multiplier: DECISION_SCORE_MULTIPLIER,
    meeting_cap_percent: MEETING_SCORE_CAP_PERCENT,
    cap_basis: CapBasis::UncappedTotal,
    include_in_progress_features: false,
};

impl Default for ScoringPolicy {
    fn default() -> Self {
        DEFAULT_POLICY
    }
}

impl ScoringPolicy {
    pub fn feature_base_score(&self, impact: f64, difficulty: f64, business_value: f64) -> f64 {
        impact * self.impact_coeff
            + difficulty * self.difficulty_coeff
            + business_value * self.business_value_coeff
    }

    pub fn bug_score(&self, severity: f64, impact_weight: f64) -> f64 {
        severity * impact_weight * self.bug_multiplier
    }

    pub fn meeting_score(&self, importance_weight: f64, contribution_level: f64) -> f64 {
        importance_weight * contribution_level
    }

    pub fn decision_score(&self, importance_weight: f64, influence_level: f64) -> f64 {
        importance_weight * influence_level * self.decision_multiplier
    }

    pub fn counts_feature(&self, status: FeatureStatus) -> bool {
        match status {
            FeatureStatus::Done => true,
            FeatureStatus::InProgress => self.include_in_progress_features,
            FeatureStatus::Draft => false,
        }
    }
}

/// `impact·0.4 + difficulty·0.3 + business_value·0.3`, before any contribution split.
pub fn feature_base_score(impact: f64, difficulty: f64, business_value: f64) -> f64 {
    DEFAULT_POLICY.feature_base_score(impact, difficulty, business_value)
}

/// `severity × impact × 2`, credited whole to the resolver.
pub fn bug_score(severity: f64, impact_weight: f64) -> f64 {
    DEFAULT_POLICY.bug_score(severity, impact_weight)
}

/// `importance × contribution level`, credited per participant.
pub fn meeting_score(importance_weight: f64, contribution_level: f64) -> f64 {
    DEFAULT_POLICY.meeting_score(importance_weight, contribution_level)
}

/// `importance × influence × 2`, credited per participant.
pub fn decision_score(importance_weight: f64, influence_level: f64) -> f64 {
    DEFAULT_POLICY.decision_score(importance_weight, influence_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unit_scores_match_reference_values() {
        assert_eq!(bug_score(5.0, 5.0), 50.0);
        assert_eq!(bug_score(1.0, 1.0), 2.0);
        assert_eq!(meeting_score(5.0, 5.0), 25.0);
        assert_eq!(decision_score(10.0, 5.0), 100.0);
        assert!((feature_base_score(10.0, 5.0, 10.0) - 8.5).abs() < 1e-12);
    }

    #[test]
    fn only_done_features_count_by_default() {
        assert!(DEFAULT_POLICY.counts_feature(FeatureStatus::Done));
        assert!(!DEFAULT_POLICY.counts_feature(FeatureStatus::InProgress));
        assert!(!DEFAULT_POLICY.counts_feature(FeatureStatus::Draft));

        let lenient = ScoringPolicy {
            include_in_progress_features: true,
            ..DEFAULT_POLICY
        };
        assert!(lenient.counts_feature(FeatureStatus::InProgress));
        assert!(!lenient.counts_feature(FeatureStatus::Draft));
    }

    #[test]
    fn policy_overrides_apply() {
        let policy = ScoringPolicy {
            bug_multiplier: 3.0,
            decision_multiplier: 1.0,
            ..DEFAULT_POLICY
        };
        assert_eq!(policy.bug_score(2.0, 2.0), 12.0);
        assert_eq!(policy.decision_score(4.0, 2.0), 8.0);
    }

    proptest! {
        #[test]
        fn base_score_is_the_weighted_sum(i in 1u8..=10, d in 1u8..=5, b in 1u8..=10) {
            let (i, d, b) = (f64::from(i), f64::from(d), f64::from(b));
            prop_assert_eq!(feature_base_score(i, d, b), 0.4 * i + 0.3 * d + 0.3 * b);
        }
    }
}
