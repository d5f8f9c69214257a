use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;

/// Uncapped, pre-multiplier component sums for one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawComponents {
    pub feature_score: f64,
    pub bug_score: f64,
    pub meeting_score_raw: f64,
    pub decision_score: f64,
}

impl RawComponents {
    /// Feature + bug + decision: everything the meeting cap is measured against.
    pub fn core(&self) -> f64 {
        self.feature_score + self.bug_score + self.decision_score
    }

    pub fn uncapped_total(&self) -> f64 {
        self.core() + self.meeting_score_raw
    }
}

impl AddAssign for RawComponents {
    fn add_assign(&mut self, rhs: Self) {
        self.feature_score += rhs.feature_score;
        self.bug_score += rhs.bug_score;
        self.meeting_score_raw += rhs.meeting_score_raw;
        self.decision_score += rhs.decision_score;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub feature_score: f64,
    pub bug_score: f64,
    /// After the meeting cap.
    pub meeting_score: f64,
    /// Before the meeting cap, kept for transparency.
    pub meeting_score_raw: f64,
    pub decision_score: f64,
    pub total: f64,
}

/// Result of scoring every active member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityReport {
    pub scores: BTreeMap<String, ScoreBreakdown>,
    pub equity_percents: BTreeMap<String, f64>,
    pub total_score: f64,
}
