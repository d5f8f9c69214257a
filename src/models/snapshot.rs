use serde::{Deserialize, Serialize};

/// Frozen equity state for one period. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub id: String,
    pub period_label: String,
    pub created_at: i64,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub member_id: String,
    pub equity_percent: f64,
    pub total_score: f64,
    pub feature_score: f64,
    pub bug_score: f64,
    pub meeting_score: f64,
    pub decision_score: f64,
}
