use crate::analysis::cap::apply_meeting_cap;
use crate::analysis::formulas::ScoringPolicy;
use crate::models::member::RiskMultiplier;
use crate::models::score::{RawComponents, ScoreBreakdown};

/// Caps meetings on the raw magnitudes, then scales every figure by the
/// member's risk multiplier. The cap must run first so its ratio is
/// independent of the multiplier.
pub fn build_member_breakdown(
    raw: &RawComponents,
    risk_multiplier: RiskMultiplier,
    policy: &ScoringPolicy,
) -> ScoreBreakdown {
    let capped = apply_meeting_cap(raw, policy);
    let m = risk_multiplier.get();

    ScoreBreakdown {
        feature_score: raw.feature_score * m,
        bug_score: raw.bug_score * m,
        meeting_score: capped.meeting_score * m,
        meeting_score_raw: raw.meeting_score_raw * m,
        decision_score: raw.decision_score * m,
        total: capped.total * m,
    }
}
