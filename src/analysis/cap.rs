use crate::analysis::formulas::{CapBasis, ScoringPolicy};
use crate::models::score::RawComponents;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CappedScore {
    pub meeting_score: f64,
    pub total: f64,
}

/// Highest meeting score a member may keep.
pub fn meeting_ceiling(raw: &RawComponents, cap_percent: f64, basis: CapBasis) -> f64 {
    match basis {
        CapBasis::UncappedTotal => raw.uncapped_total() * cap_percent / 100.0,
        // m <= p·(core + m)  <=>  m <= core·p / (1 - p)
        CapBasis::CappedTotal if cap_percent >= 100.0 => f64::INFINITY,
        CapBasis::CappedTotal => raw.core() * cap_percent / (100.0 - cap_percent),
    }
}

/// Bounds the meeting share of a member's score relative to their other work.
/// Operates on pre-multiplier magnitudes.
pub fn apply_meeting_cap(raw: &RawComponents, policy: &ScoringPolicy) -> CappedScore {
    if raw.uncapped_total() == 0.0 {
        return CappedScore {
            meeting_score: 0.0,
            total: 0.0,
        };
    }

    let ceiling = meeting_ceiling(raw, policy.meeting_cap_percent, policy.cap_basis);
    let meeting_score = raw.meeting_score_raw.min(ceiling);

    CappedScore {
        meeting_score,
        total: raw.core() + meeting_score,
    }
}
