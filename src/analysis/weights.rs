use crate::error::{EquityError, Result};
use crate::models::contribution::{Feature, FeatureStatus};
use crate::models::weights::{
    BusinessValueWeight, DifficultyWeight, FeatureWeights, FeatureWeightVote, ImpactWeight,
};

/// Moves a feature to `status`. Reaching `done` locks the weights and stamps
/// `completed_at` the first time; nothing ever clears the lock.
pub fn transition_status(feature: &mut Feature, status: FeatureStatus, now: i64) {
    if status == FeatureStatus::Done {
        feature.weights_locked = true;
        feature.completed_at.get_or_insert(now);
    }
    feature.status = status;
}

/// A `done` feature counts as locked even if its flag was never set.
pub fn ensure_weights_editable(feature: &Feature) -> Result<()> {
    if feature.weights_locked || feature.status == FeatureStatus::Done {
        return Err(EquityError::WeightsLocked(feature.id.clone()));
    }
    Ok(())
}

fn mean_rounded(values: impl Iterator<Item = u8>, n: usize) -> i64 {
    let sum: u32 = values.map(u32::from).sum();
    (f64::from(sum) / n as f64).round() as i64
}

/// Per-weight arithmetic mean, rounded to the nearest integer and clamped to
/// each weight's range. `None` when there are no votes.
pub fn average_votes(votes: &[FeatureWeightVote]) -> Option<FeatureWeights> {
    if votes.is_empty() {
        return None;
    }
    let n = votes.len();
    let impact = mean_rounded(votes.iter().map(|v| v.weights.impact_weight.get()), n);
    let difficulty = mean_rounded(votes.iter().map(|v| v.weights.difficulty_weight.get()), n);
    let business = mean_rounded(votes.iter().map(|v| v.weights.business_value_weight.get()), n);

    Some(FeatureWeights {
        impact_weight: ImpactWeight::clamped(impact),
        difficulty_weight: DifficultyWeight::clamped(difficulty),
        business_value_weight: BusinessValueWeight::clamped(business),
    })
}

/// Weights the feature should adopt from its votes. Votes cast for other
/// features are ignored.
pub fn resolve_votes(feature: &Feature, votes: &[FeatureWeightVote]) -> Result<FeatureWeights> {
    ensure_weights_editable(feature)?;

    let relevant: Vec<FeatureWeightVote> = votes
        .iter()
        .filter(|v| v.feature_id == feature.id)
        .cloned()
        .collect();

    average_votes(&relevant).ok_or_else(|| EquityError::NoVotes(feature.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(locked: bool) -> Feature {
        Feature {
            id: "f1".to_string(),
            title: "Billing".to_string(),
            description: None,
            weights: FeatureWeights::new(1, 1, 1).expect("weights"),
            status: FeatureStatus::InProgress,
            weights_locked: locked,
            created_at: 0,
            completed_at: None,
            contributions: vec![],
        }
    }

    fn vote(member: &str, impact: u8, difficulty: u8, business: u8) -> FeatureWeightVote {
        FeatureWeightVote {
            feature_id: "f1".to_string(),
            member_id: member.to_string(),
            weights: FeatureWeights::new(impact, difficulty, business).expect("weights"),
            submitted_at: 0,
        }
    }

    #[test]
    fn averages_and_rounds_votes() {
        let weights = resolve_votes(&feature(false), &[vote("a", 10, 5, 10), vote("b", 8, 3, 6)])
            .expect("resolved");
        assert_eq!(weights, FeatureWeights::new(9, 4, 8).expect("weights"));
    }

    #[test]
    fn half_means_round_up() {
        let weights = average_votes(&[vote("a", 1, 1, 2), vote("b", 2, 2, 3)]).expect("votes");
        assert_eq!(weights, FeatureWeights::new(2, 2, 3).expect("weights"));
    }

    #[test]
    fn locked_feature_rejects_votes() {
        let err = resolve_votes(&feature(true), &[vote("a", 5, 3, 5)]).unwrap_err();
        assert!(matches!(err, EquityError::WeightsLocked(id) if id == "f1"));
    }

    #[test]
    fn done_status_is_locked_without_the_flag() {
        let mut f = feature(false);
        f.status = FeatureStatus::Done;
        assert!(matches!(
            ensure_weights_editable(&f).unwrap_err(),
            EquityError::WeightsLocked(id) if id == "f1"
        ));
        assert!(resolve_votes(&f, &[vote("a", 5, 3, 5)]).is_err());
    }

    #[test]
    fn empty_vote_set_is_an_error() {
        let mut other = vote("a", 5, 3, 5);
        other.feature_id = "f2".to_string();
        let err = resolve_votes(&feature(false), &[other]).unwrap_err();
        assert!(matches!(err, EquityError::NoVotes(id) if id == "f1"));
    }

    #[test]
    fn done_transition_locks_for_good() {
        let mut f = feature(false);
        transition_status(&mut f, FeatureStatus::Done, 1_700_000_000);
        assert!(f.weights_locked);
        assert_eq!(f.completed_at, Some(1_700_000_000));

        transition_status(&mut f, FeatureStatus::InProgress, 1_700_000_100);
        assert!(f.weights_locked);
        assert_eq!(f.status, FeatureStatus::InProgress);
        assert!(ensure_weights_editable(&f).is_err());

        transition_status(&mut f, FeatureStatus::Done, 1_700_000_200);
        assert_eq!(f.completed_at, Some(1_700_000_000));
    }
}
