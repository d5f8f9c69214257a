//! Feature lifecycle: status changes, weight edits, contribution splits and
//! weight votes.

use crate::analysis::weights::{ensure_weights_editable, resolve_votes, transition_status};
use crate::commands::{db, write_transaction};
use crate::error::{EquityError, Result};
use crate::models::contribution::{
    validate_feature, Feature, FeatureContribution, FeatureDetailsPatch, FeatureStatus,
};
use crate::models::input::validate_contribution_split;
use crate::models::member::MemberStatus;
use crate::models::weights::{FeatureWeights, FeatureWeightVote};
use rusqlite::Connection;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn require_feature(conn: &Connection, id: &str) -> Result<Feature> {
    db::load_feature(conn, id)?.ok_or_else(|| EquityError::not_found("feature", id))
}

/// Creates a feature with a fresh id. Its split must already total 100%.
pub fn add_feature(
    conn: &Connection,
    title: &str,
    description: Option<String>,
    weights: FeatureWeights,
    status: FeatureStatus,
    contributions: Vec<FeatureContribution>,
) -> Result<Feature> {
    let feature = Feature {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        description,
        weights,
        status,
        weights_locked: false,
        created_at: now(),
        completed_at: None,
        contributions,
    };
    validate_feature(&feature)?;

    db::insert_feature(conn, &feature)?;
    let stored = require_feature(conn, &feature.id)?;
    log::info!("added feature {} ({})", stored.id, stored.status.as_str());
    Ok(stored)
}

pub fn update_feature_details(
    conn: &Connection,
    id: &str,
    patch: FeatureDetailsPatch,
) -> Result<Feature> {
    let tx = write_transaction(conn)?;
    let mut feature = require_feature(&tx, id)?;
    patch.apply(&mut feature)?;

    db::update_feature_details(&tx, id, &feature.title, feature.description.as_deref())?;
    tx.commit()?;
    Ok(feature)
}

/// Deletes a feature with its split and votes. Snapshots already taken keep
/// their figures.
pub fn delete_feature(conn: &Connection, id: &str) -> Result<()> {
    if !db::delete_feature(conn, id)? {
        return Err(EquityError::not_found("feature", id));
    }
    log::info!("deleted feature {id}");
    Ok(())
}

pub fn set_feature_status(conn: &Connection, id: &str, status: FeatureStatus) -> Result<Feature> {
    let tx = write_transaction(conn)?;
    let mut feature = require_feature(&tx, id)?;
    let was_locked = feature.weights_locked;

    transition_status(&mut feature, status, now());
    db::update_feature_state(&tx, &feature)?;
    tx.commit()?;

    if feature.weights_locked && !was_locked {
        log::info!("feature {id} is done; weights locked");
    }
    Ok(feature)
}

pub fn set_feature_weights(conn: &Connection, id: &str, weights: FeatureWeights) -> Result<Feature> {
    let tx = write_transaction(conn)?;
    let mut feature = require_feature(&tx, id)?;
    ensure_weights_editable(&feature)?;

    feature.weights = weights;
    db::update_feature_state(&tx, &feature)?;
    tx.commit()?;
    Ok(feature)
}

/// Replaces the whole split. A non-empty split must total 100%.
pub fn set_feature_contributions(
    conn: &Connection,
    id: &str,
    contributions: Vec<FeatureContribution>,
) -> Result<Feature> {
    validate_contribution_split(id, &contributions)?;

    let tx = write_transaction(conn)?;
    let mut feature = require_feature(&tx, id)?;
    db::replace_feature_contributions(&tx, id, &contributions)?;
    tx.commit()?;

    feature.contributions = contributions;
    Ok(feature)
}

/// Records a member's proposed weights. Resubmitting replaces the earlier vote.
pub fn submit_weight_vote(
    conn: &Connection,
    feature_id: &str,
    member_id: &str,
    weights: FeatureWeights,
) -> Result<FeatureWeightVote> {
    let tx = write_transaction(conn)?;
    let feature = require_feature(&tx, feature_id)?;
    ensure_weights_editable(&feature)?;

    let member =
        db::load_member(&tx, member_id)?.ok_or_else(|| EquityError::not_found("member", member_id))?;
    if member.status != MemberStatus::Active {
        return Err(EquityError::InactiveMember(member.id));
    }

    let vote = FeatureWeightVote {
        feature_id: feature.id,
        member_id: member.id,
        weights,
        submitted_at: now(),
    };
    db::upsert_weight_vote(&tx, &vote)?;
    tx.commit()?;
    log::debug!("vote from {} recorded for feature {}", vote.member_id, vote.feature_id);
    Ok(vote)
}

/// Sets the feature's weights to the rounded mean of its votes.
pub fn apply_weight_votes(conn: &Connection, feature_id: &str) -> Result<Feature> {
    let tx = write_transaction(conn)?;
    let mut feature = require_feature(&tx, feature_id)?;
    let votes = db::list_weight_votes(&tx, feature_id)?;

    feature.weights = resolve_votes(&feature, &votes)?;
    db::update_feature_state(&tx, &feature)?;
    tx.commit()?;

    log::info!(
        "applied {} weight votes to feature {}: impact {}, difficulty {}, business value {}",
        votes.len(),
        feature.id,
        feature.weights.impact_weight.get(),
        feature.weights.difficulty_weight.get(),
        feature.weights.business_value_weight.get()
    );
    Ok(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contribution::ContributionPercent;
    use crate::models::input::ValidationError;
    use crate::models::member::{Member, RiskMultiplier};

    fn open() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        db::initialize_schema(&conn).expect("schema init");
        for (id, status) in [("a", MemberStatus::Active), ("b", MemberStatus::Active), ("c", MemberStatus::Inactive)] {
            db::insert_member(
                &conn,
                &Member {
                    id: id.to_string(),
                    name: id.to_string(),
                    email: format!("{id}@example.com"),
                    status,
                    risk_multiplier: RiskMultiplier::default(),
                    joined_at: 0,
                },
            )
            .expect("member");
        }
        db::insert_feature(
            &conn,
            &Feature {
                id: "f1".to_string(),
                title: "Onboarding".to_string(),
                description: None,
                weights: FeatureWeights::new(1, 1, 1).expect("weights"),
                status: FeatureStatus::Draft,
                weights_locked: false,
                created_at: 0,
                completed_at: None,
                contributions: vec![],
            },
        )
        .expect("feature");
        conn
    }

    fn weights(i: u8, d: u8, b: u8) -> FeatureWeights {
        FeatureWeights::new(i, d, b).expect("weights")
    }

    #[test]
    fn votes_average_into_feature_weights() {
        let conn = open();
        submit_weight_vote(&conn, "f1", "a", weights(10, 5, 10)).expect("vote a");
        submit_weight_vote(&conn, "f1", "b", weights(8, 3, 6)).expect("vote b");

        let feature = apply_weight_votes(&conn, "f1").expect("apply");
        assert_eq!(feature.weights, weights(9, 4, 8));
        let stored = db::load_feature(&conn, "f1").expect("load").expect("exists");
        assert_eq!(stored.weights, weights(9, 4, 8));
    }

    #[test]
    fn applying_without_votes_fails() {
        let conn = open();
        let err = apply_weight_votes(&conn, "f1").unwrap_err();
        assert!(matches!(err, EquityError::NoVotes(id) if id == "f1"));
    }

    #[test]
    fn inactive_and_unknown_members_cannot_vote() {
        let conn = open();
        let err = submit_weight_vote(&conn, "f1", "c", weights(5, 3, 5)).unwrap_err();
        assert!(matches!(err, EquityError::InactiveMember(id) if id == "c"));
        let err = submit_weight_vote(&conn, "f1", "ghost", weights(5, 3, 5)).unwrap_err();
        assert!(matches!(err, EquityError::NotFound { kind: "member", .. }));
    }

    #[test]
    fn done_locks_weights_and_votes() {
        let conn = open();
        submit_weight_vote(&conn, "f1", "a", weights(6, 2, 6)).expect("vote");
        let done = set_feature_status(&conn, "f1", FeatureStatus::Done).expect("done");
        assert!(done.weights_locked);
        assert!(done.completed_at.is_some());

        assert!(matches!(
            set_feature_weights(&conn, "f1", weights(2, 2, 2)).unwrap_err(),
            EquityError::WeightsLocked(_)
        ));
        assert!(matches!(
            submit_weight_vote(&conn, "f1", "b", weights(2, 2, 2)).unwrap_err(),
            EquityError::WeightsLocked(_)
        ));
        assert!(matches!(
            apply_weight_votes(&conn, "f1").unwrap_err(),
            EquityError::WeightsLocked(_)
        ));

        let reopened = set_feature_status(&conn, "f1", FeatureStatus::InProgress).expect("reopen");
        assert!(reopened.weights_locked);
        assert_eq!(reopened.completed_at, done.completed_at);
    }

    #[test]
    fn contribution_split_must_total_one_hundred() {
        let conn = open();
        let split = |a: f64, b: f64| {
            vec![
                FeatureContribution {
                    member_id: "a".to_string(),
                    contribution_percent: ContributionPercent::new(a).expect("pct"),
                },
                FeatureContribution {
                    member_id: "b".to_string(),
                    contribution_percent: ContributionPercent::new(b).expect("pct"),
                },
            ]
        };

        let err = set_feature_contributions(&conn, "f1", split(60.0, 30.0)).unwrap_err();
        assert!(matches!(
            err,
            EquityError::Validation(ValidationError::ContributionSum { .. })
        ));

        set_feature_contributions(&conn, "f1", split(75.0, 25.0)).expect("valid split");
        let stored = db::load_feature(&conn, "f1").expect("load").expect("exists");
        assert_eq!(stored.contributions, split(75.0, 25.0));
    }

    #[test]
    fn feature_stored_as_done_rejects_weight_edits() {
        let conn = open();
        db::insert_feature(
            &conn,
            &Feature {
                id: "legacy".to_string(),
                title: "Imported".to_string(),
                description: None,
                weights: weights(4, 2, 4),
                status: FeatureStatus::Done,
                weights_locked: false,
                created_at: 0,
                completed_at: None,
                contributions: vec![],
            },
        )
        .expect("feature");

        assert!(matches!(
            set_feature_weights(&conn, "legacy", weights(9, 5, 9)).unwrap_err(),
            EquityError::WeightsLocked(id) if id == "legacy"
        ));
        assert!(matches!(
            submit_weight_vote(&conn, "legacy", "a", weights(9, 5, 9)).unwrap_err(),
            EquityError::WeightsLocked(_)
        ));
        assert!(db::list_weight_votes(&conn, "legacy").expect("votes").is_empty());
        let stored = db::load_feature(&conn, "legacy").expect("load").expect("exists");
        assert_eq!(stored.weights, weights(4, 2, 4));
    }

    #[test]
    fn added_feature_gets_an_id_and_valid_split() {
        let conn = open();
        let split = vec![FeatureContribution {
            member_id: "a".to_string(),
            contribution_percent: ContributionPercent::new(90.0).expect("pct"),
        }];
        let err = add_feature(&conn, "Search", None, weights(5, 3, 5), FeatureStatus::Draft, split)
            .unwrap_err();
        assert!(matches!(
            err,
            EquityError::Validation(ValidationError::ContributionSum { .. })
        ));
        let err = add_feature(&conn, " ", None, weights(5, 3, 5), FeatureStatus::Draft, vec![])
            .unwrap_err();
        assert!(matches!(err, EquityError::Validation(ValidationError::EmptyField("title"))));

        let done = add_feature(&conn, "Search", None, weights(5, 3, 5), FeatureStatus::Done, vec![])
            .expect("added");
        assert!(!done.id.is_empty());
        assert!(done.weights_locked);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn details_edit_and_delete() {
        let conn = open();
        let edited = update_feature_details(
            &conn,
            "f1",
            FeatureDetailsPatch {
                title: Some("Signup".to_string()),
                description: Some(Some("Email first".to_string())),
            },
        )
        .expect("edit");
        assert_eq!(edited.title, "Signup");
        let stored = db::load_feature(&conn, "f1").expect("load").expect("exists");
        assert_eq!(stored.description.as_deref(), Some("Email first"));

        submit_weight_vote(&conn, "f1", "a", weights(3, 3, 3)).expect("vote");
        delete_feature(&conn, "f1").expect("delete");
        assert!(db::load_feature(&conn, "f1").expect("load").is_none());
        assert!(db::list_weight_votes(&conn, "f1").expect("votes").is_empty());
        assert!(matches!(
            delete_feature(&conn, "f1").unwrap_err(),
            EquityError::NotFound { kind: "feature", .. }
        ));
    }

    #[test]
    fn missing_feature_is_not_found() {
        let conn = open();
        let err = set_feature_status(&conn, "nope", FeatureStatus::Done).unwrap_err();
        assert!(matches!(err, EquityError::NotFound { kind: "feature", .. }));
    }
}
