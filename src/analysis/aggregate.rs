use crate::analysis::breakdown::build_member_breakdown;
use crate::analysis::formulas::ScoringPolicy;
use crate::analysis::normalize::equity_percents;
use crate::models::input::ScoringInput;
use crate::models::score::{EquityReport, RawComponents, ScoreBreakdown};
use std::collections::{BTreeMap, HashMap};

/// Per-member raw sums produced by one contribution source.
pub type PartialScores = HashMap<String, RawComponents>;

fn credit(
    partial: &mut PartialScores,
    input: &ScoringInput,
    member_id: &str,
    source: &str,
    amount: RawComponents,
) {
    if !input.is_active(member_id) {
        log::debug!("skipping {source} credit for non-active member {member_id}");
        return;
    }
    *partial.entry(member_id.to_string()).or_default() += amount;
}

pub fn score_features(input: &ScoringInput, policy: &ScoringPolicy) -> PartialScores {
    let mut partial = PartialScores::new();
    for feature in input.features() {
        if !policy.counts_feature(feature.status) {
            continue;
        }
        let w = &feature.weights;
        let base = policy.feature_base_score(
            w.impact_weight.as_f64(),
            w.difficulty_weight.as_f64(),
            w.business_value_weight.as_f64(),
        );
        for c in &feature.contributions {
            let amount = RawComponents {
                feature_score: base * c.contribution_percent.fraction(),
                ..Default::default()
            };
            credit(&mut partial, input, &c.member_id, "feature", amount);
        }
    }
    partial
}

pub fn score_bug_fixes(input: &ScoringInput, policy: &ScoringPolicy) -> PartialScores {
    let mut partial = PartialScores::new();
    for bug in input.bugs() {
        let amount = RawComponents {
            bug_score: policy.bug_score(bug.severity.as_f64(), bug.impact_weight.as_f64()),
            ..Default::default()
        };
        credit(&mut partial, input, &bug.resolved_by_id, "bug", amount);
    }
    partial
}

pub fn score_meetings(input: &ScoringInput, policy: &ScoringPolicy) -> PartialScores {
    let mut partial = PartialScores::new();
    for meeting in input.meetings() {
        for c in &meeting.contributions {
            let amount = RawComponents {
                meeting_score_raw: policy.meeting_score(
                    meeting.importance_weight.as_f64(),
                    c.contribution_level.as_f64(),
                ),
                ..Default::default()
            };
            credit(&mut partial, input, &c.member_id, "meeting", amount);
        }
    }
    partial
}

pub fn score_decisions(input: &ScoringInput, policy: &ScoringPolicy) -> PartialScores {
    let mut partial = PartialScores::new();
    for decision in input.decisions() {
        for c in &decision.contributions {
            let amount = RawComponents {
                decision_score: policy.decision_score(
                    decision.importance_weight.as_f64(),
                    c.influence_level.as_f64(),
                ),
                ..Default::default()
            };
            credit(&mut partial, input, &c.member_id, "decision", amount);
        }
    }
    partial
}

/// Per-key addition. Order of `parts` does not affect the result.
pub fn merge_partials(parts: impl IntoIterator<Item = PartialScores>) -> PartialScores {
    let mut merged = PartialScores::new();
    for part in parts {
        for (member_id, raw) in part {
            *merged.entry(member_id).or_default() += raw;
        }
    }
    merged
}

/// Scores every active member. Members with no contributions get an
/// all-zero breakdown.
pub fn compute_member_scores(
    input: &ScoringInput,
    policy: &ScoringPolicy,
) -> BTreeMap<String, ScoreBreakdown> {
    let merged = merge_partials([
        score_features(input, policy),
        score_bug_fixes(input, policy),
        score_meetings(input, policy),
        score_decisions(input, policy),
    ]);

    input
        .members()
        .iter()
        .map(|member| {
            let raw = merged.get(&member.id).copied().unwrap_or_default();
            let breakdown = build_member_breakdown(&raw, member.risk_multiplier, policy);
            (member.id.clone(), breakdown)
        })
        .collect()
}

/// Scores, equity percentages and the grand total in one pass.
pub fn compute_equity_report(input: &ScoringInput, policy: &ScoringPolicy) -> EquityReport {
    let scores = compute_member_scores(input, policy);
    let totals: BTreeMap<String, f64> = scores
        .iter()
        .map(|(id, b)| (id.clone(), b.total))
        .collect();
    let total_score = totals.values().sum();
    let equity_percents = equity_percents(&totals);

    EquityReport {
        scores,
        equity_percents,
        total_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::formulas::DEFAULT_POLICY;
    use crate::models::contribution::{
        BugFix, ContributionPercent, Decision, DecisionContribution, Feature,
        FeatureContribution, FeatureStatus, Meeting, MeetingContribution,
    };
    use crate::models::member::{ActiveMember, RiskMultiplier};
    use crate::models::weights::{
        BugImpactWeight, ContributionLevel, DecisionImportance, FeatureWeights, InfluenceLevel,
        MeetingImportance, Severity,
    };
    use proptest::prelude::*;

    fn member(id: &str, multiplier: f64) -> ActiveMember {
        ActiveMember::new(id, RiskMultiplier::new(multiplier).expect("multiplier"))
    }

    fn feature(id: &str, status: FeatureStatus, split: &[(&str, f64)]) -> Feature {
        Feature {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            weights: FeatureWeights::new(10, 5, 10).expect("weights"),
            status,
            weights_locked: status == FeatureStatus::Done,
            created_at: 0,
            completed_at: None,
            contributions: split
                .iter()
                .map(|(m, pct)| FeatureContribution {
                    member_id: m.to_string(),
                    contribution_percent: ContributionPercent::new(*pct).expect("percent"),
                })
                .collect(),
        }
    }

    fn bug(id: &str, severity: u8, impact: u8, resolver: &str) -> BugFix {
        BugFix {
            id: id.to_string(),
            title: None,
            severity: Severity::new(severity).expect("severity"),
            impact_weight: BugImpactWeight::new(impact).expect("impact"),
            resolved_by_id: resolver.to_string(),
            resolved_at: 0,
        }
    }

    fn meeting(id: &str, importance: u8, levels: &[(&str, u8)]) -> Meeting {
        Meeting {
            id: id.to_string(),
            topic: id.to_string(),
            importance_weight: MeetingImportance::new(importance).expect("importance"),
            held_at: 0,
            contributions: levels
                .iter()
                .map(|(m, level)| MeetingContribution {
                    member_id: m.to_string(),
                    contribution_level: ContributionLevel::new(*level).expect("level"),
                })
                .collect(),
        }
    }

    fn decision(id: &str, importance: u8, levels: &[(&str, u8)]) -> Decision {
        Decision {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            importance_weight: DecisionImportance::new(importance).expect("importance"),
            decided_at: 0,
            contributions: levels
                .iter()
                .map(|(m, level)| DecisionContribution {
                    member_id: m.to_string(),
                    influence_level: InfluenceLevel::new(*level).expect("level"),
                })
                .collect(),
        }
    }

    #[test]
    fn done_feature_split_sixty_forty() {
        let input = ScoringInput::new(
            vec![member("x", 1.0), member("y", 1.0)],
            vec![feature("f", FeatureStatus::Done, &[("x", 60.0), ("y", 40.0)])],
            vec![],
            vec![],
            vec![],
        )
        .expect("input");

        let scores = compute_member_scores(&input, &DEFAULT_POLICY);
        assert!((scores["x"].feature_score - 5.1).abs() < 1e-9);
        assert!((scores["y"].feature_score - 3.4).abs() < 1e-9);
        assert!((scores["x"].total - 5.1).abs() < 1e-9);
    }

    #[test]
    fn unfinished_features_follow_policy_flag() {
        let input = ScoringInput::new(
            vec![member("x", 1.0)],
            vec![
                feature("draft", FeatureStatus::Draft, &[("x", 100.0)]),
                feature("wip", FeatureStatus::InProgress, &[("x", 100.0)]),
            ],
            vec![],
            vec![],
            vec![],
        )
        .expect("input");

        let strict = compute_member_scores(&input, &DEFAULT_POLICY);
        assert_eq!(strict["x"].feature_score, 0.0);

        let lenient = ScoringPolicy {
            include_in_progress_features: true,
            ..DEFAULT_POLICY
        };
        let scores = compute_member_scores(&input, &lenient);
        assert!((scores["x"].feature_score - 8.5).abs() < 1e-9);
    }

    #[test]
    fn contributions_from_non_active_members_are_ignored() {
        let input = ScoringInput::new(
            vec![member("a", 1.0)],
            vec![feature("f", FeatureStatus::Done, &[("a", 50.0), ("gone", 50.0)])],
            vec![bug("b1", 5, 5, "gone")],
            vec![meeting("m1", 5, &[("gone", 5)])],
            vec![decision("d1", 10, &[("gone", 5), ("a", 1)])],
        )
        .expect("input");

        let scores = compute_member_scores(&input, &DEFAULT_POLICY);
        assert_eq!(scores.len(), 1);
        assert!(!scores.contains_key("gone"));
        assert!((scores["a"].feature_score - 4.75).abs() < 1e-9);
        assert_eq!(scores["a"].bug_score, 0.0);
        assert_eq!(scores["a"].decision_score, 20.0);
    }

    #[test]
    fn every_source_credits_its_own_component() {
        let input = ScoringInput::new(
            vec![member("a", 1.0), member("b", 1.0)],
            vec![],
            vec![bug("b1", 5, 5, "a"), bug("b2", 1, 1, "b")],
            vec![meeting("m1", 5, &[("a", 5), ("b", 1)])],
            vec![decision("d1", 10, &[("b", 5)])],
        )
        .expect("input");

        let scores = compute_member_scores(&input, &DEFAULT_POLICY);
        assert_eq!(scores["a"].bug_score, 50.0);
        assert_eq!(scores["a"].meeting_score_raw, 25.0);
        assert_eq!(scores["b"].bug_score, 2.0);
        assert_eq!(scores["b"].meeting_score_raw, 5.0);
        assert_eq!(scores["b"].decision_score, 100.0);
        assert!(scores["a"].meeting_score <= scores["a"].meeting_score_raw);
    }

    #[test]
    fn members_without_contributions_score_zero() {
        let input = ScoringInput::new(
            vec![member("idle", 2.0)],
            vec![],
            vec![],
            vec![],
            vec![],
        )
        .expect("input");

        let report = compute_equity_report(&input, &DEFAULT_POLICY);
        assert_eq!(report.scores["idle"], ScoreBreakdown::default());
        assert_eq!(report.equity_percents["idle"], 0.0);
        assert_eq!(report.total_score, 0.0);
    }

    #[test]
    fn risk_multiplier_only_affects_its_member() {
        let build = |mult: f64| {
            ScoringInput::new(
                vec![member("a", mult), member("b", 1.0)],
                vec![],
                vec![bug("b1", 3, 4, "a"), bug("b2", 2, 2, "b")],
                vec![meeting("m1", 4, &[("a", 3)])],
                vec![],
            )
            .expect("input")
        };

        let base = compute_member_scores(&build(1.0), &DEFAULT_POLICY);
        let doubled = compute_member_scores(&build(2.0), &DEFAULT_POLICY);
        assert_eq!(doubled["a"].total, base["a"].total * 2.0);
        assert_eq!(doubled["b"].total, base["b"].total);
    }

    #[test]
    fn merge_is_order_independent() {
        let input = ScoringInput::new(
            vec![member("a", 1.0), member("b", 1.5)],
            vec![feature("f", FeatureStatus::Done, &[("a", 25.0), ("b", 75.0)])],
            vec![bug("b1", 4, 2, "b")],
            vec![meeting("m1", 3, &[("a", 4), ("b", 2)])],
            vec![decision("d1", 7, &[("a", 3)])],
        )
        .expect("input");

        let forward = merge_partials([
            score_features(&input, &DEFAULT_POLICY),
            score_bug_fixes(&input, &DEFAULT_POLICY),
            score_meetings(&input, &DEFAULT_POLICY),
            score_decisions(&input, &DEFAULT_POLICY),
        ]);
        let backward = merge_partials([
            score_decisions(&input, &DEFAULT_POLICY),
            score_meetings(&input, &DEFAULT_POLICY),
            score_bug_fixes(&input, &DEFAULT_POLICY),
            score_features(&input, &DEFAULT_POLICY),
        ]);

        for id in ["a", "b"] {
            let (f, b) = (forward[id], backward[id]);
            assert!((f.feature_score - b.feature_score).abs() < 1e-12);
            assert!((f.bug_score - b.bug_score).abs() < 1e-12);
            assert!((f.meeting_score_raw - b.meeting_score_raw).abs() < 1e-12);
            assert!((f.decision_score - b.decision_score).abs() < 1e-12);
        }
    }

    #[test]
    fn report_totals_and_percents_line_up() {
        let input = ScoringInput::new(
            vec![member("a", 1.0), member("b", 1.0), member("c", 1.0)],
            vec![],
            vec![bug("b1", 5, 5, "a"), bug("b2", 5, 5, "a"), bug("b3", 5, 5, "a"), bug("b4", 5, 5, "b")],
            vec![],
            vec![],
        )
        .expect("input");

        let report = compute_equity_report(&input, &DEFAULT_POLICY);
        assert_eq!(report.total_score, 200.0);
        assert_eq!(report.equity_percents["a"], 75.0);
        assert_eq!(report.equity_percents["b"], 25.0);
        assert_eq!(report.equity_percents["c"], 0.0);
    }

    proptest! {
        #[test]
        fn record_order_does_not_change_scores(
            bugs in prop::collection::vec((1u8..=5, 1u8..=5, 0usize..3), 0..12),
            meetings in prop::collection::vec((1u8..=5, 1u8..=5, 0usize..3), 0..12),
        ) {
            let ids = ["a", "b", "c"];
            let bug_list: Vec<BugFix> = bugs
                .iter()
                .enumerate()
                .map(|(i, (sev, imp, who))| bug(&format!("b{i}"), *sev, *imp, ids[*who]))
                .collect();
            let meeting_list: Vec<Meeting> = meetings
                .iter()
                .enumerate()
                .map(|(i, (imp, lvl, who))| meeting(&format!("m{i}"), *imp, &[(ids[*who], *lvl)]))
                .collect();
            let members = || vec![member("a", 1.0), member("b", 2.0), member("c", 0.5)];

            let forward = ScoringInput::new(members(), vec![], bug_list.clone(), meeting_list.clone(), vec![])
                .expect("input");
            let reversed = ScoringInput::new(
                members(),
                vec![],
                bug_list.into_iter().rev().collect(),
                meeting_list.into_iter().rev().collect(),
                vec![],
            )
            .expect("input");

            let f = compute_member_scores(&forward, &DEFAULT_POLICY);
            let r = compute_member_scores(&reversed, &DEFAULT_POLICY);
            for id in ids {
                prop_assert!((f[id].total - r[id].total).abs() < 1e-9);
                prop_assert!((f[id].meeting_score - r[id].meeting_score).abs() < 1e-9);
            }
        }
    }
}
