use crate::models::input::ValidationError;
use crate::models::score::EquityReport;
use crate::models::snapshot::{EquitySnapshot, SnapshotEntry};

/// One entry per scored member, ordered by member id.
pub fn build_snapshot_entries(report: &EquityReport) -> Vec<SnapshotEntry> {
    report
        .scores
        .iter()
        .map(|(member_id, s)| SnapshotEntry {
            member_id: member_id.clone(),
            equity_percent: report.equity_percents.get(member_id).copied().unwrap_or(0.0),
            total_score: s.total,
            feature_score: s.feature_score,
            bug_score: s.bug_score,
            meeting_score: s.meeting_score,
            decision_score: s.decision_score,
        })
        .collect()
}

pub fn new_snapshot(
    id: String,
    period_label: &str,
    report: &EquityReport,
    created_at: i64,
) -> Result<EquitySnapshot, ValidationError> {
    let period_label = period_label.trim();
    if period_label.is_empty() {
        return Err(ValidationError::EmptyPeriodLabel);
    }

    Ok(EquitySnapshot {
        id,
        period_label: period_label.to_string(),
        created_at,
        entries: build_snapshot_entries(report),
    })
}

/// CSV export of a snapshot, one row per entry.
pub fn snapshot_csv(snapshot: &EquitySnapshot) -> String {
    let mut out = String::from(
        "period,member_id,equity_percent,total_score,feature_score,bug_score,meeting_score,decision_score\n",
    );
    for e in &snapshot.entries {
        out.push_str(&format!(
            "{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}\n",
            csv_field(&snapshot.period_label),
            csv_field(&e.member_id),
            e.equity_percent,
            e.total_score,
            e.feature_score,
            e.bug_score,
            e.meeting_score,
            e.decision_score,
        ));
    }
    out
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::score::ScoreBreakdown;

    fn report() -> EquityReport {
        let mut report = EquityReport::default();
        report.scores.insert(
            "b".to_string(),
            ScoreBreakdown {
                bug_score: 100.0,
                total: 100.0,
                ..Default::default()
            },
        );
        report.scores.insert(
            "a".to_string(),
            ScoreBreakdown {
                feature_score: 280.0,
                meeting_score: 20.0,
                meeting_score_raw: 50.0,
                total: 300.0,
                ..Default::default()
            },
        );
        report.equity_percents.insert("a".to_string(), 75.0);
        report.equity_percents.insert("b".to_string(), 25.0);
        report.total_score = 400.0;
        report
    }

    #[test]
    fn entries_capture_every_component() {
        let entries = build_snapshot_entries(&report());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].member_id, "a");
        assert_eq!(entries[0].equity_percent, 75.0);
        assert_eq!(entries[0].meeting_score, 20.0);
        assert_eq!(entries[0].total_score, 300.0);
        assert_eq!(entries[1].bug_score, 100.0);
    }

    #[test]
    fn blank_label_is_rejected() {
        let err = new_snapshot("s1".to_string(), "   ", &report(), 0).unwrap_err();
        assert_eq!(err, ValidationError::EmptyPeriodLabel);

        let snap = new_snapshot("s1".to_string(), " 2025-Q1 ", &report(), 42).expect("snapshot");
        assert_eq!(snap.period_label, "2025-Q1");
        assert_eq!(snap.created_at, 42);
    }

    #[test]
    fn csv_has_header_and_quoted_labels() {
        let snap = new_snapshot("s1".to_string(), "Q1, final", &report(), 0).expect("snapshot");
        let csv = snapshot_csv(&snap);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("period,member_id"));
        assert_eq!(
            lines[1],
            "\"Q1, final\",a,75.00,300.00,280.00,0.00,20.00,0.00"
        );
    }
}
