use crate::analysis::aggregate::compute_equity_report;
use crate::analysis::formulas::ScoringPolicy;
use crate::analysis::snapshot::{new_snapshot, snapshot_csv};
use crate::commands::{db, open_workspace, settings, write_transaction};
use crate::error::{EquityError, Result};
use crate::models::contribution::FeatureStatus;
use crate::models::input::ScoringInput;
use crate::models::score::EquityReport;
use crate::models::snapshot::EquitySnapshot;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Reads everything the aggregator needs. Run it inside a transaction so
/// the collections agree with each other.
pub fn load_scoring_input(conn: &Connection, policy: &ScoringPolicy) -> Result<ScoringInput> {
    let members = db::list_active_members(conn)?;
    let statuses: &[FeatureStatus] = if policy.include_in_progress_features {
        &[FeatureStatus::Done, FeatureStatus::InProgress]
    } else {
        &[FeatureStatus::Done]
    };
    let features = db::list_features(conn, Some(statuses))?;
    let bugs = db::list_bug_fixes(conn)?;
    let meetings = db::list_meetings(conn)?;
    let decisions = db::list_decisions(conn)?;

    Ok(ScoringInput::new(members, features, bugs, meetings, decisions)?)
}

pub fn compute_all_scores(conn: &Connection, policy: &ScoringPolicy) -> Result<EquityReport> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let input = load_scoring_input(&tx, policy)?;
    tx.commit()?;

    let report = compute_equity_report(&input, policy);
    log::debug!(
        "scored {} members, grand total {:.2}",
        report.scores.len(),
        report.total_score
    );
    Ok(report)
}

pub fn take_snapshot(
    conn: &Connection,
    policy: &ScoringPolicy,
    period_label: &str,
) -> Result<EquitySnapshot> {
    take_snapshot_at(conn, policy, period_label, chrono::Utc::now().timestamp())
}

/// Computes and persists in one write transaction, so the recorded numbers
/// match a single state of the contribution tables.
pub fn take_snapshot_at(
    conn: &Connection,
    policy: &ScoringPolicy,
    period_label: &str,
    created_at: i64,
) -> Result<EquitySnapshot> {
    let tx = write_transaction(conn)?;
    let input = load_scoring_input(&tx, policy)?;
    let report = compute_equity_report(&input, policy);

    let snapshot = new_snapshot(
        uuid::Uuid::new_v4().to_string(),
        period_label,
        &report,
        created_at,
    )?;
    db::insert_snapshot(&tx, &snapshot)?;
    tx.commit()?;

    log::info!(
        "recorded equity snapshot {} ({}) with {} entries",
        snapshot.id,
        snapshot.period_label,
        snapshot.entries.len()
    );
    Ok(snapshot)
}

pub fn list_snapshots(conn: &Connection) -> Result<Vec<EquitySnapshot>> {
    Ok(db::list_snapshots(conn)?)
}

pub fn get_snapshot(conn: &Connection, id: &str) -> Result<EquitySnapshot> {
    db::load_snapshot(conn, id)?.ok_or_else(|| EquityError::not_found("snapshot", id))
}

pub fn export_snapshot_csv(conn: &Connection, id: &str) -> Result<String> {
    let snapshot = get_snapshot(conn, id)?;
    Ok(snapshot_csv(&snapshot))
}

/// Scores a workspace with its saved settings.
pub fn compute_workspace_scores(workspace_path: &str) -> Result<EquityReport> {
    let policy = settings::load_scoring_policy(workspace_path)?;
    let conn = open_workspace(workspace_path)?;
    compute_all_scores(&conn, &policy)
}

pub fn snapshot_workspace(workspace_path: &str, period_label: &str) -> Result<EquitySnapshot> {
    let policy = settings::load_scoring_policy(workspace_path)?;
    let conn = open_workspace(workspace_path)?;
    take_snapshot(&conn, &policy, period_label)
}
