use crate::analysis::weights::transition_status;
use crate::models::contribution::{
    BugFix, ContributionPercent, Decision, DecisionContribution, Feature, FeatureContribution,
    FeatureStatus, Meeting, MeetingContribution,
};
use crate::models::input::ValidationError;
use crate::models::member::{ActiveMember, Member, MemberStatus, RiskMultiplier};
use crate::models::snapshot::{EquitySnapshot, SnapshotEntry};
use crate::models::weights::{Bounded, FeatureWeights, FeatureWeightVote};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result, Row, ToSql};
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 4;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 3 {
        apply_migration_3(conn)?;
        version = 3;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 4 {
        apply_migration_4(conn)?;
        version = 4;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("database schema version {version} is newer than {DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK(status IN ('active', 'inactive')) DEFAULT 'active',
            risk_multiplier REAL NOT NULL DEFAULT 1 CHECK(risk_multiplier > 0),
            joined_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS features (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            impact_weight INTEGER NOT NULL CHECK(impact_weight BETWEEN 1 AND 10),
            difficulty_weight INTEGER NOT NULL CHECK(difficulty_weight BETWEEN 1 AND 5),
            business_value_weight INTEGER NOT NULL CHECK(business_value_weight BETWEEN 1 AND 10),
            status TEXT NOT NULL CHECK(status IN ('draft', 'in_progress', 'done')) DEFAULT 'draft',
            weights_locked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS feature_contributions (
            feature_id TEXT NOT NULL REFERENCES features(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL,
            contribution_percent REAL NOT NULL CHECK(contribution_percent BETWEEN 0 AND 100),
            PRIMARY KEY (feature_id, member_id)
        );

        CREATE TABLE IF NOT EXISTS feature_weight_votes (
            feature_id TEXT NOT NULL REFERENCES features(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL,
            impact_weight INTEGER NOT NULL CHECK(impact_weight BETWEEN 1 AND 10),
            difficulty_weight INTEGER NOT NULL CHECK(difficulty_weight BETWEEN 1 AND 5),
            business_value_weight INTEGER NOT NULL CHECK(business_value_weight BETWEEN 1 AND 10),
            submitted_at INTEGER NOT NULL,
            PRIMARY KEY (feature_id, member_id)
        );

        CREATE TABLE IF NOT EXISTS bug_fixes (
            id TEXT PRIMARY KEY,
            title TEXT,
            severity INTEGER NOT NULL CHECK(severity BETWEEN 1 AND 5),
            impact_weight INTEGER NOT NULL CHECK(impact_weight BETWEEN 1 AND 5),
            resolved_by_id TEXT NOT NULL,
            resolved_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meetings (
            id TEXT PRIMARY KEY,
            topic TEXT NOT NULL,
            importance_weight INTEGER NOT NULL CHECK(importance_weight BETWEEN 1 AND 5),
            held_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meeting_contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meeting_id TEXT NOT NULL REFERENCES meetings(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL,
            contribution_level INTEGER NOT NULL CHECK(contribution_level BETWEEN 1 AND 5)
        );

        CREATE TABLE IF NOT EXISTS decisions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            importance_weight INTEGER NOT NULL CHECK(importance_weight BETWEEN 1 AND 10),
            decided_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS decision_contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            decision_id TEXT NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL,
            influence_level INTEGER NOT NULL CHECK(influence_level BETWEEN 1 AND 5)
        );

        CREATE TABLE IF NOT EXISTS equity_snapshots (
            id TEXT PRIMARY KEY,
            period_label TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshot_entries (
            snapshot_id TEXT NOT NULL REFERENCES equity_snapshots(id),
            member_id TEXT NOT NULL,
            equity_percent REAL NOT NULL,
            total_score REAL NOT NULL,
            feature_score REAL NOT NULL,
            bug_score REAL NOT NULL,
            meeting_score REAL NOT NULL,
            decision_score REAL NOT NULL,
            PRIMARY KEY (snapshot_id, member_id)
        );
        ",
    )
}

/// Snapshots are a ledger: the storage layer refuses to rewrite them.
fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TRIGGER IF NOT EXISTS equity_snapshots_no_update
        BEFORE UPDATE ON equity_snapshots
        BEGIN SELECT RAISE(ABORT, 'equity snapshots are immutable'); END;

        CREATE TRIGGER IF NOT EXISTS equity_snapshots_no_delete
        BEFORE DELETE ON equity_snapshots
        BEGIN SELECT RAISE(ABORT, 'equity snapshots are immutable'); END;

        CREATE TRIGGER IF NOT EXISTS snapshot_entries_no_update
        BEFORE UPDATE ON snapshot_entries
        BEGIN SELECT RAISE(ABORT, 'equity snapshots are immutable'); END;

        CREATE TRIGGER IF NOT EXISTS snapshot_entries_no_delete
        BEFORE DELETE ON snapshot_entries
        BEGIN SELECT RAISE(ABORT, 'equity snapshots are immutable'); END;
        ",
    )
}

fn apply_migration_3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_members_status ON members(status);
        CREATE INDEX IF NOT EXISTS idx_features_status ON features(status);
        CREATE INDEX IF NOT EXISTS idx_meeting_contributions_meeting ON meeting_contributions(meeting_id);
        CREATE INDEX IF NOT EXISTS idx_decision_contributions_decision ON decision_contributions(decision_id);
        CREATE INDEX IF NOT EXISTS idx_equity_snapshots_created_at ON equity_snapshots(created_at);
        ",
    )
}

fn apply_migration_4(conn: &Connection) -> Result<()> {
    conn.execute_batch("ALTER TABLE decisions ADD COLUMN description TEXT;")
}

/// Opens `<workspace>/.equityengine/state.db`. The directory must exist.
pub fn get_db_connection(workspace_path: &str) -> Result<Connection> {
    let db_path = Path::new(workspace_path).join(super::STATE_DIR).join("state.db");
    let conn = Connection::open(db_path)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

// Column conversions for the validated model types.

fn invalid(err: ValidationError) -> FromSqlError {
    FromSqlError::Other(Box::new(err))
}

impl<const MIN: u8, const MAX: u8> FromSql for Bounded<MIN, MAX> {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Bounded::from_i64(i64::column_result(value)?).map_err(invalid)
    }
}

impl<const MIN: u8, const MAX: u8> ToSql for Bounded<MIN, MAX> {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.get())))
    }
}

impl FromSql for RiskMultiplier {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        RiskMultiplier::new(f64::column_result(value)?).map_err(invalid)
    }
}

impl ToSql for RiskMultiplier {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.get()))
    }
}

impl FromSql for ContributionPercent {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        ContributionPercent::new(f64::column_result(value)?).map_err(invalid)
    }
}

impl ToSql for ContributionPercent {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.get()))
    }
}

impl FromSql for MemberStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        MemberStatus::parse(raw).ok_or_else(|| invalid(ValidationError::UnknownStatus(raw.to_string())))
    }
}

impl ToSql for MemberStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FeatureStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        FeatureStatus::parse(raw).ok_or_else(|| invalid(ValidationError::UnknownStatus(raw.to_string())))
    }
}

impl ToSql for FeatureStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

// Members

pub fn insert_member(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        "INSERT INTO members (id, name, email, status, risk_multiplier, joined_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            member.id,
            member.name,
            member.email,
            member.status,
            member.risk_multiplier,
            member.joined_at,
        ],
    )?;
    Ok(())
}

fn member_from_row(row: &Row<'_>) -> Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        status: row.get(3)?,
        risk_multiplier: row.get(4)?,
        joined_at: row.get(5)?,
    })
}

pub fn load_member(conn: &Connection, id: &str) -> Result<Option<Member>> {
    conn.query_row(
        "SELECT id, name, email, status, risk_multiplier, joined_at FROM members WHERE id = ?1",
        params![id],
        member_from_row,
    )
    .optional()
}

pub fn list_members(conn: &Connection) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, status, risk_multiplier, joined_at FROM members ORDER BY joined_at ASC, id ASC",
    )?;
    let members = stmt.query_map([], member_from_row)?.collect();
    members
}

pub fn list_active_members(conn: &Connection) -> Result<Vec<ActiveMember>> {
    let mut stmt = conn.prepare(
        "SELECT id, risk_multiplier FROM members WHERE status = 'active' ORDER BY id ASC",
    )?;
    let members = stmt
        .query_map([], |row| {
            Ok(ActiveMember {
                id: row.get(0)?,
                risk_multiplier: row.get(1)?,
            })
        })?
        .collect();
    members
}

/// Returns false when no member has `id`.
pub fn set_member_status(conn: &Connection, id: &str, status: MemberStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE members SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    Ok(changed > 0)
}

/// Returns false when no member has `id`.
pub fn set_member_risk_multiplier(
    conn: &Connection,
    id: &str,
    risk_multiplier: RiskMultiplier,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE members SET risk_multiplier = ?2 WHERE id = ?1",
        params![id, risk_multiplier],
    )?;
    Ok(changed > 0)
}

// Features

/// Stores a new feature. A `done` feature is stored locked and stamped
/// whatever the caller's lock flag says.
pub fn insert_feature(conn: &Connection, feature: &Feature) -> Result<()> {
    let mut stored = feature.clone();
    transition_status(&mut stored, feature.status, chrono::Utc::now().timestamp());

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO features (id, title, description, impact_weight, difficulty_weight, business_value_weight, status, weights_locked, created_at, completed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            stored.id,
            stored.title,
            stored.description,
            stored.weights.impact_weight,
            stored.weights.difficulty_weight,
            stored.weights.business_value_weight,
            stored.status,
            stored.weights_locked,
            stored.created_at,
            stored.completed_at,
        ],
    )?;
    write_feature_contributions(&tx, &stored.id, &stored.contributions)?;
    tx.commit()
}

/// Persists status, lock and weights. The lock column only ever moves to 1,
/// and a `done` row is always locked.
pub fn update_feature_state(conn: &Connection, feature: &Feature) -> Result<()> {
    conn.execute(
        "UPDATE features SET status = ?2, weights_locked = MAX(weights_locked, ?3, ?2 = 'done'), completed_at = ?4, impact_weight = ?5, difficulty_weight = ?6, business_value_weight = ?7 WHERE id = ?1",
        params![
            feature.id,
            feature.status,
            feature.weights_locked,
            feature.completed_at,
            feature.weights.impact_weight,
            feature.weights.difficulty_weight,
            feature.weights.business_value_weight,
        ],
    )?;
    Ok(())
}

pub fn update_feature_details(
    conn: &Connection,
    id: &str,
    title: &str,
    description: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE features SET title = ?2, description = ?3 WHERE id = ?1",
        params![id, title, description],
    )?;
    Ok(changed > 0)
}

/// Removes the feature with its contributions and votes.
pub fn delete_feature(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM features WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Swaps the whole split. The caller owns the transaction.
pub fn replace_feature_contributions(
    conn: &Connection,
    feature_id: &str,
    contributions: &[FeatureContribution],
) -> Result<()> {
    conn.execute(
        "DELETE FROM feature_contributions WHERE feature_id = ?1",
        params![feature_id],
    )?;
    write_feature_contributions(conn, feature_id, contributions)
}

fn write_feature_contributions(
    conn: &Connection,
    feature_id: &str,
    contributions: &[FeatureContribution],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO feature_contributions (feature_id, member_id, contribution_percent) VALUES (?1, ?2, ?3)",
    )?;
    for c in contributions {
        stmt.execute(params![feature_id, c.member_id, c.contribution_percent])?;
    }
    Ok(())
}

fn feature_contributions(conn: &Connection, feature_id: &str) -> Result<Vec<FeatureContribution>> {
    let mut stmt = conn.prepare_cached(
        "SELECT member_id, contribution_percent FROM feature_contributions WHERE feature_id = ?1 ORDER BY member_id ASC",
    )?;
    let rows = stmt
        .query_map(params![feature_id], |row| {
            Ok(FeatureContribution {
                member_id: row.get(0)?,
                contribution_percent: row.get(1)?,
            })
        })?
        .collect();
    rows
}

const FEATURE_COLUMNS: &str = "id, title, description, impact_weight, difficulty_weight, business_value_weight, status, weights_locked, created_at, completed_at";

fn feature_from_row(row: &Row<'_>) -> Result<Feature> {
    Ok(Feature {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        weights: FeatureWeights {
            impact_weight: row.get(3)?,
            difficulty_weight: row.get(4)?,
            business_value_weight: row.get(5)?,
        },
        status: row.get(6)?,
        weights_locked: row.get(7)?,
        created_at: row.get(8)?,
        completed_at: row.get(9)?,
        contributions: Vec::new(),
    })
}

pub fn load_feature(conn: &Connection, id: &str) -> Result<Option<Feature>> {
    let feature = conn
        .query_row(
            &format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?1"),
            params![id],
            feature_from_row,
        )
        .optional()?;

    match feature {
        Some(mut feature) => {
            feature.contributions = feature_contributions(conn, &feature.id)?;
            Ok(Some(feature))
        }
        None => Ok(None),
    }
}

/// All features with contributions, optionally limited to some statuses.
pub fn list_features(conn: &Connection, statuses: Option<&[FeatureStatus]>) -> Result<Vec<Feature>> {
    let mut sql = format!("SELECT {FEATURE_COLUMNS} FROM features");
    if let Some(statuses) = statuses {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        sql.push_str(&format!(" WHERE status IN ({placeholders})"));
    }
    sql.push_str(" ORDER BY created_at DESC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let mut features: Vec<Feature> = stmt
        .query_map(params_from_iter(statuses.unwrap_or(&[])), feature_from_row)?
        .collect::<Result<_>>()?;

    for feature in &mut features {
        feature.contributions = feature_contributions(conn, &feature.id)?;
    }
    Ok(features)
}

// Weight votes

pub fn upsert_weight_vote(conn: &Connection, vote: &FeatureWeightVote) -> Result<()> {
    conn.execute(
        "
        INSERT INTO feature_weight_votes (feature_id, member_id, impact_weight, difficulty_weight, business_value_weight, submitted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(feature_id, member_id) DO UPDATE SET
            impact_weight = excluded.impact_weight,
            difficulty_weight = excluded.difficulty_weight,
            business_value_weight = excluded.business_value_weight,
            submitted_at = excluded.submitted_at
        ",
        params![
            vote.feature_id,
            vote.member_id,
            vote.weights.impact_weight,
            vote.weights.difficulty_weight,
            vote.weights.business_value_weight,
            vote.submitted_at,
        ],
    )?;
    Ok(())
}

pub fn list_weight_votes(conn: &Connection, feature_id: &str) -> Result<Vec<FeatureWeightVote>> {
    let mut stmt = conn.prepare(
        "SELECT feature_id, member_id, impact_weight, difficulty_weight, business_value_weight, submitted_at FROM feature_weight_votes WHERE feature_id = ?1 ORDER BY member_id ASC",
    )?;
    let votes = stmt
        .query_map(params![feature_id], |row| {
            Ok(FeatureWeightVote {
                feature_id: row.get(0)?,
                member_id: row.get(1)?,
                weights: FeatureWeights {
                    impact_weight: row.get(2)?,
                    difficulty_weight: row.get(3)?,
                    business_value_weight: row.get(4)?,
                },
                submitted_at: row.get(5)?,
            })
        })?
        .collect();
    votes
}

// Bug fixes

const BUG_FIX_COLUMNS: &str = "id, title, severity, impact_weight, resolved_by_id, resolved_at";

fn bug_fix_from_row(row: &Row<'_>) -> Result<BugFix> {
    Ok(BugFix {
        id: row.get(0)?,
        title: row.get(1)?,
        severity: row.get(2)?,
        impact_weight: row.get(3)?,
        resolved_by_id: row.get(4)?,
        resolved_at: row.get(5)?,
    })
}

pub fn insert_bug_fix(conn: &Connection, bug: &BugFix) -> Result<()> {
    conn.execute(
        "INSERT INTO bug_fixes (id, title, severity, impact_weight, resolved_by_id, resolved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            bug.id,
            bug.title,
            bug.severity,
            bug.impact_weight,
            bug.resolved_by_id,
            bug.resolved_at,
        ],
    )?;
    Ok(())
}

pub fn load_bug_fix(conn: &Connection, id: &str) -> Result<Option<BugFix>> {
    conn.query_row(
        &format!("SELECT {BUG_FIX_COLUMNS} FROM bug_fixes WHERE id = ?1"),
        params![id],
        bug_fix_from_row,
    )
    .optional()
}

pub fn list_bug_fixes(conn: &Connection) -> Result<Vec<BugFix>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BUG_FIX_COLUMNS} FROM bug_fixes ORDER BY resolved_at DESC, id ASC"
    ))?;
    let bugs = stmt.query_map([], bug_fix_from_row)?.collect();
    bugs
}

/// Rewrites every column but `resolved_at`. False when the id is unknown.
pub fn update_bug_fix(conn: &Connection, bug: &BugFix) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE bug_fixes SET title = ?2, severity = ?3, impact_weight = ?4, resolved_by_id = ?5 WHERE id = ?1",
        params![bug.id, bug.title, bug.severity, bug.impact_weight, bug.resolved_by_id],
    )?;
    Ok(changed > 0)
}

pub fn delete_bug_fix(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM bug_fixes WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// Meetings

fn write_meeting_contributions(
    conn: &Connection,
    meeting_id: &str,
    contributions: &[MeetingContribution],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO meeting_contributions (meeting_id, member_id, contribution_level) VALUES (?1, ?2, ?3)",
    )?;
    for c in contributions {
        stmt.execute(params![meeting_id, c.member_id, c.contribution_level])?;
    }
    Ok(())
}

fn meeting_contributions(conn: &Connection, meeting_id: &str) -> Result<Vec<MeetingContribution>> {
    let mut stmt = conn.prepare_cached(
        "SELECT member_id, contribution_level FROM meeting_contributions WHERE meeting_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![meeting_id], |row| {
            Ok(MeetingContribution {
                member_id: row.get(0)?,
                contribution_level: row.get(1)?,
            })
        })?
        .collect();
    rows
}

fn meeting_from_row(row: &Row<'_>) -> Result<Meeting> {
    Ok(Meeting {
        id: row.get(0)?,
        topic: row.get(1)?,
        importance_weight: row.get(2)?,
        held_at: row.get(3)?,
        contributions: Vec::new(),
    })
}

pub fn insert_meeting(conn: &Connection, meeting: &Meeting) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO meetings (id, topic, importance_weight, held_at) VALUES (?1, ?2, ?3, ?4)",
        params![meeting.id, meeting.topic, meeting.importance_weight, meeting.held_at],
    )?;
    write_meeting_contributions(&tx, &meeting.id, &meeting.contributions)?;
    tx.commit()
}

pub fn load_meeting(conn: &Connection, id: &str) -> Result<Option<Meeting>> {
    let meeting = conn
        .query_row(
            "SELECT id, topic, importance_weight, held_at FROM meetings WHERE id = ?1",
            params![id],
            meeting_from_row,
        )
        .optional()?;

    match meeting {
        Some(mut meeting) => {
            meeting.contributions = meeting_contributions(conn, &meeting.id)?;
            Ok(Some(meeting))
        }
        None => Ok(None),
    }
}

pub fn list_meetings(conn: &Connection) -> Result<Vec<Meeting>> {
    let mut stmt = conn.prepare(
        "SELECT id, topic, importance_weight, held_at FROM meetings ORDER BY held_at DESC, id ASC",
    )?;
    let mut meetings: Vec<Meeting> = stmt.query_map([], meeting_from_row)?.collect::<Result<_>>()?;

    for meeting in &mut meetings {
        meeting.contributions = meeting_contributions(conn, &meeting.id)?;
    }
    Ok(meetings)
}

/// Rewrites the meeting and swaps its whole contribution list. The caller
/// owns the transaction.
pub fn update_meeting(conn: &Connection, meeting: &Meeting) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE meetings SET topic = ?2, importance_weight = ?3 WHERE id = ?1",
        params![meeting.id, meeting.topic, meeting.importance_weight],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    conn.execute(
        "DELETE FROM meeting_contributions WHERE meeting_id = ?1",
        params![meeting.id],
    )?;
    write_meeting_contributions(conn, &meeting.id, &meeting.contributions)?;
    Ok(true)
}

pub fn delete_meeting(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM meetings WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// Decisions

fn write_decision_contributions(
    conn: &Connection,
    decision_id: &str,
    contributions: &[DecisionContribution],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO decision_contributions (decision_id, member_id, influence_level) VALUES (?1, ?2, ?3)",
    )?;
    for c in contributions {
        stmt.execute(params![decision_id, c.member_id, c.influence_level])?;
    }
    Ok(())
}

fn decision_contributions(
    conn: &Connection,
    decision_id: &str,
) -> Result<Vec<DecisionContribution>> {
    let mut stmt = conn.prepare_cached(
        "SELECT member_id, influence_level FROM decision_contributions WHERE decision_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![decision_id], |row| {
            Ok(DecisionContribution {
                member_id: row.get(0)?,
                influence_level: row.get(1)?,
            })
        })?
        .collect();
    rows
}

const DECISION_COLUMNS: &str = "id, title, description, importance_weight, decided_at";

fn decision_from_row(row: &Row<'_>) -> Result<Decision> {
    Ok(Decision {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        importance_weight: row.get(3)?,
        decided_at: row.get(4)?,
        contributions: Vec::new(),
    })
}

pub fn insert_decision(conn: &Connection, decision: &Decision) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO decisions (id, title, description, importance_weight, decided_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            decision.id,
            decision.title,
            decision.description,
            decision.importance_weight,
            decision.decided_at,
        ],
    )?;
    write_decision_contributions(&tx, &decision.id, &decision.contributions)?;
    tx.commit()
}

pub fn load_decision(conn: &Connection, id: &str) -> Result<Option<Decision>> {
    let decision = conn
        .query_row(
            &format!("SELECT {DECISION_COLUMNS} FROM decisions WHERE id = ?1"),
            params![id],
            decision_from_row,
        )
        .optional()?;

    match decision {
        Some(mut decision) => {
            decision.contributions = decision_contributions(conn, &decision.id)?;
            Ok(Some(decision))
        }
        None => Ok(None),
    }
}

pub fn list_decisions(conn: &Connection) -> Result<Vec<Decision>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DECISION_COLUMNS} FROM decisions ORDER BY decided_at DESC, id ASC"
    ))?;
    let mut decisions: Vec<Decision> =
        stmt.query_map([], decision_from_row)?.collect::<Result<_>>()?;

    for decision in &mut decisions {
        decision.contributions = decision_contributions(conn, &decision.id)?;
    }
    Ok(decisions)
}

/// Rewrites the decision and swaps its whole contribution list. The caller
/// owns the transaction.
pub fn update_decision(conn: &Connection, decision: &Decision) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE decisions SET title = ?2, description = ?3, importance_weight = ?4 WHERE id = ?1",
        params![
            decision.id,
            decision.title,
            decision.description,
            decision.importance_weight,
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    conn.execute(
        "DELETE FROM decision_contributions WHERE decision_id = ?1",
        params![decision.id],
    )?;
    write_decision_contributions(conn, &decision.id, &decision.contributions)?;
    Ok(true)
}

pub fn delete_decision(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM decisions WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// Snapshots

/// Writes a snapshot and its entries. The caller owns the transaction.
pub fn insert_snapshot(conn: &Connection, snapshot: &EquitySnapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO equity_snapshots (id, period_label, created_at) VALUES (?1, ?2, ?3)",
        params![snapshot.id, snapshot.period_label, snapshot.created_at],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO snapshot_entries (snapshot_id, member_id, equity_percent, total_score, feature_score, bug_score, meeting_score, decision_score) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for e in &snapshot.entries {
        stmt.execute(params![
            snapshot.id,
            e.member_id,
            e.equity_percent,
            e.total_score,
            e.feature_score,
            e.bug_score,
            e.meeting_score,
            e.decision_score,
        ])?;
    }
    Ok(())
}

fn snapshot_entries(conn: &Connection, snapshot_id: &str) -> Result<Vec<SnapshotEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT member_id, equity_percent, total_score, feature_score, bug_score, meeting_score, decision_score FROM snapshot_entries WHERE snapshot_id = ?1 ORDER BY member_id ASC",
    )?;
    let entries = stmt
        .query_map(params![snapshot_id], |row| {
            Ok(SnapshotEntry {
                member_id: row.get(0)?,
                equity_percent: row.get(1)?,
                total_score: row.get(2)?,
                feature_score: row.get(3)?,
                bug_score: row.get(4)?,
                meeting_score: row.get(5)?,
                decision_score: row.get(6)?,
            })
        })?
        .collect();
    entries
}

pub fn load_snapshot(conn: &Connection, id: &str) -> Result<Option<EquitySnapshot>> {
    let header = conn
        .query_row(
            "SELECT id, period_label, created_at FROM equity_snapshots WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
        )
        .optional()?;

    match header {
        Some((id, period_label, created_at)) => {
            let entries = snapshot_entries(conn, &id)?;
            Ok(Some(EquitySnapshot {
                id,
                period_label,
                created_at,
                entries,
            }))
        }
        None => Ok(None),
    }
}

/// Newest first.
pub fn list_snapshots(conn: &Connection) -> Result<Vec<EquitySnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, period_label, created_at FROM equity_snapshots ORDER BY created_at DESC, rowid DESC",
    )?;
    let headers: Vec<(String, String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<_>>()?;

    headers
        .into_iter()
        .map(|(id, period_label, created_at)| {
            let entries = snapshot_entries(conn, &id)?;
            Ok(EquitySnapshot {
                id,
                period_label,
                created_at,
                entries,
            })
        })
        .collect()
}
