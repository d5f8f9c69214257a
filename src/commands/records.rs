//! Members, bug fixes, meetings and decisions: create, edit and delete.
//!
//! Edits change live scores only. Snapshots keep the figures they recorded.

use crate::commands::{db, write_transaction};
use crate::error::{EquityError, Result};
use crate::models::contribution::{
    validate_decision, validate_meeting, BugFix, BugFixPatch, Decision, DecisionContribution,
    DecisionPatch, Meeting, MeetingContribution, MeetingPatch,
};
use crate::models::input::require_text;
use crate::models::member::{Member, MemberStatus, RiskMultiplier};
use crate::models::weights::{BugImpactWeight, DecisionImportance, MeetingImportance, Severity};
use rusqlite::Connection;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn require_member(conn: &Connection, id: &str) -> Result<Member> {
    db::load_member(conn, id)?.ok_or_else(|| EquityError::not_found("member", id))
}

// Members

pub fn add_member(
    conn: &Connection,
    name: &str,
    email: &str,
    risk_multiplier: RiskMultiplier,
) -> Result<Member> {
    require_text("name", name)?;
    require_text("email", email)?;

    let member = Member {
        id: new_id(),
        name: name.to_string(),
        email: email.to_string(),
        status: MemberStatus::Active,
        risk_multiplier,
        joined_at: now(),
    };
    db::insert_member(conn, &member)?;
    log::info!("added member {} <{}>", member.id, member.email);
    Ok(member)
}

pub fn set_member_status(conn: &Connection, id: &str, status: MemberStatus) -> Result<Member> {
    let tx = write_transaction(conn)?;
    if !db::set_member_status(&tx, id, status)? {
        return Err(EquityError::not_found("member", id));
    }
    let member = require_member(&tx, id)?;
    tx.commit()?;

    log::info!("member {id} is now {}", status.as_str());
    Ok(member)
}

pub fn set_member_risk_multiplier(
    conn: &Connection,
    id: &str,
    risk_multiplier: RiskMultiplier,
) -> Result<Member> {
    let tx = write_transaction(conn)?;
    if !db::set_member_risk_multiplier(&tx, id, risk_multiplier)? {
        return Err(EquityError::not_found("member", id));
    }
    let member = require_member(&tx, id)?;
    tx.commit()?;
    Ok(member)
}

// Bug fixes

pub fn add_bug_fix(
    conn: &Connection,
    title: Option<String>,
    severity: Severity,
    impact_weight: BugImpactWeight,
    resolved_by_id: &str,
) -> Result<BugFix> {
    let tx = write_transaction(conn)?;
    require_member(&tx, resolved_by_id)?;

    let bug = BugFix {
        id: new_id(),
        title,
        severity,
        impact_weight,
        resolved_by_id: resolved_by_id.to_string(),
        resolved_at: now(),
    };
    db::insert_bug_fix(&tx, &bug)?;
    tx.commit()?;
    Ok(bug)
}

pub fn update_bug_fix(conn: &Connection, id: &str, patch: BugFixPatch) -> Result<BugFix> {
    let tx = write_transaction(conn)?;
    let mut bug = db::load_bug_fix(&tx, id)?.ok_or_else(|| EquityError::not_found("bug fix", id))?;
    if let Some(resolver) = &patch.resolved_by_id {
        require_member(&tx, resolver)?;
    }
    patch.apply(&mut bug)?;

    db::update_bug_fix(&tx, &bug)?;
    tx.commit()?;
    log::debug!("updated bug fix {id}");
    Ok(bug)
}

pub fn delete_bug_fix(conn: &Connection, id: &str) -> Result<()> {
    if !db::delete_bug_fix(conn, id)? {
        return Err(EquityError::not_found("bug fix", id));
    }
    log::info!("deleted bug fix {id}");
    Ok(())
}

// Meetings

pub fn add_meeting(
    conn: &Connection,
    topic: &str,
    importance_weight: MeetingImportance,
    contributions: Vec<MeetingContribution>,
) -> Result<Meeting> {
    let meeting = Meeting {
        id: new_id(),
        topic: topic.to_string(),
        importance_weight,
        held_at: now(),
        contributions,
    };
    validate_meeting(&meeting)?;

    db::insert_meeting(conn, &meeting)?;
    Ok(meeting)
}

pub fn update_meeting(conn: &Connection, id: &str, patch: MeetingPatch) -> Result<Meeting> {
    let tx = write_transaction(conn)?;
    let mut meeting = db::load_meeting(&tx, id)?.ok_or_else(|| EquityError::not_found("meeting", id))?;
    patch.apply(&mut meeting)?;

    db::update_meeting(&tx, &meeting)?;
    tx.commit()?;
    log::debug!("updated meeting {id}");
    Ok(meeting)
}

pub fn delete_meeting(conn: &Connection, id: &str) -> Result<()> {
    if !db::delete_meeting(conn, id)? {
        return Err(EquityError::not_found("meeting", id));
    }
    log::info!("deleted meeting {id}");
    Ok(())
}

// Decisions

pub fn add_decision(
    conn: &Connection,
    title: &str,
    description: Option<String>,
    importance_weight: DecisionImportance,
    contributions: Vec<DecisionContribution>,
) -> Result<Decision> {
    let decision = Decision {
        id: new_id(),
        title: title.to_string(),
        description,
        importance_weight,
        decided_at: now(),
        contributions,
    };
    validate_decision(&decision)?;

    db::insert_decision(conn, &decision)?;
    Ok(decision)
}

pub fn update_decision(conn: &Connection, id: &str, patch: DecisionPatch) -> Result<Decision> {
    let tx = write_transaction(conn)?;
    let mut decision =
        db::load_decision(&tx, id)?.ok_or_else(|| EquityError::not_found("decision", id))?;
    patch.apply(&mut decision)?;

    db::update_decision(&tx, &decision)?;
    tx.commit()?;
    log::debug!("updated decision {id}");
    Ok(decision)
}

pub fn delete_decision(conn: &Connection, id: &str) -> Result<()> {
    if !db::delete_decision(conn, id)? {
        return Err(EquityError::not_found("decision", id));
    }
    log::info!("deleted decision {id}");
    Ok(())
}
