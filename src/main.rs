use clap::{Parser, Subcommand, ValueEnum};
use equity_ledger::commands::{db, features, open_workspace, records, scoring, settings};
use equity_ledger::models::contribution::{
    BugFixPatch, ContributionPercent, DecisionContribution, DecisionPatch, FeatureContribution,
    FeatureDetailsPatch, FeatureStatus, MeetingContribution, MeetingPatch,
};
use equity_ledger::models::input::ValidationError;
use equity_ledger::models::member::{MemberStatus, RiskMultiplier};
use equity_ledger::models::weights::{Bounded, FeatureWeights};
use equity_ledger::Result;
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "equity-ledger", version, about = "Contribution-weighted equity scoring")]
struct Cli {
    /// Workspace directory holding `.equityengine/`
    #[arg(long, short = 'w', default_value = ".")]
    workspace: PathBuf,
    /// Enable debug logging
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute current scores and equity percentages
    Scores,
    /// Record an immutable equity snapshot for a period
    Snapshot {
        /// Period label, e.g. "2025-Q1"
        label: String,
    },
    /// List recorded snapshots, newest first
    Snapshots,
    /// Print one snapshot as CSV
    ExportSnapshot { id: String },
    /// Print the effective settings file
    Settings,

    /// Add an active member
    AddMember {
        name: String,
        email: String,
        #[arg(long, default_value_t = 1.0)]
        risk_multiplier: f64,
    },
    /// List all members
    Members,
    SetMemberStatus {
        id: String,
        #[arg(value_parser = member_status)]
        status: MemberStatus,
    },
    SetRiskMultiplier { id: String, multiplier: f64 },

    /// Add a feature; `--split alice=60 --split bob=40`
    AddFeature {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        weights: WeightArgs,
        #[arg(long, value_parser = feature_status, default_value = "draft")]
        status: FeatureStatus,
        #[arg(long = "split", value_parser = member_value::<f64>)]
        split: Vec<(String, f64)>,
    },
    /// List features, optionally only some statuses
    Features {
        #[arg(long = "status", value_parser = feature_status)]
        statuses: Vec<FeatureStatus>,
    },
    EditFeature {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
    },
    SetFeatureStatus {
        id: String,
        #[arg(value_parser = feature_status)]
        status: FeatureStatus,
    },
    SetWeights {
        id: String,
        #[command(flatten)]
        weights: WeightArgs,
    },
    /// Replace a feature's split; no `--split` clears it
    SetSplit {
        id: String,
        #[arg(long = "split", value_parser = member_value::<f64>)]
        split: Vec<(String, f64)>,
    },
    /// Record a member's proposed weights for a feature
    Vote {
        feature: String,
        member: String,
        #[command(flatten)]
        weights: WeightArgs,
    },
    /// Set a feature's weights to the rounded mean of its votes
    ApplyVotes { feature: String },

    /// Record a resolved bug, credited to the resolver
    AddBug {
        resolved_by: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        severity: u8,
        #[arg(long)]
        impact: u8,
    },
    EditBug {
        id: String,
        #[arg(long, conflicts_with = "clear_title")]
        title: Option<String>,
        #[arg(long)]
        clear_title: bool,
        #[arg(long)]
        severity: Option<u8>,
        #[arg(long)]
        impact: Option<u8>,
        #[arg(long)]
        resolved_by: Option<String>,
    },
    /// Record a meeting; `--member alice=4` per attendee
    AddMeeting {
        topic: String,
        #[arg(long)]
        importance: u8,
        #[arg(long = "member", value_parser = member_value::<u8>, required = true)]
        members: Vec<(String, u8)>,
    },
    EditMeeting {
        id: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        importance: Option<u8>,
        /// Replaces every attendee when given
        #[arg(long = "member", value_parser = member_value::<u8>)]
        members: Vec<(String, u8)>,
    },
    /// Record a decision; `--member bob=5` per participant
    AddDecision {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        importance: u8,
        #[arg(long = "member", value_parser = member_value::<u8>, required = true)]
        members: Vec<(String, u8)>,
    },
    EditDecision {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long)]
        importance: Option<u8>,
        /// Replaces every participant when given
        #[arg(long = "member", value_parser = member_value::<u8>)]
        members: Vec<(String, u8)>,
    },
    /// Delete a record. Snapshots keep their figures.
    Delete { kind: RecordKind, id: String },
}

#[derive(clap::Args, Debug)]
struct WeightArgs {
    #[arg(long)]
    impact: u8,
    #[arg(long)]
    difficulty: u8,
    #[arg(long)]
    business_value: u8,
}

impl WeightArgs {
    fn to_weights(&self) -> std::result::Result<FeatureWeights, ValidationError> {
        FeatureWeights::new(self.impact, self.difficulty, self.business_value)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RecordKind {
    Feature,
    Bug,
    Meeting,
    Decision,
}

/// Parses `member=value`.
fn member_value<T>(raw: &str) -> std::result::Result<(String, T), String>
where
    T: FromStr,
    T::Err: Display,
{
    let (member, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected MEMBER=VALUE, got `{raw}`"))?;
    let member = member.trim();
    if member.is_empty() {
        return Err(format!("missing member in `{raw}`"));
    }
    let value = value
        .trim()
        .parse::<T>()
        .map_err(|e| format!("bad value in `{raw}`: {e}"))?;
    Ok((member.to_string(), value))
}

fn feature_status(raw: &str) -> std::result::Result<FeatureStatus, String> {
    FeatureStatus::parse(raw).ok_or_else(|| format!("expected draft, in_progress or done, got `{raw}`"))
}

fn member_status(raw: &str) -> std::result::Result<MemberStatus, String> {
    MemberStatus::parse(raw).ok_or_else(|| format!("expected active or inactive, got `{raw}`"))
}

fn feature_split(pairs: Vec<(String, f64)>) -> Result<Vec<FeatureContribution>> {
    pairs
        .into_iter()
        .map(|(member_id, pct)| -> Result<FeatureContribution> {
            Ok(FeatureContribution {
                member_id,
                contribution_percent: ContributionPercent::new(pct)?,
            })
        })
        .collect()
}

fn meeting_levels(pairs: Vec<(String, u8)>) -> Result<Vec<MeetingContribution>> {
    pairs
        .into_iter()
        .map(|(member_id, level)| -> Result<MeetingContribution> {
            Ok(MeetingContribution {
                member_id,
                contribution_level: Bounded::new(level)?,
            })
        })
        .collect()
}

fn decision_levels(pairs: Vec<(String, u8)>) -> Result<Vec<DecisionContribution>> {
    pairs
        .into_iter()
        .map(|(member_id, level)| -> Result<DecisionContribution> {
            Ok(DecisionContribution {
                member_id,
                influence_level: Bounded::new(level)?,
            })
        })
        .collect()
}

/// `Some(None)` clears the field, `None` leaves it alone.
fn optional_text(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.to_string_lossy().into_owned();

    let conn = open_workspace(&workspace)?;

    match cli.command {
        Commands::Scores => print_json(&scoring::compute_workspace_scores(&workspace)?),
        Commands::Snapshot { label } => {
            print_json(&scoring::snapshot_workspace(&workspace, &label)?)
        }
        Commands::Settings => print_json(&settings::get_settings(&workspace)?),
        Commands::Snapshots => print_json(&scoring::list_snapshots(&conn)?),
        Commands::ExportSnapshot { id } => {
            print!("{}", scoring::export_snapshot_csv(&conn, &id)?);
            Ok(())
        }

        Commands::AddMember {
            name,
            email,
            risk_multiplier,
        } => print_json(&records::add_member(
            &conn,
            &name,
            &email,
            RiskMultiplier::new(risk_multiplier)?,
        )?),
        Commands::Members => print_json(&db::list_members(&conn)?),
        Commands::SetMemberStatus { id, status } => {
            print_json(&records::set_member_status(&conn, &id, status)?)
        }
        Commands::SetRiskMultiplier { id, multiplier } => print_json(
            &records::set_member_risk_multiplier(&conn, &id, RiskMultiplier::new(multiplier)?)?,
        ),

        Commands::AddFeature {
            title,
            description,
            weights,
            status,
            split,
        } => print_json(&features::add_feature(
            &conn,
            &title,
            description,
            weights.to_weights()?,
            status,
            feature_split(split)?,
        )?),
        Commands::Features { statuses } => {
            let filter = (!statuses.is_empty()).then_some(statuses.as_slice());
            print_json(&db::list_features(&conn, filter)?)
        }
        Commands::EditFeature {
            id,
            title,
            description,
            clear_description,
        } => print_json(&features::update_feature_details(
            &conn,
            &id,
            FeatureDetailsPatch {
                title,
                description: optional_text(description, clear_description),
            },
        )?),
        Commands::SetFeatureStatus { id, status } => {
            print_json(&features::set_feature_status(&conn, &id, status)?)
        }
        Commands::SetWeights { id, weights } => {
            print_json(&features::set_feature_weights(&conn, &id, weights.to_weights()?)?)
        }
        Commands::SetSplit { id, split } => print_json(&features::set_feature_contributions(
            &conn,
            &id,
            feature_split(split)?,
        )?),
        Commands::Vote {
            feature,
            member,
            weights,
        } => print_json(&features::submit_weight_vote(
            &conn,
            &feature,
            &member,
            weights.to_weights()?,
        )?),
        Commands::ApplyVotes { feature } => {
            print_json(&features::apply_weight_votes(&conn, &feature)?)
        }

        Commands::AddBug {
            resolved_by,
            title,
            severity,
            impact,
        } => print_json(&records::add_bug_fix(
            &conn,
            title,
            Bounded::new(severity)?,
            Bounded::new(impact)?,
            &resolved_by,
        )?),
        Commands::EditBug {
            id,
            title,
            clear_title,
            severity,
            impact,
            resolved_by,
        } => {
            let patch = BugFixPatch {
                title: optional_text(title, clear_title),
                severity: severity.map(Bounded::new).transpose()?,
                impact_weight: impact.map(Bounded::new).transpose()?,
                resolved_by_id: resolved_by,
            };
            print_json(&records::update_bug_fix(&conn, &id, patch)?)
        }
        Commands::AddMeeting {
            topic,
            importance,
            members,
        } => print_json(&records::add_meeting(
            &conn,
            &topic,
            Bounded::new(importance)?,
            meeting_levels(members)?,
        )?),
        Commands::EditMeeting {
            id,
            topic,
            importance,
            members,
        } => {
            let patch = MeetingPatch {
                topic,
                importance_weight: importance.map(Bounded::new).transpose()?,
                contributions: if members.is_empty() {
                    None
                } else {
                    Some(meeting_levels(members)?)
                },
            };
            print_json(&records::update_meeting(&conn, &id, patch)?)
        }
        Commands::AddDecision {
            title,
            description,
            importance,
            members,
        } => print_json(&records::add_decision(
            &conn,
            &title,
            description,
            Bounded::new(importance)?,
            decision_levels(members)?,
        )?),
        Commands::EditDecision {
            id,
            title,
            description,
            clear_description,
            importance,
            members,
        } => {
            let patch = DecisionPatch {
                title,
                description: optional_text(description, clear_description),
                importance_weight: importance.map(Bounded::new).transpose()?,
                contributions: if members.is_empty() {
                    None
                } else {
                    Some(decision_levels(members)?)
                },
            };
            print_json(&records::update_decision(&conn, &id, patch)?)
        }
        Commands::Delete { kind, id } => {
            match kind {
                RecordKind::Feature => features::delete_feature(&conn, &id)?,
                RecordKind::Bug => records::delete_bug_fix(&conn, &id)?,
                RecordKind::Meeting => records::delete_meeting(&conn, &id)?,
                RecordKind::Decision => records::delete_decision(&conn, &id)?,
            }
            println!("deleted {id}");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    equity_ledger::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
