//! `rollcall` operator CLI.
//!
//! # Responsibility
//! - Drive core services against a local SQLite database.
//! - Print results as text or JSON.
//!
//! Settings come from `ROLLCALL_*` variables (a `.env` file is loaded when
//! present); flags override them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rollcall_core::db::Connection;
use rollcall_core::{
    init_database, init_logging, Actor, CoreConfig, EventService, MembershipService, NewEvent,
    NewOrganization, NewParticipant, OrganizationService, RemovalOutcome, RetryPolicy,
};
use serde::Serialize;
use std::path::PathBuf;

/// Registration and membership engine CLI.
#[derive(Debug, Parser)]
#[command(name = "rollcall")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "ROLLCALL_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Identity to act as: `admin`, `org:<id>` or `participant:<id>`.
    #[arg(long = "as", global = true, default_value = "admin", value_parser = parse_actor)]
    actor: Actor,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or migrate the database.
    Init,
    /// Create an organization.
    OrgCreate {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        campus: Option<String>,
    },
    /// Delete an organization with all of its events and registrations.
    OrgDelete { id: String },
    /// Register or refresh a participant profile.
    ParticipantAdd {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an event.
    EventCreate {
        #[arg(long)]
        org: String,
        #[arg(long)]
        name: String,
        /// Event date in epoch milliseconds.
        #[arg(long)]
        date: i64,
        /// Makes it a team event with this many members per registration.
        #[arg(long)]
        team_size: Option<u32>,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Hide the event from public listings.
        #[arg(long)]
        private: bool,
    },
    /// Delete an event and its registrations.
    EventDelete { id: String },
    /// Show an event with its registrations.
    EventShow { id: String },
    /// Join an event, alone or into an existing team.
    Join {
        event_id: String,
        participant_id: String,
        #[arg(long)]
        registration: Option<String>,
        #[arg(long)]
        team_name: Option<String>,
    },
    /// Leave a registration, or delete it when no participant is given.
    Leave {
        registration_id: String,
        participant_id: Option<String>,
    },
    /// Show which registration holds a participant for an event.
    Check {
        event_id: String,
        participant_id: String,
    },
}

fn parse_actor(value: &str) -> Result<Actor, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("admin") {
        return Ok(Actor::Admin);
    }
    match value.split_once(':') {
        Some(("org", id)) if !id.trim().is_empty() => {
            Ok(Actor::Organization(id.trim().to_string()))
        }
        Some(("participant", id)) if !id.trim().is_empty() => {
            Ok(Actor::Participant(id.trim().to_string()))
        }
        _ => Err(format!(
            "expected `admin`, `org:<id>` or `participant:<id>`, got `{value}`"
        )),
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = CoreConfig::from_env().context("invalid ROLLCALL_* configuration")?;
    if let Some(path) = &cli.database {
        config.database_path = path.clone();
    }
    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level, log_dir).context("failed to start logging")?;
    }

    let db = init_database(&config.database_path, config.connection_settings())
        .with_context(|| format!("cannot open {}", config.database_path.display()))?;
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&cli.command)
    );

    let retry = config.retry_policy();
    db.with_connection(|conn| execute(conn, retry, &cli))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::OrgCreate { .. } => "org-create",
        Command::OrgDelete { .. } => "org-delete",
        Command::ParticipantAdd { .. } => "participant-add",
        Command::EventCreate { .. } => "event-create",
        Command::EventDelete { .. } => "event-delete",
        Command::EventShow { .. } => "event-show",
        Command::Join { .. } => "join",
        Command::Leave { .. } => "leave",
        Command::Check { .. } => "check",
    }
}

fn execute(conn: &Connection, retry: RetryPolicy, cli: &Cli) -> Result<()> {
    let format = cli.format;
    let actor = &cli.actor;
    match &cli.command {
        Command::Init => {
            let version = rollcall_core::db::migrations::latest_version();
            emit(format, &serde_json::json!({ "schema_version": version }), |_| {
                format!("database ready (schema version {version})")
            })
        }
        Command::OrgCreate { id, name, campus } => {
            let mut input = NewOrganization::new(id.as_str(), name.as_str());
            input.campus = campus.clone();
            let organization = organizations(conn, retry)?.create_organization(actor, &input)?;
            emit(format, &organization, |org| {
                format!("created organization {} ({})", org.id, org.name)
            })
        }
        Command::OrgDelete { id } => {
            let report = organizations(conn, retry)?.delete_organization(actor, id)?;
            emit(format, &report, |report| {
                format!(
                    "deleted={} events={} registrations={}",
                    report.root_deleted, report.events_deleted, report.registrations_deleted
                )
            })
        }
        Command::ParticipantAdd { id, name, email } => {
            let mut input = NewParticipant::new(id.as_str(), name.as_str());
            input.email = email.clone();
            let participant = organizations(conn, retry)?.register_participant(&input)?;
            emit(format, &participant, |participant| {
                format!("participant {} ({})", participant.id, participant.display_name)
            })
        }
        Command::EventCreate {
            org,
            name,
            date,
            team_size,
            category,
            description,
            private,
        } => {
            let mut input = match team_size {
                Some(size) => NewEvent::team(org.as_str(), name.as_str(), *date, *size),
                None => NewEvent::solo(org.as_str(), name.as_str(), *date),
            };
            input.category = category.clone();
            input.description = description.clone();
            input.is_public = !private;
            let event = events(conn, retry)?.create_event(actor, &input)?;
            emit(format, &event, |event| {
                format!(
                    "created event {} ({:?}, up to {} per registration)",
                    event.id, event.participation, event.max_team_members
                )
            })
        }
        Command::EventDelete { id } => {
            let report = events(conn, retry)?.delete_event(actor, id)?;
            emit(format, &report, |report| {
                format!(
                    "deleted={} registrations={}",
                    report.root_deleted, report.registrations_deleted
                )
            })
        }
        Command::EventShow { id } => {
            let overview = events(conn, retry)?.event_overview(id)?;
            emit(format, &overview, |overview| {
                let mut lines = vec![format!(
                    "{} {} ({:?}, max {})",
                    overview.event.id,
                    overview.event.name,
                    overview.event.participation,
                    overview.event.max_team_members
                )];
                for registration in &overview.registrations {
                    lines.push(format!(
                        "  {} owner={} members={}",
                        registration.id,
                        registration.owner_id,
                        registration.members.join(",")
                    ));
                }
                lines.join("\n")
            })
        }
        Command::Join {
            event_id,
            participant_id,
            registration,
            team_name,
        } => {
            let joined = membership(conn, retry)?.add_registration(
                event_id,
                participant_id,
                registration.as_deref(),
                team_name.as_deref(),
            )?;
            emit(format, &joined, |registration| {
                format!(
                    "registration {} members={}/{}",
                    registration.id,
                    registration.member_count(),
                    registration.max_team_members
                )
            })
        }
        Command::Leave {
            registration_id,
            participant_id,
        } => {
            let outcome = membership(conn, retry)?
                .remove_registration(registration_id, participant_id.as_deref())?;
            emit(format, &outcome, |outcome| match outcome {
                RemovalOutcome::Deleted { registration_id } => {
                    format!("registration {registration_id} deleted")
                }
                RemovalOutcome::MemberRemoved {
                    registration,
                    new_owner,
                } => format!(
                    "registration {} members={} owner={}{}",
                    registration.id,
                    registration.members.join(","),
                    registration.owner_id,
                    if new_owner.is_some() { " (reassigned)" } else { "" }
                ),
            })
        }
        Command::Check {
            event_id,
            participant_id,
        } => {
            let found = membership(conn, retry)?.check_registration(event_id, participant_id)?;
            emit(format, &found, |found| match found {
                Some(registration) => format!("registered in {}", registration.id),
                None => "not registered".to_string(),
            })
        }
    }
}

fn organizations(conn: &Connection, retry: RetryPolicy) -> Result<OrganizationService<'_>> {
    Ok(OrganizationService::try_new(conn)?.with_retry_policy(retry))
}

fn events(conn: &Connection, retry: RetryPolicy) -> Result<EventService<'_>> {
    Ok(EventService::try_new(conn)?.with_retry_policy(retry))
}

fn membership(conn: &Connection, retry: RetryPolicy) -> Result<MembershipService<'_>> {
    Ok(MembershipService::try_new(conn)?.with_retry_policy(retry))
}

fn emit<T, F>(format: OutputFormat, value: &T, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text(value)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "rollcall",
            "join",
            "event-1",
            "p1",
            "--registration",
            "reg-1",
            "--format",
            "json",
            "--database",
            "/tmp/rollcall.sqlite3",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/rollcall.sqlite3")));
        match cli.command {
            Command::Join {
                event_id,
                participant_id,
                registration,
                team_name,
            } => {
                assert_eq!(event_id, "event-1");
                assert_eq!(participant_id, "p1");
                assert_eq!(registration.as_deref(), Some("reg-1"));
                assert_eq!(team_name, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn actor_defaults_to_admin_and_accepts_org() {
        let cli = Cli::parse_from(["rollcall", "init"]);
        assert_eq!(cli.actor, Actor::Admin);

        let cli = Cli::parse_from(["rollcall", "--as", "org:nexus", "event-delete", "e1"]);
        assert_eq!(cli.actor, Actor::Organization("nexus".to_string()));
    }

    #[test]
    fn malformed_actor_is_rejected() {
        assert!(parse_actor("org:").is_err());
        assert!(parse_actor("root").is_err());
        assert_eq!(
            parse_actor("participant:prn-7"),
            Ok(Actor::Participant("prn-7".to_string()))
        );
    }

    #[test]
    fn leave_without_participant_deletes_registration() {
        let cli = Cli::parse_from(["rollcall", "leave", "reg-1"]);
        assert!(matches!(
            cli.command,
            Command::Leave {
                participant_id: None,
                ..
            }
        ));
    }

    #[test]
    fn team_event_flags_parse() {
        let cli = Cli::parse_from([
            "rollcall",
            "event-create",
            "--org",
            "nexus",
            "--name",
            "Relay",
            "--date",
            "1700000000000",
            "--team-size",
            "4",
            "--private",
        ]);
        match cli.command {
            Command::EventCreate {
                team_size, private, ..
            } => {
                assert_eq!(team_size, Some(4));
                assert!(private);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn commands_run_against_in_memory_database() {
        let conn = rollcall_core::open_db_in_memory().unwrap();
        let run = |args: &[&str]| {
            let cli = Cli::parse_from(args);
            execute(&conn, RetryPolicy::no_retry(), &cli)
        };

        run(&["rollcall", "org-create", "--id", "nexus", "--name", "Nexus"]).unwrap();
        run(&["rollcall", "participant-add", "--id", "p1", "--name", "Ada"]).unwrap();
        run(&["rollcall", "check", "missing-event", "p1"]).unwrap();
        let err = run(&["rollcall", "--as", "participant:p1", "org-delete", "nexus"]).unwrap_err();
        assert!(err.to_string().contains("forbidden"));
    }
}
