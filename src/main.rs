mod availability;
mod client;
mod commands;
mod config;
mod error;
mod models;
mod session;
mod web;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use models::NewReservation;

/// Client for the university consultation booking platform — browse and
/// book consultation slots as a student, manage availability as a
/// lecturer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print detailed API responses
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Path to config file
    #[arg(short = 'c', long, global = true, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token
    Login {
        /// Account email (defaults to the account in config)
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Account password (defaults to the account in config)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },

    /// Create a student account
    Register {
        /// Username
        username: String,
        /// University email
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short = 'p', long)]
        password: String,
    },

    /// Refresh the stored session token
    Refresh,

    /// Clear the stored session token
    Logout,

    /// Show the stored session's token claims
    Whoami,

    /// List bookable consultation slots
    Slots {
        /// Only show slots of this lecturer
        #[arg(short = 'l', long)]
        lecturer: Option<i64>,
    },

    /// Book a consultation slot
    Book {
        /// Slot id (see `slots`)
        slot_id: i64,

        /// Meeting topic
        #[arg(short = 't', long)]
        topic: Option<String>,

        /// Notes for the lecturer
        #[arg(short = 'n', long)]
        notes: Option<String>,

        /// File to attach to the reservation
        #[arg(short = 'a', long)]
        attachment: Option<PathBuf>,
    },

    /// Cancel one of your reservations
    Cancel {
        reservation_id: i64,
    },

    /// List your reservations
    MyReservations,

    /// List your availability windows (lecturer)
    Windows,

    /// Add a recurring availability window (lecturer)
    ///
    /// Example: add-window monday 10:00 11:00 --capacity 2 --location "B5 / 410"
    AddWindow {
        /// Weekday, e.g. "monday"
        day: String,
        /// Start time, e.g. "10:00"
        start: String,
        /// End time, e.g. "11:00"
        end: String,

        /// Maximum concurrent bookings per occurrence
        #[arg(long, default_value_t = 1)]
        capacity: u32,

        /// Meeting location
        #[arg(short = 'l', long)]
        location: Option<String>,
    },

    /// Replace an availability window (lecturer)
    EditWindow {
        id: i64,
        day: String,
        start: String,
        end: String,

        #[arg(long, default_value_t = 1)]
        capacity: u32,

        #[arg(short = 'l', long)]
        location: Option<String>,
    },

    /// Deactivate an availability window (lecturer). Windows are never
    /// hard-deleted; existing reservations keep their reference.
    RemoveWindow {
        id: i64,
    },

    /// List blocked intervals (lecturer)
    Blocked,

    /// Block a one-off interval (lecturer)
    ///
    /// Example: block 2026-01-12 10:00 12:00 --reason "conference"
    Block {
        /// Date, YYYY-MM-DD
        date: String,
        start: String,
        end: String,

        #[arg(short = 'r', long)]
        reason: Option<String>,
    },

    /// Update a blocked interval (lecturer)
    EditBlock {
        id: i64,
        date: String,
        start: String,
        end: String,

        #[arg(short = 'r', long)]
        reason: Option<String>,
    },

    /// Remove a blocked interval (lecturer)
    Unblock {
        id: i64,
    },

    /// List reservations against your slots (lecturer)
    Reservations {
        /// Only show reservations with this status (pending, accepted, ...)
        #[arg(short = 's', long)]
        status: Option<String>,
    },

    /// Accept a pending reservation (lecturer)
    Accept {
        reservation_id: i64,
    },

    /// Reject a pending reservation (lecturer)
    Reject {
        reservation_id: i64,

        /// Reason shown to the student
        #[arg(short = 'r', long, default_value = "")]
        reason: String,
    },

    /// Mark an accepted reservation completed / no-show (lecturer)
    ///
    /// Example: mark 17 completed
    Mark {
        reservation_id: i64,
        /// completed, cancelled, no_show_student or no_show_lecturer
        status: String,
    },

    /// Show your weekly class timetable
    MySchedule,

    /// Add a class to your timetable
    ///
    /// Example: add-class "Analiza matematyczna" wednesday "08:00 - 09:30"
    AddClass {
        /// Course name
        subject: String,
        /// Weekday, e.g. "wednesday"
        day: String,
        /// Time label, e.g. "08:00 - 09:30"
        time: String,

        #[arg(short = 'l', long)]
        location: Option<String>,
    },

    /// Replace a timetable entry
    EditClass {
        id: i64,
        subject: String,
        day: String,
        time: String,

        #[arg(short = 'l', long)]
        location: Option<String>,
    },

    /// Remove a timetable entry
    RemoveClass {
        id: i64,
    },

    /// Show platform-wide counters (admin)
    AdminStats,

    /// List lecturer or student accounts (admin)
    ///
    /// Example: admin-users lecturers
    AdminUsers {
        /// "lecturers" or "students"
        kind: String,
    },

    /// Suspend or reactivate an account (admin)
    AdminToggle {
        /// "lecturer" or "student"
        kind: String,
        id: i64,
    },

    /// Delete an account (admin)
    AdminRemove {
        /// "lecturer" or "student"
        kind: String,
        id: i64,
    },

    /// Export your schedule as CSV (lecturer)
    Export {
        /// Output file (default: schedule-<date>.csv)
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Import a schedule file (lecturer): .csv timetable, .ics calendar,
    /// or .json window list for bulk creation
    Import {
        file: PathBuf,
    },

    /// Start the calendar dashboard server
    Serve {
        /// Listen address (e.g. "0.0.0.0:3000")
        #[arg(short = 'a', long, default_value = "0.0.0.0:3011")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = run(&cli).await;

    // Central session teardown: a 401 anywhere means the token is no
    // longer usable, so drop it before reporting the failure.
    if let Err(ref e) = result {
        if error::is_unauthorized(e) {
            if let Err(clear_err) = session::clear(&cli.config) {
                warn!("Could not clear stored session: {:#}", clear_err);
            }
            eprintln!("Session expired — run `consult login` to sign in again.");
        }
    }

    result
}

async fn run(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    // Logout and whoami only touch the session file, so they work even
    // when the config is missing or broken.
    let cfg = match &cli.command {
        Command::Logout => return commands::run_logout(config_path),
        Command::Whoami => return commands::run_whoami(config_path),
        _ => config::load_config(config_path)?,
    };

    match &cli.command {
        Command::Logout => commands::run_logout(config_path)?,
        Command::Whoami => commands::run_whoami(config_path)?,
        Command::Login { user, password } => {
            commands::run_login(&cfg, config_path, user, password).await?;
        }
        Command::Register {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            let new = models::NewAccount {
                username: username.clone(),
                email: email.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                password: password.clone(),
            };
            commands::run_register(&cfg, &new).await?;
        }
        Command::Refresh => {
            commands::run_refresh(&cfg, config_path).await?;
        }
        Command::Slots { lecturer } => {
            commands::run_slots(&cfg, config_path, *lecturer).await?;
        }
        Command::Book {
            slot_id,
            topic,
            notes,
            attachment,
        } => {
            let new = NewReservation {
                slot_id: *slot_id,
                topic: topic.clone(),
                student_notes: notes.clone(),
                attachment: attachment.clone(),
            };
            commands::run_book(&cfg, config_path, new).await?;
        }
        Command::Cancel { reservation_id } => {
            commands::run_cancel(&cfg, config_path, *reservation_id).await?;
        }
        Command::MyReservations => {
            commands::run_my_reservations(&cfg, config_path).await?;
        }
        Command::Windows => {
            commands::run_windows(&cfg, config_path).await?;
        }
        Command::AddWindow {
            day,
            start,
            end,
            capacity,
            location,
        } => {
            commands::run_add_window(&cfg, config_path, day, start, end, *capacity, location)
                .await?;
        }
        Command::EditWindow {
            id,
            day,
            start,
            end,
            capacity,
            location,
        } => {
            commands::run_edit_window(&cfg, config_path, *id, day, start, end, *capacity, location)
                .await?;
        }
        Command::RemoveWindow { id } => {
            commands::run_remove_window(&cfg, config_path, *id).await?;
        }
        Command::Blocked => {
            commands::run_blocked(&cfg, config_path).await?;
        }
        Command::Block {
            date,
            start,
            end,
            reason,
        } => {
            commands::run_block(&cfg, config_path, date, start, end, reason).await?;
        }
        Command::EditBlock {
            id,
            date,
            start,
            end,
            reason,
        } => {
            commands::run_edit_block(&cfg, config_path, *id, date, start, end, reason).await?;
        }
        Command::Unblock { id } => {
            commands::run_unblock(&cfg, config_path, *id).await?;
        }
        Command::Reservations { status } => {
            commands::run_reservations(&cfg, config_path, status).await?;
        }
        Command::Accept { reservation_id } => {
            commands::run_accept(&cfg, config_path, *reservation_id).await?;
        }
        Command::Reject {
            reservation_id,
            reason,
        } => {
            commands::run_reject(&cfg, config_path, *reservation_id, reason).await?;
        }
        Command::Mark {
            reservation_id,
            status,
        } => {
            commands::run_mark(&cfg, config_path, *reservation_id, status).await?;
        }
        Command::MySchedule => {
            commands::run_my_schedule(&cfg, config_path).await?;
        }
        Command::AddClass {
            subject,
            day,
            time,
            location,
        } => {
            commands::run_add_class(&cfg, config_path, subject, day, time, location).await?;
        }
        Command::EditClass {
            id,
            subject,
            day,
            time,
            location,
        } => {
            commands::run_edit_class(&cfg, config_path, *id, subject, day, time, location).await?;
        }
        Command::RemoveClass { id } => {
            commands::run_remove_class(&cfg, config_path, *id).await?;
        }
        Command::AdminStats => {
            commands::run_admin_stats(&cfg, config_path).await?;
        }
        Command::AdminUsers { kind } => {
            let kind = commands::parse_account_kind(kind)?;
            commands::run_admin_users(&cfg, config_path, kind).await?;
        }
        Command::AdminToggle { kind, id } => {
            let kind = commands::parse_account_kind(kind)?;
            commands::run_admin_toggle(&cfg, config_path, kind, *id).await?;
        }
        Command::AdminRemove { kind, id } => {
            let kind = commands::parse_account_kind(kind)?;
            commands::run_admin_remove(&cfg, config_path, kind, *id).await?;
        }
        Command::Export { out } => {
            commands::run_export(&cfg, config_path, out).await?;
        }
        Command::Import { file } => {
            commands::run_import(&cfg, config_path, file).await?;
        }
        Command::Serve { addr } => {
            web::serve(cfg, config_path, addr).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn session_commands_need_no_further_arguments() {
        let cli = Cli::try_parse_from(["consult", "logout"]).unwrap();
        assert!(matches!(cli.command, Command::Logout));
        let cli = Cli::try_parse_from(["consult", "whoami"]).unwrap();
        assert!(matches!(cli.command, Command::Whoami));
    }
}
