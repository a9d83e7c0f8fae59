// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TidyHQ - booking lifecycle engine for residential cleaning businesses.
//!
//! This is the binary entry point. `serve` runs the notification dispatcher
//! until SIGINT/SIGTERM; every other subcommand performs one engine
//! operation and prints its JSON result on stdout.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tidyhq_core::{AssignmentRole, BookingStatus, Channel, JobStatus};

/// TidyHQ - booking lifecycle engine for residential cleaning businesses.
#[derive(Parser, Debug)]
#[command(name = "tidyhq", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the XDG lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the notification dispatcher until interrupted.
    Serve,
    /// Run a single dispatch cycle and print its report.
    Dispatch,
    /// Move one or more bookings to a new status.
    Transition {
        /// Booking ids; more than one runs a bulk transition.
        #[arg(required = true)]
        booking_ids: Vec<String>,
        /// Target status (pending, confirmed, completed, cancelled).
        #[arg(long)]
        to: BookingStatus,
        #[arg(long, default_value = "admin")]
        actor: String,
        /// Cancellation reason, stored on the booking and its history.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Assign staff to a booking.
    Assign {
        booking_id: String,
        #[arg(required = true)]
        staff_ids: Vec<String>,
        /// Role of the first listed staff member.
        #[arg(long, default_value = "lead")]
        role: AssignmentRole,
        /// Announce the team to the customer.
        #[arg(long, conflicts_with = "no_notify_customer")]
        notify_customer: bool,
        /// Never announce the team to the customer.
        #[arg(long)]
        no_notify_customer: bool,
    },
    /// Remove a staff member from a booking.
    Unassign { booking_id: String, staff_id: String },
    /// Queue an ad-hoc notification.
    Notify {
        #[arg(long)]
        channel: Channel,
        /// Email address or E.164 phone number.
        #[arg(long)]
        to: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        booking: Option<String>,
        /// File attached to an email and removed once the job finishes.
        #[arg(long)]
        attachment: Option<PathBuf>,
    },
    /// Show the notification log.
    Jobs {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        channel: Option<Channel>,
        #[arg(long)]
        booking: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Print per-status counts instead of jobs.
        #[arg(long)]
        stats: bool,
    },
    /// Show a booking with its team and status history.
    Booking { booking_id: String },
    /// Check store and handler health.
    Status,
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tidyhq_config::load_and_validate_path(path),
        None => tidyhq_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tidyhq_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    let Some(command) = cli.command else {
        println!("tidyhq: use --help for available commands");
        return ExitCode::SUCCESS;
    };

    if let Commands::Config = command {
        return commands::print_config(&config);
    }

    serve::init_tracing(&config.app.log_level);

    if let Commands::Serve = command {
        return match serve::run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let engine = match commands::build_engine(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Commands::Dispatch => commands::emit(&engine.run_dispatch_cycle().await),
        Commands::Transition {
            booking_ids,
            to,
            actor,
            reason,
        } => commands::transition(&engine, &booking_ids, to, &actor, reason.as_deref()).await,
        Commands::Assign {
            booking_id,
            staff_ids,
            role,
            notify_customer,
            no_notify_customer,
        } => {
            let options = commands::assign_options(notify_customer, no_notify_customer);
            commands::emit(&engine.assign(&booking_id, &staff_ids, role, options).await)
        }
        Commands::Unassign {
            booking_id,
            staff_id,
        } => commands::emit(&engine.unassign(&booking_id, &staff_id).await),
        Commands::Notify {
            channel,
            to,
            message,
            subject,
            booking,
            attachment,
        } => {
            let job = commands::ad_hoc_job(&engine, channel, to, message, subject, booking, attachment);
            commands::emit(&engine.enqueue_notification(job).await)
        }
        Commands::Jobs {
            status,
            channel,
            booking,
            limit,
            stats,
        } => {
            if stats {
                commands::emit(&engine.notification_stats().await)
            } else {
                let filter = commands::job_filter(status, channel, booking, limit);
                commands::emit(&engine.notification_log(filter).await)
            }
        }
        Commands::Booking { booking_id } => commands::emit(&engine.booking(&booking_id).await),
        Commands::Status => status::run_status(&engine).await,
        Commands::Serve | Commands::Config => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn transition_parses_statuses_and_bulk_ids() {
        let cli = Cli::parse_from([
            "tidyhq", "transition", "B1", "B2", "--to", "cancelled", "--reason", "storm",
        ]);
        match cli.command {
            Some(Commands::Transition {
                booking_ids,
                to,
                actor,
                reason,
            }) => {
                assert_eq!(booking_ids, vec!["B1", "B2"]);
                assert_eq!(to, BookingStatus::Cancelled);
                assert_eq!(actor, "admin");
                assert_eq!(reason.as_deref(), Some("storm"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(Cli::try_parse_from(["tidyhq", "transition", "B1", "--to", "archived"]).is_err());
    }

    #[test]
    fn customer_notice_flags_conflict() {
        assert!(
            Cli::try_parse_from([
                "tidyhq",
                "assign",
                "B1",
                "S1",
                "--notify-customer",
                "--no-notify-customer",
            ])
            .is_err()
        );
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = tidyhq_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.app.name, "tidyhq");
    }
}
