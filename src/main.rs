use std::fmt::Display;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use jiff::civil::{Date, DateTime, Time};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    scheduling::{
        bucket::BucketKey,
        conflicts::{Conflict, ConflictCheck},
        interval::parse_datetime,
    },
    services::{
        board::{Placement, board, neighbours, technician_schedule},
        dispatch::{
            AssignTechnicianError, AssignTechnicianParameters, CheckConflictsParameters,
            MoveJobError, MoveJobParameters, MoveOutcome, ReorderJobParameters, ReorderOutcome,
            UpdateJobTimeError, UpdateJobTimeParameters, assign_technician, check_conflicts,
            move_job, reorder_in_bucket, update_job_time,
        },
        jobs::{
            AddJobError, AddJobParameters, ChangeStatusParameters, add_job, cancel_job,
            complete_job, start_job,
        },
        resolve_technician,
        technicians::{
            CreateTechnicianParameters, DeactivateTechnicianParameters, create_technician,
            deactivate_technician,
        },
    },
    storage::{Storage, json::JsonFileStorage},
};

mod config;
mod models;
mod scheduling;
mod services;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "dispatch",
    version,
    about = "Field-service dispatch board: book jobs, place them by zone and time of day, and keep technicians from being double-booked"
)]
struct Cli {
    /// Path to the store file
    #[arg(long, global = true, env = "DISPATCH_STORE")]
    store: Option<PathBuf>,

    /// Path to the board config file
    #[arg(long, global = true, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the board for a day, grouped by zone and time bucket
    Board {
        /// Day to show (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<Date>,
    },

    /// Show one technician's bookings for a day
    Schedule {
        technician: String,

        #[arg(short, long)]
        date: Option<Date>,
    },

    /// Book a new job
    Add {
        /// Customer name
        customer: String,

        /// What needs to be done
        #[arg(short = 'm', long, default_value = "")]
        description: String,

        /// Board zone
        #[arg(short, long)]
        zone: Option<String>,

        /// Day of the visit (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<Date>,

        /// Start time (HH:MM)
        #[arg(long, requires = "end")]
        start: Option<Time>,

        /// End time (HH:MM)
        #[arg(long, requires = "start")]
        end: Option<Time>,

        /// Technician to assign
        #[arg(short, long)]
        tech: Option<String>,

        /// Add notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Book even if the technician is already busy
        #[arg(long)]
        force: bool,
    },

    /// Check whether a technician is free for a window
    Check {
        technician: String,

        /// Window start, e.g. 2025-03-01T09:00
        #[arg(value_parser = parse_datetime)]
        start: DateTime,

        /// Window end, e.g. 2025-03-01T10:00
        #[arg(value_parser = parse_datetime)]
        end: DateTime,

        /// Ignore this job (when re-checking a job's own slot)
        #[arg(long)]
        exclude: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a job to another zone and/or time bucket
    Move {
        job_number: u64,

        /// morning, afternoon, evening or unscheduled
        bucket: BucketKey,

        /// Target zone; keeps the current one when omitted, "" clears it
        #[arg(short, long)]
        zone: Option<String>,

        /// Target day; defaults to the job's own day
        #[arg(short, long)]
        date: Option<Date>,

        /// Move even if the technician is already busy
        #[arg(long)]
        force: bool,
    },

    /// Change a job's order inside its zone and bucket
    Reorder {
        job_number: u64,

        /// Place directly after this job
        #[arg(long)]
        after: Option<u64>,

        /// Place directly before this job
        #[arg(long)]
        before: Option<u64>,

        /// Place first in the column
        #[arg(long, conflicts_with_all = ["after", "before", "back"])]
        front: bool,

        /// Place last in the column
        #[arg(long, conflicts_with_all = ["after", "before"])]
        back: bool,
    },

    /// Assign a technician to a job
    Assign {
        job_number: u64,
        technician: String,

        /// Assign even if the technician is already busy
        #[arg(long)]
        force: bool,
    },

    /// Remove the technician from a job
    Unassign { job_number: u64 },

    /// Change a job's time window
    Reschedule {
        job_number: u64,

        #[arg(value_parser = parse_datetime)]
        start: DateTime,

        #[arg(value_parser = parse_datetime)]
        end: DateTime,

        /// Reschedule even if the technician is already busy
        #[arg(long)]
        force: bool,
    },

    /// Mark a job as in progress
    Start { job_number: u64 },

    /// Complete a job
    Done { job_number: u64 },

    /// Cancel a job
    Cancel { job_number: u64 },

    /// Manage technicians
    #[command(subcommand)]
    Tech(TechCommands),
}

#[derive(Debug, Subcommand)]
enum TechCommands {
    /// Add a technician
    New {
        name: String,

        /// Home zone
        #[arg(short, long)]
        zone: Option<String>,
    },
    /// List technicians
    List,
    /// Stop assigning work to a technician
    Deactivate { name: String },
}

impl Commands {
    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Commands::Board { .. }
                | Commands::Schedule { .. }
                | Commands::Check { .. }
                | Commands::Tech(TechCommands::List)
        )
    }
}

#[derive(Serialize)]
struct CheckReport<'a> {
    ok: bool,
    conflicts: &'a [Conflict],
}

fn exit_with(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn exit_with_conflicts(message: impl Display, conflicts: &[Conflict]) -> ! {
    eprintln!("Error: {}", message);
    ui::render_conflicts(conflicts);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let data_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dispatch");
    let storage_path = cli.store.unwrap_or_else(|| data_dir.join("store.json"));
    let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.json"));

    if let Some(parent) = storage_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            exit_with(format!("Failed to create data directory: {}", e));
        });
    }

    let config = Config::load(&config_path).unwrap_or_else(|e| exit_with(e));
    let boundaries = config.boundaries();
    let storage = JsonFileStorage::new(storage_path);

    let command = cli.command.unwrap_or(Commands::Board { date: None });

    // Writers hold the session lock from load to save so their conflict
    // checks see every committed booking.
    let _session = if command.is_read_only() {
        None
    } else {
        Some(storage.lock_session().unwrap_or_else(|e| exit_with(e)))
    };

    let mut store = storage
        .load()
        .unwrap_or_else(|e| exit_with(format!("Failed to load store: {}", e)));
    tracing::debug!(path = %storage.path().display(), jobs = store.jobs.len(), "Store loaded");

    let today = jiff::Zoned::now().date();

    match command {
        Commands::Board { date } => {
            let date = date.unwrap_or(today);
            let lanes = board(&store, date, &boundaries);
            ui::render_board(&lanes, &store, date);
        }
        Commands::Schedule { technician, date } => {
            let date = date.unwrap_or(today);
            let technician =
                resolve_technician(&store, &technician).unwrap_or_else(|e| exit_with(e));
            let jobs = technician_schedule(&store, technician.id, date);

            if jobs.is_empty() {
                println!(
                    "{} has nothing booked on {}",
                    technician.name,
                    ui::format_date_header(date)
                );
            } else {
                ui::render_view_header(
                    &format!("{} · {}", technician.name, ui::format_date_header(date)),
                    jobs.len(),
                );
                for job in jobs {
                    ui::render_job_line(job, &store);
                }
            }
        }
        Commands::Add {
            customer,
            description,
            zone,
            date,
            start,
            end,
            tech,
            notes,
            force,
        } => {
            // A bare time means today.
            let date = date.or_else(|| start.map(|_| today));
            let params = AddJobParameters {
                customer_name: customer,
                description,
                zone,
                date,
                start,
                end,
                technician: tech,
                notes,
                force,
            };

            match add_job(&mut store, &storage, &boundaries, params) {
                Ok(job) => {
                    println!("✓ Job added: {}", job.customer_name);
                    println!("  #{}  {}", job.job_number, ui::format_window(&job));
                    if let Some(zone) = &job.zone {
                        println!("  Zone: {}", zone);
                    }
                }
                Err(AddJobError::Conflict(conflicts)) => {
                    exit_with_conflicts("Technician is already booked at that time", &conflicts)
                }
                Err(e) => exit_with(e),
            }
        }
        Commands::Check {
            technician,
            start,
            end,
            exclude,
            json,
        } => {
            let params = CheckConflictsParameters {
                technician,
                start,
                end,
                exclude_job: exclude,
            };
            let result = check_conflicts(&store, params).unwrap_or_else(|e| exit_with(e));
            let conflicts: &[Conflict] = match &result {
                ConflictCheck::Clear => &[],
                ConflictCheck::Conflicts(conflicts) => conflicts,
            };

            if json {
                let report = CheckReport {
                    ok: result.is_clear(),
                    conflicts,
                };
                match serde_json::to_string_pretty(&report) {
                    Ok(out) => println!("{}", out),
                    Err(e) => exit_with(e),
                }
            } else if result.is_clear() {
                println!("{} Free from {} to {}", "✓".green(), start, end);
            } else {
                ui::render_conflicts(conflicts);
                std::process::exit(2);
            }
        }
        Commands::Move {
            job_number,
            bucket,
            zone,
            date,
            force,
        } => {
            let to_zone = match zone {
                Some(zone) => Some(zone),
                None => store
                    .get_job_by_number(job_number)
                    .and_then(|j| j.zone.clone()),
            };
            let params = MoveJobParameters {
                job_number,
                to_zone,
                to_bucket: bucket,
                date,
                force,
            };

            match move_job(&mut store, &storage, &boundaries, params) {
                Ok(MoveOutcome::Unchanged) => println!("Job #{} is already there", job_number),
                Ok(MoveOutcome::Moved(job)) => {
                    println!(
                        "✓ Job #{} moved to {} · {}",
                        job.job_number,
                        job.zone.as_deref().unwrap_or("No zone"),
                        bucket.label()
                    );
                    println!("  {}", ui::format_window(&job));
                }
                Err(MoveJobError::Conflict { conflicts, .. }) => {
                    exit_with_conflicts("Technician is already booked in that slot", &conflicts)
                }
                Err(e) => exit_with(e),
            }
        }
        Commands::Reorder {
            job_number,
            after,
            before,
            front,
            back,
        } => {
            let placement = match (after, before) {
                (Some(_), Some(_)) => None,
                (Some(after), None) => Some(Placement::After(after)),
                (None, Some(before)) => Some(Placement::Before(before)),
                (None, None) if front => Some(Placement::Front),
                (None, None) if back => Some(Placement::Back),
                (None, None) => {
                    exit_with("Say where the job goes: --after, --before, --front or --back")
                }
            };
            let (after, before) = match placement {
                Some(placement) => neighbours(&store, &boundaries, job_number, placement)
                    .unwrap_or_else(|e| exit_with(e)),
                None => (after, before),
            };

            let params = ReorderJobParameters {
                job_number,
                after,
                before,
            };
            match reorder_in_bucket(&mut store, &storage, &boundaries, params) {
                Ok(ReorderOutcome::Unchanged) => println!("Job #{} is already there", job_number),
                Ok(ReorderOutcome::Reordered { .. }) => println!("✓ Job #{} reordered", job_number),
                Err(e) => exit_with(e),
            }
        }
        Commands::Assign {
            job_number,
            technician,
            force,
        } => {
            let params = AssignTechnicianParameters {
                job_number,
                technician: Some(technician),
                force,
            };

            match assign_technician(&mut store, &storage, params) {
                Ok(outcome) if !outcome.assigned => {
                    println!("Job #{} already has that technician", job_number)
                }
                Ok(outcome) => {
                    println!("✓ Job #{} assigned", outcome.job.job_number);
                    if outcome.zone_mismatch {
                        println!(
                            "  {}",
                            "Note: technician's home zone differs from the job's zone".yellow()
                        );
                    }
                }
                Err(AssignTechnicianError::Conflict { conflicts, .. }) => {
                    exit_with_conflicts("Technician is already booked at that time", &conflicts)
                }
                Err(e) => exit_with(e),
            }
        }
        Commands::Unassign { job_number } => {
            let params = AssignTechnicianParameters {
                job_number,
                technician: None,
                force: false,
            };
            match assign_technician(&mut store, &storage, params) {
                Ok(outcome) if !outcome.assigned => {
                    println!("Job #{} is already unassigned", job_number)
                }
                Ok(_) => println!("✓ Job #{} unassigned", job_number),
                Err(e) => exit_with(e),
            }
        }
        Commands::Reschedule {
            job_number,
            start,
            end,
            force,
        } => {
            let params = UpdateJobTimeParameters {
                job_number,
                start,
                end,
                force,
            };

            match update_job_time(&mut store, &storage, &boundaries, params) {
                Ok(outcome) if !outcome.updated => {
                    println!("Job #{} already has that window", job_number)
                }
                Ok(outcome) => {
                    println!(
                        "✓ Job #{} rescheduled: {}",
                        job_number,
                        ui::format_window(&outcome.job)
                    );
                }
                Err(UpdateJobTimeError::Conflict { conflicts, .. }) => {
                    exit_with_conflicts("Technician is already booked at that time", &conflicts)
                }
                Err(e) => exit_with(e),
            }
        }
        Commands::Start { job_number } => {
            match start_job(&mut store, &storage, ChangeStatusParameters { job_number }) {
                Ok(job) => println!("✓ Job #{} started: {}", job.job_number, job.customer_name),
                Err(e) => exit_with(e),
            }
        }
        Commands::Done { job_number } => {
            match complete_job(&mut store, &storage, ChangeStatusParameters { job_number }) {
                Ok(job) => println!("✓ Job #{} completed: {}", job.job_number, job.customer_name),
                Err(e) => exit_with(e),
            }
        }
        Commands::Cancel { job_number } => {
            match cancel_job(&mut store, &storage, ChangeStatusParameters { job_number }) {
                Ok(job) => println!("✓ Job #{} cancelled: {}", job.job_number, job.customer_name),
                Err(e) => exit_with(e),
            }
        }
        Commands::Tech(TechCommands::New { name, zone }) => {
            let params = CreateTechnicianParameters { name, zone };
            match create_technician(&mut store, &storage, params) {
                Ok(technician) => {
                    println!(
                        "✓ Technician {} created with slug {}",
                        technician.name, technician.slug
                    );
                }
                Err(e) => exit_with(e),
            }
        }
        Commands::Tech(TechCommands::List) => {
            let mut technicians: Vec<_> = store.technicians.iter().collect();

            if technicians.is_empty() {
                println!("No technicians found");
            } else {
                technicians.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

                println!(
                    "{} ({} active)\n",
                    "TECHNICIANS".cyan(),
                    store.active_technicians().count()
                );
                for technician in technicians {
                    let open_jobs = store
                        .jobs
                        .iter()
                        .filter(|j| j.technician_id == Some(technician.id) && !j.is_terminal())
                        .count();
                    let name = if technician.active {
                        technician.name.bold()
                    } else {
                        format!("{} (inactive)", technician.name).dimmed()
                    };

                    println!("{} {}", "•".green(), name);
                    if let Some(zone) = &technician.zone {
                        println!("    {} {}", "Zone:".dimmed(), zone.blue());
                    }
                    println!(
                        "    {} {}",
                        open_jobs.to_string().dimmed(),
                        (if open_jobs == 1 { "open job" } else { "open jobs" }).dimmed()
                    );
                    println!();
                }
            }
        }
        Commands::Tech(TechCommands::Deactivate { name }) => {
            let params = DeactivateTechnicianParameters { name };
            match deactivate_technician(&mut store, &storage, params) {
                Ok(result) => {
                    println!("✓ Technician deactivated: {}", result.technician.name);
                    if !result.open_jobs.is_empty() {
                        let numbers: Vec<String> =
                            result.open_jobs.iter().map(|n| format!("#{}", n)).collect();
                        println!("  └─ still assigned to {}", numbers.join(", "));
                    }
                }
                Err(e) => exit_with(e),
            }
        }
    }
}
