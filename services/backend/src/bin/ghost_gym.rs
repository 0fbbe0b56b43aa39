//! services/backend/src/bin/ghost_gym.rs
//!
//! Administrative entry point: storage status, migration and data
//! export/import. Every command prints JSON on stdout.

use backend_lib::{config::Config, error::ApiError, state::AppState};
use clap::{Parser, Subcommand};
use ghost_gym_core::catalog::ExerciseFilters;
use ghost_gym_core::domain::Identity;
use ghost_gym_core::migration::MigrationOptions;
use ghost_gym_core::router::ImportBundle;
use ghost_gym_core::PortError;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ghost-gym", version, about = "Ghost Gym storage administration")]
struct Cli {
    /// Bearer token of the user to act as. Omit to act as an anonymous user.
    #[arg(long, env = "GHOST_GYM_TOKEN", global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Which store the caller is routed to.
    Status,
    /// Workout and program totals of the routed store.
    Stats,
    /// Whether local data can be migrated to the caller's account.
    Eligibility,
    /// Backs up local data and migrates it to the caller's account.
    Migrate {
        #[arg(long)]
        clear_local: bool,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Where the caller's data lives after (or before) migrating.
    MigrationStatus,
    /// Restores local data from a backup. Remote data is left untouched.
    Rollback {
        #[arg(long)]
        backup: Option<String>,
    },
    /// Writes a backup of the local store.
    Backup,
    /// Lists local backups.
    Backups,
    /// Exports the caller's workouts and programs.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Imports workouts and programs from an export file.
    Import { file: PathBuf },
    /// Ranked search over the exercise catalog.
    SearchExercises {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        muscle_group: Option<String>,
        #[arg(long)]
        equipment: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ApiError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require(identity: Option<&Identity>) -> Result<&Identity, ApiError> {
    identity.ok_or(ApiError::Port(PortError::Unauthorized))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    // --- 2. Wire the Services ---
    let state = AppState::build(config).await?;
    let identity = state.authenticate(cli.token.as_deref()).await?;
    let identity = identity.as_ref();

    // --- 3. Run the Command ---
    match cli.command {
        Command::Status => print_json(&state.router.status(identity)),
        Command::Stats => print_json(&state.router.stats(identity).await?),
        Command::Eligibility => {
            let identity = require(identity)?;
            print_json(&state.migration.check_eligibility(identity).await)
        }
        Command::Migrate {
            clear_local,
            display_name,
        } => {
            let identity = require(identity)?;
            let plan = state.migration.prepare().await?;
            let options = MigrationOptions {
                clear_local_after_success: clear_local,
                display_name,
            };
            print_json(&state.migration.execute(identity, &plan, &options).await?)
        }
        Command::MigrationStatus => {
            let identity = require(identity)?;
            print_json(&state.migration.status(identity).await?)
        }
        Command::Rollback { backup } => {
            let identity = require(identity)?;
            print_json(&state.migration.rollback(identity, backup.as_deref()).await?)
        }
        Command::Backup => print_json(&serde_json::json!({
            "backup": state.local.backup().await?
        })),
        Command::Backups => print_json(&state.local.list_backups().await?),
        Command::Export { out } => {
            let bundle = state.router.export(identity).await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, serde_json::to_vec_pretty(&bundle)?).await?;
                    print_json(&serde_json::json!({
                        "exported_to": path.display().to_string(),
                        "workouts": bundle.workouts.len(),
                        "programs": bundle.programs.len(),
                    }))
                }
                None => print_json(&bundle),
            }
        }
        Command::Import { file } => {
            let bytes = tokio::fs::read(&file).await?;
            let bundle: ImportBundle = serde_json::from_slice(&bytes)?;
            print_json(&state.router.import(identity, bundle).await?)
        }
        Command::SearchExercises {
            query,
            limit,
            muscle_group,
            equipment,
            difficulty,
        } => {
            let filters = ExerciseFilters {
                muscle_group,
                equipment,
                difficulty,
            };
            print_json(&state.catalog.search(identity, &query, &filters, limit).await?)
        }
    }
}
