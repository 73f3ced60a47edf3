use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clinic_db::database::models::AppointmentStatus;
use clinic_db::database::schema::SCHEMA;
use clinic_db::database::ClinicRepository;
use clinic_db::ingest::loader;
use clinic_db::utils::config::{self, ConfigSource, DatabaseConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file; overrides CLINIC_DB_PATH and .env
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database (idempotent) and remember its path in .env
    Init,
    /// Print the schema DDL
    Schema,
    /// Load a JSON seed file in a single transaction
    Import { file: PathBuf },
    /// Print every table as JSON
    Export,
    /// Print row counts per table
    Stats,
    /// Delete a patient and everything that depends on them
    DeletePatient { id: i64 },
    /// Delete a doctor and everything that depends on them
    DeleteDoctor { id: i64 },
    /// Set an appointment's status (Scheduled, Completed, Canceled)
    SetStatus { appointment_id: i64, status: String },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let db_path = args.db_path;

    match args.command {
        Command::Schema => {
            println!("{}", SCHEMA.trim());
        }
        Command::Init => {
            let (_, db) = open_database(db_path)?;
            if db.source != ConfigSource::EnvFile {
                config::save_to_env(Path::new(config::ENV_FILE), &db.path)?;
                info!("Saved database path to {}", config::ENV_FILE);
            }
            info!("Database ready at {:?}", db.path);
        }
        Command::Import { file } => {
            let batch = loader::load_batch(&file)?;
            let (mut repo, _) = open_database(db_path)?;
            match repo.import(&batch) {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(e) => {
                    error!("Import failed, nothing was written: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Export => {
            let (repo, _) = open_database(db_path)?;
            let snapshot = repo.export().context("Failed to export database")?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Stats => {
            let (repo, _) = open_database(db_path)?;
            for (table, count) in repo.counts()? {
                println!("{:<16} {}", table, count);
            }
        }
        Command::DeletePatient { id } => {
            let (mut repo, _) = open_database(db_path)?;
            let report = repo.delete_patient(id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::DeleteDoctor { id } => {
            let (mut repo, _) = open_database(db_path)?;
            let report = repo.delete_doctor(id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SetStatus { appointment_id, status } => {
            let status: AppointmentStatus = status.parse()?;
            let (repo, _) = open_database(db_path)?;
            repo.set_appointment_status(appointment_id, status)?;
            info!("Appointment {} is now {}", appointment_id, status);
        }
    }

    Ok(())
}

fn open_database(flag: Option<PathBuf>) -> Result<(ClinicRepository, DatabaseConfig)> {
    let db = config::resolve_db_path(flag)?;
    let repo = ClinicRepository::open(&db.path)
        .with_context(|| format!("Failed to open database at {:?}", db.path))?;
    Ok((repo, db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_command_does_not_open_database() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("clinic.db");
        let args = Args::try_parse_from([
            "clinic-db",
            "schema",
            "--db-path",
            db_path.to_str().unwrap(),
        ])?;

        run(args)?;
        assert!(!db_path.exists());
        Ok(())
    }

    #[test]
    fn test_stats_command_creates_database() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("clinic.db");
        let args =
            Args::try_parse_from(["clinic-db", "--db-path", db_path.to_str().unwrap(), "stats"])?;

        run(args)?;
        assert!(db_path.exists());
        Ok(())
    }
}
