use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

pub const DB_PATH_VAR: &str = "CLINIC_DB_PATH";
pub const DEFAULT_DB_PATH: &str = "clinic.db";
pub const ENV_FILE: &str = ".env";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Flag,
    Environment,
    EnvFile,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub source: ConfigSource,
}

impl DatabaseConfig {
    fn default_path() -> Self {
        DatabaseConfig { path: PathBuf::from(DEFAULT_DB_PATH), source: ConfigSource::Default }
    }
}

/// Main entry point to get the database path.
/// Precedence: command-line flag, environment variable, `.env`, default.
pub fn resolve_db_path(flag: Option<PathBuf>) -> Result<DatabaseConfig> {
    resolve_with(flag, env::var_os(DB_PATH_VAR), Path::new(ENV_FILE))
}

fn resolve_with(
    flag: Option<PathBuf>,
    env_value: Option<OsString>,
    env_file: &Path,
) -> Result<DatabaseConfig> {
    let config = if let Some(path) = flag {
        DatabaseConfig { path, source: ConfigSource::Flag }
    } else if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        DatabaseConfig { path: PathBuf::from(value), source: ConfigSource::Environment }
    } else if env_file.exists() {
        match load_from_env(env_file) {
            Ok(path) => DatabaseConfig { path, source: ConfigSource::EnvFile },
            Err(e) => {
                debug!("Ignoring {:?}: {}", env_file, e);
                DatabaseConfig::default_path()
            }
        }
    } else {
        DatabaseConfig::default_path()
    };

    info!("Database path {:?} (from {:?})", config.path, config.source);
    Ok(config)
}

fn load_from_env(path: &Path) -> Result<PathBuf> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == DB_PATH_VAR && !value.trim().is_empty() {
                return Ok(PathBuf::from(value.trim()));
            }
        }
    }

    Err(anyhow!("No {} entry in {:?}", DB_PATH_VAR, path))
}

/// Writes the database path to `.env`, keeping any other entries.
pub fn save_to_env(path: &Path, db_path: &Path) -> Result<()> {
    let mut lines: Vec<String> = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?
            .lines()
            .filter(|line| {
                line.split_once('=')
                    .map(|(key, _)| key.trim() != DB_PATH_VAR)
                    .unwrap_or(true)
            })
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    lines.push(format!("{}={}", DB_PATH_VAR, db_path.display()));

    let mut file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
