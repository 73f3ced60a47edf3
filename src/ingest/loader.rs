use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::database::models::ClinicBatch;

/// Reads a JSON seed file. Unknown enum literals and missing required
/// fields are rejected here, before anything reaches the database.
pub fn load_batch(path: &Path) -> Result<ClinicBatch> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {:?}", path))?;
    let batch = parse_batch(&raw).with_context(|| format!("Invalid seed file: {:?}", path))?;
    info!(
        "Loaded seed with {} patients, {} doctors, {} records, {} appointments, {} prescriptions",
        batch.patients.len(),
        batch.doctors.len(),
        batch.medical_records.len(),
        batch.appointments.len(),
        batch.prescriptions.len()
    );
    Ok(batch)
}

pub fn parse_batch(raw: &str) -> Result<ClinicBatch> {
    serde_json::from_str(raw).context("Failed to parse clinic batch")
}
