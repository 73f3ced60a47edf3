//! Clinic booking schema on SQLite: patients, doctors, appointments,
//! medical records and prescriptions, with unique, foreign-key, cascade and
//! enumerated-value constraints enforced by the database and surfaced as
//! typed errors.

pub mod database;
pub mod ingest;
pub mod utils;
