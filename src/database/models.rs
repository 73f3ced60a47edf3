use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::database::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| DbError::EnumeratedValue {
                field: "patients.gender".into(),
                value: Some(s.to_string()),
            })
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: DbError| FromSqlError::Other(Box::new(e)))
    }
}

/// Appointment status. Any status may be replaced by any other; no
/// transition rules apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DbError::EnumeratedValue {
                field: "appointments.status".into(),
                value: Some(s.to_string()),
            })
    }
}

impl ToSql for AppointmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AppointmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: DbError| FromSqlError::Other(Box::new(e)))
    }
}

/// A DECIMAL(5,2) quantity: two fractional digits, magnitude below 1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Measurement(Decimal);

impl Measurement {
    pub const SCALE: u32 = 2;
    pub const LIMIT: i64 = 1000;

    /// Rounds half away from zero to two places, then checks the range.
    pub fn new(value: Decimal) -> Result<Self, DbError> {
        let mut rounded =
            value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero);
        if rounded.abs() >= Decimal::from(Self::LIMIT) {
            return Err(DbError::InvalidValue {
                field: "measurement",
                reason: format!("{value} does not fit DECIMAL(5,2)"),
            });
        }
        rounded.rescale(Self::SCALE);
        Ok(Self(rounded))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Measurement {
    type Error = DbError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Measurement::new(value)
    }
}

impl From<Measurement> for Decimal {
    fn from(m: Measurement) -> Self {
        m.0
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Measurement {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| DbError::InvalidValue {
            field: "measurement",
            reason: e.to_string(),
        })?;
        Measurement::new(value)
    }
}

impl ToSql for Measurement {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_f64().map(ToSqlOutput::from).ok_or_else(|| {
            rusqlite::Error::ToSqlConversionFailure(
                format!("{} is not representable", self.0).into(),
            )
        })
    }
}

impl FromSql for Measurement {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        // NUMERIC affinity stores whole values as integers.
        let decimal = match value {
            ValueRef::Integer(i) => Decimal::from(i),
            ValueRef::Real(f) => Decimal::from_f64(f).ok_or(FromSqlError::InvalidType)?,
            ValueRef::Text(_) => {
                return value
                    .as_str()?
                    .parse()
                    .map_err(|e: DbError| FromSqlError::Other(Box::new(e)))
            }
            _ => return Err(FromSqlError::InvalidType),
        };
        Measurement::new(decimal).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: i64,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: i64,
    pub name: String,
    pub specialty: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialty: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    #[serde(default)]
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub record_id: i64,
    pub patient_id: i64,
    pub height: Option<Measurement>,
    pub weight: Option<Measurement>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medication_history: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMedicalRecord {
    pub patient_id: i64,
    #[serde(default)]
    pub height: Option<Measurement>,
    #[serde(default)]
    pub weight: Option<Measurement>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medication_history: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub prescription_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub medication_name: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub prescription_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrescription {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub medication_name: String,
    pub dosage: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub prescription_date: NaiveDate,
}

/// Rows removed alongside a deleted patient or doctor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub appointments: usize,
    pub medical_records: usize,
    pub prescriptions: usize,
}

// Seed batches. Children name their parents by position in the batch
// (`patient`, `doctor`) since ids are only assigned on insert.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicBatch {
    #[serde(default)]
    pub patients: Vec<NewPatient>,
    #[serde(default)]
    pub doctors: Vec<NewDoctor>,
    #[serde(default)]
    pub medical_records: Vec<BatchMedicalRecord>,
    #[serde(default)]
    pub appointments: Vec<BatchAppointment>,
    #[serde(default)]
    pub prescriptions: Vec<BatchPrescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMedicalRecord {
    pub patient: usize,
    #[serde(default)]
    pub height: Option<Measurement>,
    #[serde(default)]
    pub weight: Option<Measurement>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medication_history: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAppointment {
    pub patient: usize,
    pub doctor: usize,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    #[serde(default)]
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrescription {
    pub doctor: usize,
    pub patient: usize,
    pub medication_name: String,
    pub dosage: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub prescription_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub patients: usize,
    pub doctors: usize,
    pub medical_records: usize,
    pub appointments: usize,
    pub prescriptions: usize,
}

/// Every row of every table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicSnapshot {
    pub patients: Vec<Patient>,
    pub doctors: Vec<Doctor>,
    pub medical_records: Vec<MedicalRecord>,
    pub appointments: Vec<Appointment>,
    pub prescriptions: Vec<Prescription>,
}
