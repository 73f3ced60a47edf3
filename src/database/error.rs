use rusqlite::ffi;
use thiserror::Error;

use crate::database::schema::{ENUM_CHECKS, RANGE_CHECKS};

/// Everything the clinic database can reject. The four constraint kinds are
/// raised at write time by SQLite and classified from its extended result
/// codes; the rest come from the typed layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("uniqueness violation: {table}.{column} already holds this value")]
    Uniqueness { table: String, column: String },

    #[error("referential violation: {0}")]
    Referential(String),

    #[error("required-field violation: {table}.{column} may not be null")]
    RequiredField { table: String, column: String },

    #[error(
        "enumerated-value violation on {field}{}",
        .value.as_deref().map(|v| format!(": {v:?} is not an allowed value")).unwrap_or_default()
    )]
    EnumeratedValue { field: String, value: Option<String> },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl DbError {
    /// True for the four write-time constraint violations.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Uniqueness { .. }
                | DbError::Referential(_)
                | DbError::RequiredField { .. }
                | DbError::EnumeratedValue { .. }
        )
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        let (code, message) = match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == ffi::ErrorCode::ConstraintViolation =>
            {
                (e.extended_code, msg.clone().unwrap_or_default())
            }
            _ => return DbError::Sqlite(err),
        };

        // Messages look like "UNIQUE constraint failed: patients.phone" or
        // "CHECK constraint failed: appointments_status_check".
        let target = message
            .rsplit_once(": ")
            .map(|(_, t)| t.trim().to_string())
            .unwrap_or_default();

        match code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                let (table, column) = split_column(&target);
                DbError::Uniqueness { table, column }
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => DbError::Referential(message),
            ffi::SQLITE_CONSTRAINT_NOTNULL => {
                let (table, column) = split_column(&target);
                DbError::RequiredField { table, column }
            }
            ffi::SQLITE_CONSTRAINT_CHECK => {
                if let Some((_, column)) = ENUM_CHECKS.iter().find(|(name, _)| *name == target) {
                    DbError::EnumeratedValue { field: column.to_string(), value: None }
                } else if let Some((_, column)) =
                    RANGE_CHECKS.iter().find(|(name, _)| *name == target)
                {
                    DbError::InvalidValue {
                        field: *column,
                        reason: "value does not fit DECIMAL(5,2)".into(),
                    }
                } else {
                    DbError::Sqlite(err)
                }
            }
            _ => DbError::Sqlite(err),
        }
    }
}

// "patients.phone" -> ("patients", "phone"). Composite keys keep the first column.
fn split_column(target: &str) -> (String, String) {
    let first = target.split(", ").next().unwrap_or(target);
    match first.split_once('.') {
        Some((table, column)) => (table.to_string(), column.to_string()),
        None => (String::new(), first.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint_failure(extended_code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(extended_code), Some(message.to_string()))
    }

    #[test]
    fn test_classifies_unique_failure() {
        let err = DbError::from(constraint_failure(
            ffi::SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: doctors.email",
        ));
        match err {
            DbError::Uniqueness { table, column } => {
                assert_eq!(table, "doctors");
                assert_eq!(column, "email");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classifies_named_check_as_enumerated_value() {
        let err = DbError::from(constraint_failure(
            ffi::SQLITE_CONSTRAINT_CHECK,
            "CHECK constraint failed: appointments_status_check",
        ));
        assert!(matches!(
            err,
            DbError::EnumeratedValue { ref field, value: None } if field == "appointments.status"
        ));
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_classifies_range_check_as_invalid_value() {
        let err = DbError::from(constraint_failure(
            ffi::SQLITE_CONSTRAINT_CHECK,
            "CHECK constraint failed: medical_records_weight_check",
        ));
        assert!(matches!(err, DbError::InvalidValue { field: "medical_records.weight", .. }));
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn test_unknown_check_passes_through() {
        let err = DbError::from(constraint_failure(
            ffi::SQLITE_CONSTRAINT_CHECK,
            "CHECK constraint failed: some_other_check",
        ));
        assert!(matches!(err, DbError::Sqlite(_)));
    }

    #[test]
    fn test_non_constraint_errors_pass_through() {
        let err = DbError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, DbError::Sqlite(_)));
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn test_enumerated_value_message_names_value() {
        let err = DbError::EnumeratedValue {
            field: "appointments.status".into(),
            value: Some("Pending".into()),
        };
        assert_eq!(
            err.to_string(),
            "enumerated-value violation on appointments.status: \"Pending\" is not an allowed value"
        );
    }
}
