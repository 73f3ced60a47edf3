/// Applied to every connection before `SCHEMA`. SQLite does not enforce
/// foreign keys (and therefore cascades) unless this is on.
pub const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
";

pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS patients (
        patient_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        date_of_birth DATE NOT NULL,
        gender TEXT NOT NULL,
        phone TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        address TEXT,
        CONSTRAINT patients_gender_check CHECK (gender IN ('Male', 'Female', 'Other'))
    );

    CREATE TABLE IF NOT EXISTS doctors (
        doctor_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        specialty TEXT NOT NULL,
        phone TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS appointments (
        appointment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        doctor_id INTEGER NOT NULL,
        appointment_date DATE NOT NULL,
        appointment_time TIME NOT NULL,
        status TEXT NOT NULL DEFAULT 'Scheduled',
        FOREIGN KEY(patient_id) REFERENCES patients(patient_id) ON DELETE CASCADE,
        FOREIGN KEY(doctor_id) REFERENCES doctors(doctor_id) ON DELETE CASCADE,
        CONSTRAINT appointments_status_check
            CHECK (status IN ('Scheduled', 'Completed', 'Canceled'))
    );

    CREATE TABLE IF NOT EXISTS medical_records (
        record_id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL UNIQUE,
        height DECIMAL(5,2),
        weight DECIMAL(5,2),
        blood_type TEXT,
        allergies TEXT,
        medication_history TEXT,
        FOREIGN KEY(patient_id) REFERENCES patients(patient_id) ON DELETE CASCADE,
        CONSTRAINT medical_records_height_check
            CHECK (height IS NULL OR (height > -999.995 AND height < 999.995)),
        CONSTRAINT medical_records_weight_check
            CHECK (weight IS NULL OR (weight > -999.995 AND weight < 999.995))
    );

    CREATE TABLE IF NOT EXISTS prescriptions (
        prescription_id INTEGER PRIMARY KEY AUTOINCREMENT,
        doctor_id INTEGER NOT NULL,
        patient_id INTEGER NOT NULL,
        medication_name TEXT NOT NULL,
        dosage TEXT NOT NULL,
        instructions TEXT,
        prescription_date DATE NOT NULL,
        FOREIGN KEY(doctor_id) REFERENCES doctors(doctor_id) ON DELETE CASCADE,
        FOREIGN KEY(patient_id) REFERENCES patients(patient_id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id);
    CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id);
    CREATE INDEX IF NOT EXISTS idx_prescriptions_doctor ON prescriptions(doctor_id);
";

/// Table names, parents before children.
pub const TABLES: [&str; 5] = [
    "patients",
    "doctors",
    "medical_records",
    "appointments",
    "prescriptions",
];

/// Named CHECK constraints guarding enumerated columns, with the column each
/// one guards.
pub const ENUM_CHECKS: [(&str, &str); 2] = [
    ("patients_gender_check", "patients.gender"),
    ("appointments_status_check", "appointments.status"),
];

/// Named CHECK constraints keeping DECIMAL(5,2) columns in range. The bounds
/// are the values that still round to below 1000 at two places.
pub const RANGE_CHECKS: [(&str, &str); 2] = [
    ("medical_records_height_check", "medical_records.height"),
    ("medical_records_weight_check", "medical_records.weight"),
];
