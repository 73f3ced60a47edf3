use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::database::error::DbError;
use crate::database::models::*;
use crate::database::schema::{CONNECTION_PRAGMAS, SCHEMA, TABLES};

/// Owns the SQLite connection. Every write goes through SQLite's own
/// constraint checks; the repository only maps their failures to `DbError`.
pub struct ClinicRepository {
    conn: Connection,
}

impl ClinicRepository {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        info!("Opened clinic database at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        debug!("Schema applied");
        Ok(Self { conn })
    }

    // Patients

    pub fn insert_patient(&self, patient: &NewPatient) -> Result<i64, DbError> {
        insert_patient(&self.conn, patient)
    }

    pub fn get_patient(&self, patient_id: i64) -> Result<Option<Patient>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT patient_id, name, date_of_birth, gender, phone, email, address
                 FROM patients WHERE patient_id = ?1",
                params![patient_id],
                patient_from_row,
            )
            .optional()?)
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT patient_id, name, date_of_birth, gender, phone, email, address
             FROM patients ORDER BY patient_id",
        )?;
        let rows = stmt.query_map([], patient_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Deletes the patient; SQLite cascades to their appointments, medical
    /// record and prescriptions.
    pub fn delete_patient(&mut self, patient_id: i64) -> Result<CascadeReport, DbError> {
        let tx = self.conn.transaction()?;
        let report = CascadeReport {
            appointments: count_where(&tx, "appointments", "patient_id", patient_id)?,
            medical_records: count_where(&tx, "medical_records", "patient_id", patient_id)?,
            prescriptions: count_where(&tx, "prescriptions", "patient_id", patient_id)?,
        };
        let deleted =
            tx.execute("DELETE FROM patients WHERE patient_id = ?1", params![patient_id])?;
        if deleted == 0 {
            return Err(DbError::NotFound { entity: "patient", id: patient_id });
        }
        tx.commit()?;
        info!("Deleted patient {} ({:?})", patient_id, report);
        Ok(report)
    }

    // Doctors

    pub fn insert_doctor(&self, doctor: &NewDoctor) -> Result<i64, DbError> {
        insert_doctor(&self.conn, doctor)
    }

    pub fn get_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT doctor_id, name, specialty, phone, email FROM doctors WHERE doctor_id = ?1",
                params![doctor_id],
                doctor_from_row,
            )
            .optional()?)
    }

    pub fn list_doctors(&self) -> Result<Vec<Doctor>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT doctor_id, name, specialty, phone, email FROM doctors ORDER BY doctor_id",
        )?;
        let rows = stmt.query_map([], doctor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Deletes the doctor; SQLite cascades to their appointments and
    /// prescriptions.
    pub fn delete_doctor(&mut self, doctor_id: i64) -> Result<CascadeReport, DbError> {
        let tx = self.conn.transaction()?;
        let report = CascadeReport {
            appointments: count_where(&tx, "appointments", "doctor_id", doctor_id)?,
            medical_records: 0,
            prescriptions: count_where(&tx, "prescriptions", "doctor_id", doctor_id)?,
        };
        let deleted = tx.execute("DELETE FROM doctors WHERE doctor_id = ?1", params![doctor_id])?;
        if deleted == 0 {
            return Err(DbError::NotFound { entity: "doctor", id: doctor_id });
        }
        tx.commit()?;
        info!("Deleted doctor {} ({:?})", doctor_id, report);
        Ok(report)
    }

    // Appointments

    /// Overlapping times for the same doctor are accepted.
    pub fn insert_appointment(&self, appointment: &NewAppointment) -> Result<i64, DbError> {
        insert_appointment(&self.conn, appointment)
    }

    pub fn get_appointment(&self, appointment_id: i64) -> Result<Option<Appointment>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT appointment_id, patient_id, doctor_id,
                 appointment_date, appointment_time, status
                 FROM appointments WHERE appointment_id = ?1",
                params![appointment_id],
                appointment_from_row,
            )
            .optional()?)
    }

    pub fn appointments_for_patient(&self, patient_id: i64) -> Result<Vec<Appointment>, DbError> {
        self.appointments_where("patient_id = ?1", Some(patient_id))
    }

    pub fn appointments_for_doctor(&self, doctor_id: i64) -> Result<Vec<Appointment>, DbError> {
        self.appointments_where("doctor_id = ?1", Some(doctor_id))
    }

    pub fn list_appointments(&self) -> Result<Vec<Appointment>, DbError> {
        self.appointments_where("1 = 1", None)
    }

    fn appointments_where(
        &self,
        filter: &str,
        key: Option<i64>,
    ) -> Result<Vec<Appointment>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT appointment_id, patient_id, doctor_id,
                 appointment_date, appointment_time, status
             FROM appointments WHERE {filter}
             ORDER BY appointment_date, appointment_time, appointment_id"
        ))?;
        let rows = match key {
            Some(key) => stmt.query_map(params![key], appointment_from_row)?,
            None => stmt.query_map([], appointment_from_row)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Any status may replace any other.
    pub fn set_appointment_status(
        &self,
        appointment_id: i64,
        status: AppointmentStatus,
    ) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE appointments SET status = ?1 WHERE appointment_id = ?2",
            params![status, appointment_id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound { entity: "appointment", id: appointment_id });
        }
        debug!("Appointment {} set to {}", appointment_id, status);
        Ok(())
    }

    pub fn delete_appointment(&self, appointment_id: i64) -> Result<(), DbError> {
        delete_by_id(&self.conn, "appointments", "appointment_id", "appointment", appointment_id)
    }

    // Medical records

    pub fn insert_medical_record(&self, record: &NewMedicalRecord) -> Result<i64, DbError> {
        insert_medical_record(&self.conn, record)
    }

    pub fn medical_record_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Option<MedicalRecord>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT record_id, patient_id, height, weight,
                 blood_type, allergies, medication_history
                 FROM medical_records WHERE patient_id = ?1",
                params![patient_id],
                medical_record_from_row,
            )
            .optional()?)
    }

    pub fn list_medical_records(&self) -> Result<Vec<MedicalRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, patient_id, height, weight,
                 blood_type, allergies, medication_history
             FROM medical_records ORDER BY record_id",
        )?;
        let rows = stmt.query_map([], medical_record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_medical_record(&self, record_id: i64) -> Result<(), DbError> {
        delete_by_id(&self.conn, "medical_records", "record_id", "medical record", record_id)
    }

    // Prescriptions

    pub fn insert_prescription(&self, prescription: &NewPrescription) -> Result<i64, DbError> {
        insert_prescription(&self.conn, prescription)
    }

    pub fn get_prescription(&self, prescription_id: i64) -> Result<Option<Prescription>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT prescription_id, doctor_id, patient_id, medication_name,
                 dosage, instructions, prescription_date
                 FROM prescriptions WHERE prescription_id = ?1",
                params![prescription_id],
                prescription_from_row,
            )
            .optional()?)
    }

    pub fn prescriptions_for_patient(&self, patient_id: i64) -> Result<Vec<Prescription>, DbError> {
        self.prescriptions_where("patient_id = ?1", Some(patient_id))
    }

    pub fn prescriptions_for_doctor(&self, doctor_id: i64) -> Result<Vec<Prescription>, DbError> {
        self.prescriptions_where("doctor_id = ?1", Some(doctor_id))
    }

    pub fn list_prescriptions(&self) -> Result<Vec<Prescription>, DbError> {
        self.prescriptions_where("1 = 1", None)
    }

    fn prescriptions_where(
        &self,
        filter: &str,
        key: Option<i64>,
    ) -> Result<Vec<Prescription>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT prescription_id, doctor_id, patient_id, medication_name,
                 dosage, instructions, prescription_date
             FROM prescriptions WHERE {filter}
             ORDER BY prescription_date, prescription_id"
        ))?;
        let rows = match key {
            Some(key) => stmt.query_map(params![key], prescription_from_row)?,
            None => stmt.query_map([], prescription_from_row)?,
        };
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_prescription(&self, prescription_id: i64) -> Result<(), DbError> {
        delete_by_id(
            &self.conn,
            "prescriptions",
            "prescription_id",
            "prescription",
            prescription_id,
        )
    }

    // Bulk operations

    /// Inserts the whole batch in one transaction. Any violation rolls back
    /// every row of the batch.
    pub fn import(&mut self, batch: &ClinicBatch) -> Result<ImportSummary, DbError> {
        let tx = self.conn.transaction()?;

        let result = (|| {
            let mut patient_ids = Vec::with_capacity(batch.patients.len());
            for patient in &batch.patients {
                patient_ids.push(insert_patient(&tx, patient)?);
            }

            let mut doctor_ids = Vec::with_capacity(batch.doctors.len());
            for doctor in &batch.doctors {
                doctor_ids.push(insert_doctor(&tx, doctor)?);
            }

            for record in &batch.medical_records {
                insert_medical_record(
                    &tx,
                    &NewMedicalRecord {
                        patient_id: resolve(&patient_ids, record.patient, "patient")?,
                        height: record.height,
                        weight: record.weight,
                        blood_type: record.blood_type.clone(),
                        allergies: record.allergies.clone(),
                        medication_history: record.medication_history.clone(),
                    },
                )?;
            }

            for appointment in &batch.appointments {
                insert_appointment(
                    &tx,
                    &NewAppointment {
                        patient_id: resolve(&patient_ids, appointment.patient, "patient")?,
                        doctor_id: resolve(&doctor_ids, appointment.doctor, "doctor")?,
                        appointment_date: appointment.appointment_date,
                        appointment_time: appointment.appointment_time,
                        status: appointment.status,
                    },
                )?;
            }

            for prescription in &batch.prescriptions {
                insert_prescription(
                    &tx,
                    &NewPrescription {
                        doctor_id: resolve(&doctor_ids, prescription.doctor, "doctor")?,
                        patient_id: resolve(&patient_ids, prescription.patient, "patient")?,
                        medication_name: prescription.medication_name.clone(),
                        dosage: prescription.dosage.clone(),
                        instructions: prescription.instructions.clone(),
                        prescription_date: prescription.prescription_date,
                    },
                )?;
            }

            Ok::<_, DbError>(ImportSummary {
                patients: patient_ids.len(),
                doctors: doctor_ids.len(),
                medical_records: batch.medical_records.len(),
                appointments: batch.appointments.len(),
                prescriptions: batch.prescriptions.len(),
            })
        })();

        match result {
            Ok(summary) => {
                tx.commit()?;
                info!("Imported batch: {:?}", summary);
                Ok(summary)
            }
            Err(e) => {
                // Dropping the transaction rolls it back.
                warn!("Batch import rolled back: {}", e);
                Err(e)
            }
        }
    }

    pub fn export(&self) -> Result<ClinicSnapshot, DbError> {
        Ok(ClinicSnapshot {
            patients: self.list_patients()?,
            doctors: self.list_doctors()?,
            medical_records: self.list_medical_records()?,
            appointments: self.list_appointments()?,
            prescriptions: self.list_prescriptions()?,
        })
    }

    /// Row count per table, parents first.
    pub fn counts(&self) -> Result<Vec<(&'static str, i64)>, DbError> {
        TABLES
            .iter()
            .map(|table| -> Result<(&'static str, i64), DbError> {
                let n: i64 = self
                    .conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
                Ok((*table, n))
            })
            .collect()
    }
}

fn insert_patient(conn: &Connection, patient: &NewPatient) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO patients (name, date_of_birth, gender, phone, email, address)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING patient_id",
        params![
            patient.name,
            patient.date_of_birth,
            patient.gender,
            patient.phone,
            patient.email,
            patient.address
        ],
        |row| row.get(0),
    )?;
    debug!("Inserted patient {}", id);
    Ok(id)
}

fn insert_doctor(conn: &Connection, doctor: &NewDoctor) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO doctors (name, specialty, phone, email)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING doctor_id",
        params![doctor.name, doctor.specialty, doctor.phone, doctor.email],
        |row| row.get(0),
    )?;
    debug!("Inserted doctor {}", id);
    Ok(id)
}

fn insert_appointment(conn: &Connection, appointment: &NewAppointment) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO appointments
         (patient_id, doctor_id, appointment_date, appointment_time, status)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING appointment_id",
        params![
            appointment.patient_id,
            appointment.doctor_id,
            appointment.appointment_date,
            appointment.appointment_time,
            appointment.status
        ],
        |row| row.get(0),
    )?;
    debug!("Inserted appointment {}", id);
    Ok(id)
}

fn insert_medical_record(conn: &Connection, record: &NewMedicalRecord) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO medical_records
         (patient_id, height, weight, blood_type, allergies, medication_history)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING record_id",
        params![
            record.patient_id,
            record.height,
            record.weight,
            record.blood_type,
            record.allergies,
            record.medication_history
        ],
        |row| row.get(0),
    )?;
    debug!("Inserted medical record {}", id);
    Ok(id)
}

fn insert_prescription(conn: &Connection, prescription: &NewPrescription) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO prescriptions
         (doctor_id, patient_id, medication_name, dosage, instructions, prescription_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING prescription_id",
        params![
            prescription.doctor_id,
            prescription.patient_id,
            prescription.medication_name,
            prescription.dosage,
            prescription.instructions,
            prescription.prescription_date
        ],
        |row| row.get(0),
    )?;
    debug!("Inserted prescription {}", id);
    Ok(id)
}

// Table and column names below are always crate constants.

fn delete_by_id(
    conn: &Connection,
    table: &str,
    key: &str,
    entity: &'static str,
    id: i64,
) -> Result<(), DbError> {
    let deleted = conn.execute(&format!("DELETE FROM {table} WHERE {key} = ?1"), params![id])?;
    if deleted == 0 {
        return Err(DbError::NotFound { entity, id });
    }
    Ok(())
}

fn count_where(conn: &Connection, table: &str, column: &str, id: i64) -> Result<usize, DbError> {
    let n: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
        params![id],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

fn resolve(ids: &[i64], index: usize, entity: &str) -> Result<i64, DbError> {
    ids.get(index).copied().ok_or_else(|| {
        DbError::Referential(format!(
            "batch {entity} index {index} is out of range ({} {entity}s in batch)",
            ids.len()
        ))
    })
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        patient_id: row.get(0)?,
        name: row.get(1)?,
        date_of_birth: row.get(2)?,
        gender: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        address: row.get(6)?,
    })
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        doctor_id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
    })
}

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        appointment_id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_date: row.get(3)?,
        appointment_time: row.get(4)?,
        status: row.get(5)?,
    })
}

fn medical_record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        record_id: row.get(0)?,
        patient_id: row.get(1)?,
        height: row.get(2)?,
        weight: row.get(3)?,
        blood_type: row.get(4)?,
        allergies: row.get(5)?,
        medication_history: row.get(6)?,
    })
}

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        prescription_id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        medication_name: row.get(3)?,
        dosage: row.get(4)?,
        instructions: row.get(5)?,
        prescription_date: row.get(6)?,
    })
}
