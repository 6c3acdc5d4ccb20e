use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{instant_from_sql, instant_to_sql, parse_uuid};
use crate::db::DatabaseError;
use crate::models::MedicalRecord;

pub fn insert_medical_record(
    conn: &Connection,
    record: &MedicalRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records
         (id, appointment_id, patient_id, practitioner_id, diagnosis, prescription, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id.to_string(),
            record.appointment_id.to_string(),
            record.patient_id.to_string(),
            record.practitioner_id.to_string(),
            record.diagnosis,
            record.prescription,
            record.notes,
            instant_to_sql(&record.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_medical_record_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, practitioner_id, diagnosis, prescription, notes, created_at
         FROM medical_records WHERE appointment_id = ?1",
    )?;

    let result = stmt.query_row(params![appointment_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    });

    match result {
        Ok((id, appointment_id, patient_id, practitioner_id, diagnosis, prescription, notes, created_at)) => {
            Ok(Some(MedicalRecord {
                id: parse_uuid(&id)?,
                appointment_id: parse_uuid(&appointment_id)?,
                patient_id: parse_uuid(&patient_id)?,
                practitioner_id: parse_uuid(&practitioner_id)?,
                diagnosis,
                prescription,
                notes,
                created_at: instant_from_sql("created_at", &created_at)?,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Appointment ids that already carry a record. Used by the eligibility
/// filter to enforce one-record-per-appointment.
pub fn appointment_ids_with_record(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT appointment_id FROM medical_records")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}
