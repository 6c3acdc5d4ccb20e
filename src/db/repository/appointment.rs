use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{instant_from_sql, instant_to_sql, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentKind, AppointmentStatus, Page, ACTIVE_STATUS_SQL};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, practitioner_id, scheduled_at, kind, status, notes, created_at, updated_at";

/// Raw row before enum/uuid/timestamp decoding.
struct AppointmentRow {
    id: String,
    patient_id: String,
    practitioner_id: String,
    scheduled_at: String,
    kind: String,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        practitioner_id: row.get(2)?,
        scheduled_at: row.get(3)?,
        kind: row.get(4)?,
        status: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn decode_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        practitioner_id: parse_uuid(&row.practitioner_id)?,
        scheduled_at: instant_from_sql("scheduled_at", &row.scheduled_at)?,
        kind: AppointmentKind::from_str(&row.kind)?,
        status: AppointmentStatus::from_str(&row.status)?,
        notes: row.notes,
        created_at: instant_from_sql("created_at", &row.created_at)?,
        updated_at: instant_from_sql("updated_at", &row.updated_at)?,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments
         (id, patient_id, practitioner_id, scheduled_at, kind, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.practitioner_id.to_string(),
            instant_to_sql(&appt.scheduled_at),
            appt.kind.as_str(),
            appt.status.as_str(),
            appt.notes,
            instant_to_sql(&appt.created_at),
            instant_to_sql(&appt.updated_at),
        ],
    )?;
    Ok(())
}

/// Persist a new snapshot of an existing appointment. Identity columns
/// (patient, practitioner, created_at) never change after creation and are
/// deliberately absent from the SET list.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments
         SET scheduled_at = ?1, kind = ?2, status = ?3, notes = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            instant_to_sql(&appt.scheduled_at),
            appt.kind.as_str(),
            appt.status.as_str(),
            appt.notes,
            instant_to_sql(&appt.updated_at),
            appt.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: appt.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
    ))?;

    match stmt.query_row(params![id.to_string()], read_row) {
        Ok(row) => Ok(Some(decode_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointments_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = ?1 ORDER BY scheduled_at ASC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], read_row)?;
    collect_rows(rows)
}

pub fn get_appointments_by_practitioner(
    conn: &Connection,
    practitioner_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practitioner_id = ?1 ORDER BY scheduled_at ASC"
    ))?;
    let rows = stmt.query_map(params![practitioner_id.to_string()], read_row)?;
    collect_rows(rows)
}

pub fn get_appointments_by_date_range(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE scheduled_at >= ?1 AND scheduled_at <= ?2
         ORDER BY scheduled_at ASC"
    ))?;
    let rows = stmt.query_map(
        params![instant_to_sql(&start), instant_to_sql(&end)],
        read_row,
    )?;
    collect_rows(rows)
}

pub fn get_all_appointments(conn: &Connection, page: Page) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         ORDER BY scheduled_at ASC LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt.query_map(params![page.size, page.offset()], read_row)?;
    collect_rows(rows)
}

/// The availability predicate: true iff no appointment for this
/// practitioner at this exact instant is in a slot-occupying status.
/// `excluding` lets a reschedule skip the appointment's own row.
pub fn slot_is_free(
    conn: &Connection,
    practitioner_id: &Uuid,
    when: DateTime<Utc>,
    excluding: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let occupied: i64 = match excluding {
        None => conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM appointments
                 WHERE practitioner_id = ?1 AND scheduled_at = ?2
                   AND status IN {ACTIVE_STATUS_SQL}"
            ),
            params![practitioner_id.to_string(), instant_to_sql(&when)],
            |row| row.get(0),
        )?,
        Some(id) => conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM appointments
                 WHERE practitioner_id = ?1 AND scheduled_at = ?2
                   AND status IN {ACTIVE_STATUS_SQL} AND id != ?3"
            ),
            params![
                practitioner_id.to_string(),
                instant_to_sql(&when),
                id.to_string()
            ],
            |row| row.get(0),
        )?,
    };
    Ok(occupied == 0)
}

/// Hard delete, outside the state machine (administrative removal).
pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn collect_rows<I>(rows: I) -> Result<Vec<Appointment>, DatabaseError>
where
    I: Iterator<Item = rusqlite::Result<AppointmentRow>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_row(row?)?);
    }
    Ok(out)
}
