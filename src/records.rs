//! Medical-record eligibility — a read-only projection over appointment
//! status, plus the cross-validated record creation path.
//!
//! Eligibility is derived, never stored: an appointment may receive a
//! record iff its status is `Confirmed` or `Completed` and no record is
//! attached yet (records are one-to-one with appointments).

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::db::repository::{
    appointment_ids_with_record, get_all_appointments, get_appointment,
    get_medical_record_by_appointment, insert_medical_record,
};
use crate::models::{Appointment, MedicalRecord, NewMedicalRecord, Page};
use crate::scheduling::SchedulingError;

/// Appointments currently able to receive a medical record.
pub fn list_eligible_for_record(conn: &Connection) -> Result<Vec<Appointment>, SchedulingError> {
    let with_record: HashSet<Uuid> =
        appointment_ids_with_record(conn)?.into_iter().collect();

    let mut eligible = Vec::new();
    let mut page = Page { number: 1, size: 100 };
    loop {
        let batch = get_all_appointments(conn, page)?;
        let done = (batch.len() as u32) < page.size;
        eligible.extend(
            batch
                .into_iter()
                .filter(|a| a.status.record_eligible() && !with_record.contains(&a.id)),
        );
        if done {
            break;
        }
        page.number += 1;
    }
    Ok(eligible)
}

/// Attach a record to an appointment. The record's patient and
/// practitioner must match the appointment's; a mismatch is a business
/// rule violation, not a not-found.
pub fn create_record(
    conn: &Connection,
    request: NewMedicalRecord,
) -> Result<MedicalRecord, SchedulingError> {
    let appt = get_appointment(conn, &request.appointment_id)?.ok_or(
        SchedulingError::AppointmentNotFound { id: request.appointment_id },
    )?;

    if request.patient_id != appt.patient_id {
        return Err(SchedulingError::RecordMismatch { field: "patient_id" });
    }
    if request.practitioner_id != appt.practitioner_id {
        return Err(SchedulingError::RecordMismatch { field: "practitioner_id" });
    }
    if !appt.status.record_eligible() {
        return Err(SchedulingError::RecordNotAllowed {
            appointment_id: appt.id,
            status: appt.status,
        });
    }
    if get_medical_record_by_appointment(conn, &appt.id)?.is_some() {
        return Err(SchedulingError::RecordExists { appointment_id: appt.id });
    }

    let record = MedicalRecord {
        id: Uuid::new_v4(),
        appointment_id: request.appointment_id,
        patient_id: request.patient_id,
        practitioner_id: request.practitioner_id,
        diagnosis: request.diagnosis,
        prescription: request.prescription,
        notes: request.notes,
        created_at: Utc::now(),
    };

    insert_medical_record(conn, &record).map_err(|e| {
        // One-record-per-appointment is also enforced by the UNIQUE index;
        // a concurrent writer losing the race lands here.
        if e.is_unique_violation_on("medical_records.appointment_id") {
            SchedulingError::RecordExists { appointment_id: record.appointment_id }
        } else {
            e.into()
        }
    })?;

    info!(record = %record.id, appointment = %record.appointment_id, "Medical record created");
    Ok(record)
}

/// The record attached to an appointment, if any.
pub fn find_record_by_appointment(
    conn: &Connection,
    appointment_id: Uuid,
) -> Result<Option<MedicalRecord>, SchedulingError> {
    Ok(get_medical_record_by_appointment(conn, &appointment_id)?)
}
