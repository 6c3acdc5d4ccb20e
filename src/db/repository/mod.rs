//! Repository layer — entity-scoped database operations.
//!
//! Each sub-module holds the SQL for one table, as free functions over a
//! `rusqlite::Connection`. The trait seams below re-expose the narrow
//! contracts the scheduling orchestrator consumes, so it can be exercised
//! against in-memory fakes as well as the real store.

mod appointment;
mod medical_record;
mod patient;
mod practitioner;

pub use appointment::*;
pub use medical_record::*;
pub use patient::*;
pub use practitioner::*;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{Appointment, Page, Patient, Practitioner};

/// Lookup seam for patient reference data.
pub trait PatientLookup {
    fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError>;
}

/// Lookup seam for practitioner reference data.
pub trait PractitionerLookup {
    fn find_practitioner(&self, id: Uuid) -> Result<Option<Practitioner>, DatabaseError>;
}

/// Persistence seam for appointments.
pub trait AppointmentStore {
    fn insert(&self, appt: &Appointment) -> Result<(), DatabaseError>;
    fn update(&self, appt: &Appointment) -> Result<(), DatabaseError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;
    fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;
    fn find_by_practitioner(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Vec<Appointment>, DatabaseError>;
    fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DatabaseError>;
    fn find_all(&self, page: Page) -> Result<Vec<Appointment>, DatabaseError>;
    fn is_slot_free(
        &self,
        practitioner_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;
    fn is_slot_free_excluding(
        &self,
        practitioner_id: Uuid,
        when: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<bool, DatabaseError>;
    fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
}

impl PatientLookup for Connection {
    fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, DatabaseError> {
        get_patient(self, &id)
    }
}

impl PractitionerLookup for Connection {
    fn find_practitioner(&self, id: Uuid) -> Result<Option<Practitioner>, DatabaseError> {
        get_practitioner(self, &id)
    }
}

impl AppointmentStore for Connection {
    fn insert(&self, appt: &Appointment) -> Result<(), DatabaseError> {
        insert_appointment(self, appt)
    }

    fn update(&self, appt: &Appointment) -> Result<(), DatabaseError> {
        update_appointment(self, appt)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        get_appointment(self, &id)
    }

    fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        get_appointments_by_patient(self, &patient_id)
    }

    fn find_by_practitioner(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        get_appointments_by_practitioner(self, &practitioner_id)
    }

    fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        get_appointments_by_date_range(self, start, end)
    }

    fn find_all(&self, page: Page) -> Result<Vec<Appointment>, DatabaseError> {
        get_all_appointments(self, page)
    }

    fn is_slot_free(
        &self,
        practitioner_id: Uuid,
        when: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        slot_is_free(self, &practitioner_id, when, None)
    }

    fn is_slot_free_excluding(
        &self,
        practitioner_id: Uuid,
        when: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<bool, DatabaseError> {
        slot_is_free(self, &practitioner_id, when, Some(&excluding))
    }

    fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        delete_appointment(self, &id)
    }
}

/// Canonical storage form for instants: RFC 3339 in UTC. All writes and
/// slot comparisons go through this, so exact-equality matching on the
/// column is exact-equality matching on the instant.
pub(crate) fn instant_to_sql(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn instant_from_sql(field: &str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp in {field}: {e}")))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
