//! Scheduling orchestrator — books, updates, and transitions appointments.
//!
//! Validation order per operation: referenced entities, temporal rule,
//! availability pre-check, entity transition, single persistence write.
//! The availability pre-check is advisory under concurrency; the partial
//! unique index over active (practitioner, instant) pairs is the
//! authoritative conflict signal, and its violation surfaces as
//! [`SchedulingError::SlotTaken`] even when the pre-check passed.

mod routing;

pub use routing::time_actually_changed;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{AppointmentStore, DatabaseError, PatientLookup, PractitionerLookup};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, NewAppointment, Page,
};

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Patient not found: {id}")]
    PatientNotFound { id: Uuid },

    #[error("Practitioner not found: {id}")]
    PractitionerNotFound { id: Uuid },

    #[error("Appointment not found: {id}")]
    AppointmentNotFound { id: Uuid },

    #[error("Requested time {requested} is not strictly in the future")]
    PastSlot { requested: DateTime<Utc> },

    #[error("Practitioner {practitioner_id} already has an active appointment at {at}")]
    SlotTaken {
        practitioner_id: Uuid,
        at: DateTime<Utc>,
    },

    #[error("Status {status:?} cannot be requested directly on an update")]
    UnsupportedStatus { status: AppointmentStatus },

    #[error("Medical record {field} does not match the referenced appointment")]
    RecordMismatch { field: &'static str },

    #[error("Appointment {appointment_id} is not eligible for a medical record ({status:?})")]
    RecordNotAllowed {
        appointment_id: Uuid,
        status: AppointmentStatus,
    },

    #[error("Appointment {appointment_id} already has a medical record")]
    RecordExists { appointment_id: Uuid },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Use-case layer over the repository seams. `S` is the persistence
/// collaborator; `rusqlite::Connection` implements all three seams, and
/// tests may substitute fakes.
pub struct Scheduler<'a, S> {
    store: &'a S,
}

impl<'a, S> Scheduler<'a, S>
where
    S: PatientLookup + PractitionerLookup + AppointmentStore,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Book a new appointment. Fails if the patient or practitioner is
    /// unknown, the instant is not strictly future, or the slot is taken.
    pub fn create(&self, request: NewAppointment) -> Result<Appointment, SchedulingError> {
        self.create_at(request, Utc::now())
    }

    fn create_at(
        &self,
        request: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        self.store
            .find_patient(request.patient_id)?
            .ok_or(SchedulingError::PatientNotFound { id: request.patient_id })?;
        self.store
            .find_practitioner(request.practitioner_id)?
            .ok_or(SchedulingError::PractitionerNotFound { id: request.practitioner_id })?;

        if request.scheduled_at <= now {
            return Err(SchedulingError::PastSlot { requested: request.scheduled_at });
        }
        if !self.store.is_slot_free(request.practitioner_id, request.scheduled_at)? {
            return Err(SchedulingError::SlotTaken {
                practitioner_id: request.practitioner_id,
                at: request.scheduled_at,
            });
        }

        let appt = Appointment::new(
            request.patient_id,
            request.practitioner_id,
            request.scheduled_at,
            request.kind,
            request.notes,
            now,
        )?;

        self.store
            .insert(&appt)
            .map_err(|e| slot_conflict(e, appt.practitioner_id, appt.scheduled_at))?;

        info!(appointment = %appt.id, practitioner = %appt.practitioner_id,
              at = %appt.scheduled_at, "Appointment booked");
        Ok(appt)
    }

    /// Route a partial change set to the correct transition.
    ///
    /// A `when` that actually differs from the stored instant marks the
    /// appointment `Rescheduled` — unless an explicit `status` rides in the
    /// same request, in which case the explicit status wins and the new
    /// instant is carried along.
    pub fn update(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Appointment, SchedulingError> {
        self.update_at(id, changes, Utc::now())
    }

    fn update_at(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.fetch(id)?;

        let next = if routing::time_actually_changed(&current, changes.when) {
            let new_when = changes.when.unwrap_or(current.scheduled_at);
            if new_when <= now {
                return Err(SchedulingError::PastSlot { requested: new_when });
            }
            if !self.store.is_slot_free_excluding(current.practitioner_id, new_when, id)? {
                return Err(SchedulingError::SlotTaken {
                    practitioner_id: current.practitioner_id,
                    at: new_when,
                });
            }

            debug!(appointment = %id, from = %current.scheduled_at, to = %new_when,
                   "Time actually changed, routing through reschedule");
            let moved = current
                .with_changes(changes.kind, changes.notes, now)
                .reschedule(new_when, now)?;
            match changes.status {
                // The time change alone is the reschedule signal.
                None | Some(AppointmentStatus::Rescheduled) => moved,
                Some(status) => routing::apply_status(moved, status, now)?,
            }
        } else {
            let edited = current.with_changes(changes.kind, changes.notes, now);
            match changes.status {
                None => edited,
                Some(status) => routing::apply_status(edited, status, now)?,
            }
        };

        self.persist(next)
    }

    pub fn confirm(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appt = self.fetch(id)?.confirm(Utc::now());
        self.persist(appt)
    }

    pub fn cancel(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appt = self.fetch(id)?.cancel(Utc::now());
        info!(appointment = %id, "Appointment cancelled, slot freed");
        self.persist(appt)
    }

    pub fn complete(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appt = self.fetch(id)?.complete(Utc::now());
        self.persist(appt)
    }

    /// Administrative hard delete; bypasses the state machine.
    pub fn delete(&self, id: Uuid) -> Result<(), SchedulingError> {
        self.fetch(id)?;
        self.store.delete(id)?;
        warn!(appointment = %id, "Appointment hard-deleted");
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.fetch(id)
    }

    pub fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.store.find_by_patient(patient_id)?)
    }

    pub fn list_by_practitioner(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.store.find_by_practitioner(practitioner_id)?)
    }

    pub fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.store.find_by_date_range(start, end)?)
    }

    pub fn list(&self, page: Page) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.store.find_all(page)?)
    }

    fn fetch(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store
            .find_by_id(id)?
            .ok_or(SchedulingError::AppointmentNotFound { id })
    }

    fn persist(&self, appt: Appointment) -> Result<Appointment, SchedulingError> {
        let practitioner_id = appt.practitioner_id;
        let at = appt.scheduled_at;
        self.store
            .update(&appt)
            .map_err(|e| slot_conflict(e, practitioner_id, at))?;
        Ok(appt)
    }
}

/// Map an active-slot unique-index violation to the conflict error; the
/// write is where double-booking is decided under concurrency.
fn slot_conflict(
    err: DatabaseError,
    practitioner_id: Uuid,
    at: DateTime<Utc>,
) -> SchedulingError {
    if err.is_unique_violation_on("appointments.practitioner_id") {
        warn!(practitioner = %practitioner_id, at = %at,
              "Slot conflict surfaced by unique index at write time");
        SchedulingError::SlotTaken { practitioner_id, at }
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_patient, insert_practitioner};
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::models::{AppointmentKind, Patient, Practitioner};
    use chrono::Duration;
    use rusqlite::Connection;

    fn seed_refs(conn: &Connection) -> (Uuid, Uuid) {
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Ana Souza".into(),
            date_of_birth: None,
            phone: None,
        };
        let practitioner = Practitioner {
            id: Uuid::new_v4(),
            name: "Dr. Chen".into(),
            specialty: Some("GP".into()),
        };
        insert_patient(conn, &patient).unwrap();
        insert_practitioner(conn, &practitioner).unwrap();
        (patient.id, practitioner.id)
    }

    fn request(
        patient_id: Uuid,
        practitioner_id: Uuid,
        when: DateTime<Utc>,
    ) -> NewAppointment {
        NewAppointment {
            patient_id,
            practitioner_id,
            scheduled_at: when,
            kind: AppointmentKind::GeneralConsultation,
            notes: None,
        }
    }

    fn in_hours(h: i64) -> DateTime<Utc> {
        Utc::now() + Duration::hours(h)
    }

    #[test]
    fn create_books_scheduled_appointment() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);

        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(scheduler.get(appt.id).unwrap().id, appt.id);
    }

    #[test]
    fn create_rejects_unknown_patient() {
        let conn = open_memory_database().unwrap();
        let (_, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);

        let err = scheduler
            .create(request(Uuid::new_v4(), practitioner_id, in_hours(1)))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::PatientNotFound { .. }));
    }

    #[test]
    fn create_rejects_unknown_practitioner() {
        let conn = open_memory_database().unwrap();
        let (patient_id, _) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);

        let err = scheduler
            .create(request(patient_id, Uuid::new_v4(), in_hours(1)))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::PractitionerNotFound { .. }));
    }

    #[test]
    fn create_rejects_past_instant_and_persists_nothing() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);

        let err = scheduler
            .create(request(patient_id, practitioner_id, in_hours(-1)))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::PastSlot { .. }));
        assert!(scheduler.list_by_patient(patient_id).unwrap().is_empty());
    }

    #[test]
    fn create_rejects_occupied_slot() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(1);

        scheduler.create(request(patient_id, practitioner_id, when)).unwrap();
        let err = scheduler
            .create(request(patient_id, practitioner_id, when))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::SlotTaken { .. }));
    }

    #[test]
    fn update_with_status_only_confirms_without_touching_when() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(1);
        let appt = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();

        let updated = scheduler
            .update(
                appt.id,
                AppointmentChanges {
                    status: Some(AppointmentStatus::Confirmed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
        assert_eq!(updated.scheduled_at, when);
    }

    #[test]
    fn update_with_same_when_never_flips_to_rescheduled() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(1);
        let appt = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();

        // Form resubmission: full state echoed back, nothing actually changed
        let updated = scheduler
            .update(
                appt.id,
                AppointmentChanges {
                    when: Some(when),
                    kind: Some(AppointmentKind::GeneralConsultation),
                    notes: Some("unchanged".into()),
                    status: None,
                },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Scheduled);
        assert_eq!(updated.scheduled_at, when);
    }

    #[test]
    fn update_with_new_when_and_no_status_reschedules() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();

        let new_when = in_hours(2);
        let updated = scheduler
            .update(
                appt.id,
                AppointmentChanges { when: Some(new_when), ..Default::default() },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Rescheduled);
        assert_eq!(updated.scheduled_at, new_when);
    }

    #[test]
    fn explicit_status_wins_over_reschedule() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();

        let new_when = in_hours(2);
        let updated = scheduler
            .update(
                appt.id,
                AppointmentChanges {
                    when: Some(new_when),
                    status: Some(AppointmentStatus::Confirmed),
                    ..Default::default()
                },
            )
            .unwrap();
        // Explicit status applied, new instant still carried
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
        assert_eq!(updated.scheduled_at, new_when);
    }

    #[test]
    fn explicit_cancel_with_unchanged_when_cancels_without_reschedule() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(2);
        let appt = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();

        let updated = scheduler
            .update(
                appt.id,
                AppointmentChanges {
                    when: Some(when),
                    status: Some(AppointmentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Cancelled);
        assert_eq!(updated.scheduled_at, when);
    }

    #[test]
    fn update_reschedule_rejects_past_instant() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();

        let err = scheduler
            .update(
                appt.id,
                AppointmentChanges { when: Some(in_hours(-2)), ..Default::default() },
            )
            .unwrap_err();
        assert!(matches!(err, SchedulingError::PastSlot { .. }));
        // Stored state untouched
        assert_eq!(scheduler.get(appt.id).unwrap().status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn update_reschedule_rejects_occupied_target_slot() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when_a = in_hours(1);
        let when_b = in_hours(2);
        scheduler.create(request(patient_id, practitioner_id, when_a)).unwrap();
        let b = scheduler.create(request(patient_id, practitioner_id, when_b)).unwrap();

        let err = scheduler
            .update(b.id, AppointmentChanges { when: Some(when_a), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, SchedulingError::SlotTaken { .. }));
    }

    #[test]
    fn reschedule_to_own_slot_instant_is_a_noop_change() {
        // Moving to a slot occupied only by the appointment itself must not
        // conflict; covered via the excluding variant on a nearby instant.
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(1);
        let appt = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();

        let confirmed = scheduler.confirm(appt.id).unwrap();
        let updated = scheduler
            .update(
                confirmed.id,
                AppointmentChanges { when: Some(when), ..Default::default() },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn update_rejects_direct_request_for_rescheduled_without_time_change() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();

        let err = scheduler
            .update(
                appt.id,
                AppointmentChanges {
                    status: Some(AppointmentStatus::Rescheduled),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SchedulingError::UnsupportedStatus { .. }));
    }

    #[test]
    fn standalone_transitions_fetch_and_persist() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();

        assert_eq!(scheduler.confirm(appt.id).unwrap().status, AppointmentStatus::Confirmed);
        assert_eq!(scheduler.complete(appt.id).unwrap().status, AppointmentStatus::Completed);
        assert_eq!(
            scheduler.get(appt.id).unwrap().status,
            AppointmentStatus::Completed
        );
    }

    #[test]
    fn transitions_on_missing_appointment_are_not_found() {
        let conn = open_memory_database().unwrap();
        seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let missing = Uuid::new_v4();

        assert!(matches!(
            scheduler.confirm(missing).unwrap_err(),
            SchedulingError::AppointmentNotFound { .. }
        ));
        assert!(matches!(
            scheduler.delete(missing).unwrap_err(),
            SchedulingError::AppointmentNotFound { .. }
        ));
    }

    #[test]
    fn cancel_frees_the_slot_for_a_new_booking() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(2);

        let appt = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();
        scheduler.cancel(appt.id).unwrap();

        let replacement = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();
        assert_eq!(replacement.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn reconfirming_a_cancelled_appointment_into_a_taken_slot_conflicts() {
        // The pre-check lives on create/reschedule; re-activating a
        // cancelled row must still be caught by the unique index.
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let when = in_hours(2);

        let original = scheduler.create(request(patient_id, practitioner_id, when)).unwrap();
        scheduler.cancel(original.id).unwrap();
        scheduler.create(request(patient_id, practitioner_id, when)).unwrap();

        let err = scheduler.confirm(original.id).unwrap_err();
        assert!(matches!(err, SchedulingError::SlotTaken { .. }));
    }

    #[test]
    fn delete_bypasses_state_machine() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        let appt = scheduler.create(request(patient_id, practitioner_id, in_hours(1))).unwrap();
        let completed = scheduler.complete(appt.id).unwrap();

        scheduler.delete(completed.id).unwrap();
        assert!(matches!(
            scheduler.get(completed.id).unwrap_err(),
            SchedulingError::AppointmentNotFound { .. }
        ));
    }

    #[test]
    fn read_paths_cover_patient_practitioner_range_and_pages() {
        let conn = open_memory_database().unwrap();
        let (patient_id, practitioner_id) = seed_refs(&conn);
        let scheduler = Scheduler::new(&conn);
        for h in 1..=4 {
            scheduler.create(request(patient_id, practitioner_id, in_hours(h))).unwrap();
        }

        assert_eq!(scheduler.list_by_patient(patient_id).unwrap().len(), 4);
        assert_eq!(scheduler.list_by_practitioner(practitioner_id).unwrap().len(), 4);
        assert_eq!(
            scheduler
                .list_by_date_range(in_hours(2) - Duration::minutes(1), in_hours(3))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(scheduler.list(Page { number: 2, size: 3 }).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_creates_for_same_slot_yield_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medagenda.db");

        let (patient_id, practitioner_id) = {
            let conn = open_database(&path).unwrap();
            seed_refs(&conn)
        };
        let when = in_hours(1);

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let path = path.clone();
            let barrier = barrier.clone();
            handles.push(std::thread::spawn(move || {
                let conn = open_database(&path).unwrap();
                let scheduler = Scheduler::new(&conn);
                barrier.wait();
                scheduler.create(request(patient_id, practitioner_id, when))
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one booking may win the slot");
        for r in results {
            if let Err(e) = r {
                assert!(matches!(e, SchedulingError::SlotTaken { .. }), "loser saw: {e}");
            }
        }
    }
}
