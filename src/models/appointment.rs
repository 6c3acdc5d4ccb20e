//! Appointment entity — an immutable snapshot plus transition functions.
//!
//! Business state never changes through field assignment from outside this
//! module: every operation consumes the current snapshot and returns a new
//! validated one with `updated_at` refreshed. Transitions take `now`
//! explicitly so the entity stays a pure value, testable without a clock
//! or a database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentKind, AppointmentStatus};
use crate::scheduling::SchedulingError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Create a new appointment in `Scheduled` state.
    ///
    /// `scheduled_at` must lie strictly after `now`.
    pub fn new(
        patient_id: Uuid,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
        kind: AppointmentKind,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, SchedulingError> {
        if scheduled_at <= now {
            return Err(SchedulingError::PastSlot { requested: scheduled_at });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            patient_id,
            practitioner_id,
            scheduled_at,
            kind,
            status: AppointmentStatus::Scheduled,
            notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move the appointment to a new instant. The snapshot comes back in
    /// `Rescheduled` state regardless of the previous status; the new slot
    /// is occupied, the old one is freed.
    pub fn reschedule(
        self,
        new_when: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, SchedulingError> {
        if new_when <= now {
            return Err(SchedulingError::PastSlot { requested: new_when });
        }

        Ok(Self {
            scheduled_at: new_when,
            status: AppointmentStatus::Rescheduled,
            updated_at: now,
            ..self
        })
    }

    /// Metadata-only change: kind and notes. Status and `scheduled_at` are
    /// untouched, so administrative edits on cancelled or completed
    /// appointments remain possible.
    pub fn with_changes(
        self,
        kind: Option<AppointmentKind>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: kind.unwrap_or(self.kind),
            notes: notes.or(self.notes),
            updated_at: now,
            ..self
        }
    }

    pub fn confirm(self, now: DateTime<Utc>) -> Self {
        self.with_status(AppointmentStatus::Confirmed, now)
    }

    /// Terminal for slot occupancy: the (practitioner, instant) slot
    /// becomes free again.
    pub fn cancel(self, now: DateTime<Utc>) -> Self {
        self.with_status(AppointmentStatus::Cancelled, now)
    }

    pub fn complete(self, now: DateTime<Utc>) -> Self {
        self.with_status(AppointmentStatus::Completed, now)
    }

    fn with_status(self, status: AppointmentStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: now,
            ..self
        }
    }
}
