use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentKind, AppointmentStatus};

/// Request to book a new appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub kind: AppointmentKind,
    pub notes: Option<String>,
}

/// Partial update of an existing appointment. All fields optional.
///
/// A `when` that actually differs from the stored instant routes the call
/// through the reschedule transition unless an explicit `status` is
/// supplied in the same request — then the explicit status wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentChanges {
    pub when: Option<DateTime<Utc>>,
    pub kind: Option<AppointmentKind>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}
