//! Change-routing helpers for the appointment update path.
//!
//! The update endpoint receives the full current form state back from
//! callers, so a `when` being *present* in the payload says nothing — only
//! a `when` that *differs* from the stored instant is a reschedule signal.

use chrono::{DateTime, Utc};

use super::SchedulingError;
use crate::models::{Appointment, AppointmentStatus};

/// True iff the request carries a `when` that differs from the stored
/// instant. Compares resolved instants, never raw payload strings, so a
/// caller resubmitting the unchanged time does not trip a reschedule.
pub fn time_actually_changed(current: &Appointment, requested: Option<DateTime<Utc>>) -> bool {
    match requested {
        Some(when) => when != current.scheduled_at,
        None => false,
    }
}

/// Apply an explicitly requested status as the corresponding transition.
///
/// `Scheduled` is only ever produced by creation, and `Rescheduled` only by
/// an actual time change (handled before this point); asking for either
/// here is a caller error.
pub(crate) fn apply_status(
    appt: Appointment,
    status: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    match status {
        AppointmentStatus::Confirmed => Ok(appt.confirm(now)),
        AppointmentStatus::Cancelled => Ok(appt.cancel(now)),
        AppointmentStatus::Completed => Ok(appt.complete(now)),
        AppointmentStatus::Scheduled | AppointmentStatus::Rescheduled => {
            Err(SchedulingError::UnsupportedStatus { status })
        }
    }
}
