use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Rescheduled => "rescheduled",
    Completed => "completed",
});

str_enum!(AppointmentKind {
    GeneralConsultation => "general_consultation",
    Exam => "exam",
    Telemedicine => "telemedicine",
    FollowUp => "follow_up",
    Emergency => "emergency",
});

impl AppointmentStatus {
    /// Whether an appointment in this status still occupies its
    /// (practitioner, instant) slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed | Self::Rescheduled)
    }

    /// Whether an appointment in this status may receive a medical record.
    pub fn record_eligible(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }
}

/// SQL fragment listing the slot-occupying statuses. Must stay in sync with
/// the partial unique index in `001_initial.sql`.
pub const ACTIVE_STATUS_SQL: &str = "('scheduled', 'confirmed', 'rescheduled')";
