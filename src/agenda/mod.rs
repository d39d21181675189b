//! Agenda core: slot generation, overlap matching and the drag-and-drop
//! reschedule transaction. Everything here works on typed values; the only
//! I/O goes through [`store::AppointmentStore`].

pub mod overlap;
pub mod reschedule;
pub mod slots;
pub mod store;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Appointment, UnitRow};
use store::StoreError;

pub use overlap::{DayGrid, DoctorColumn, build_day_grid};
pub use reschedule::{AgendaDay, RescheduleOutcome};
pub use slots::generate_slots;

#[derive(Debug, thiserror::Error)]
pub enum AgendaError {
    #[error("visit duration must be at least 1 minute (got {0})")]
    InvalidDuration(i32),
    #[error("interval end {end} must be after start {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("appointment {0} not found")]
    AppointmentNotFound(Uuid),
    #[error("{0} is not a slot start of this agenda day")]
    NotASlot(DateTime<Utc>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Opening hours and visit length of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitHours {
    pub opening: NaiveTime,
    /// Earlier than `opening` means the unit closes the next day.
    pub closing: NaiveTime,
    pub visit_duration_min: i32,
}

impl UnitHours {
    pub const DEFAULT_OPENING: NaiveTime = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
    pub const DEFAULT_CLOSING: NaiveTime = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

    pub fn from_unit(unit: &UnitRow) -> Self {
        Self {
            opening: unit.opening_time.unwrap_or(Self::DEFAULT_OPENING),
            closing: unit.closing_time.unwrap_or(Self::DEFAULT_CLOSING),
            visit_duration_min: unit.visit_duration_min,
        }
    }

    pub fn visit_duration(&self) -> Result<Duration, AgendaError> {
        if self.visit_duration_min < 1 {
            return Err(AgendaError::InvalidDuration(self.visit_duration_min));
        }
        Ok(Duration::minutes(i64::from(self.visit_duration_min)))
    }

    /// The agenda day `instant` is shown on. With overnight hours, times
    /// before closing belong to the previous day's agenda.
    pub fn agenda_day(&self, instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
        let local = instant.with_timezone(&offset).naive_local();
        let date = local.date();
        let overnight = self.closing < self.opening;
        if overnight && local.time() < self.closing {
            date.pred_opt().unwrap_or(date)
        } else {
            date
        }
    }
}

/// A half-open `[start, end)` bucket of the agenda grid. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn new(start: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && self.start < end
    }
}

/// Rows with `end_at <= start_at` get the unit's visit length so every
/// appointment reaching the grid has a non-empty interval.
pub fn normalize_interval(appointment: &mut Appointment, visit: Duration) {
    if appointment.end_at <= appointment.start_at {
        tracing::warn!(
            appointment_id = %appointment.appointment_id,
            start = %appointment.start_at,
            end = %appointment.end_at,
            "appointment with empty interval, using unit visit duration"
        );
        appointment.end_at = appointment.start_at + visit;
    }
}
