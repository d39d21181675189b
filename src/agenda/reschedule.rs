use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    AgendaError, DayGrid, DoctorColumn, Slot, UnitHours, build_day_grid, normalize_interval,
    slots::{generate_slots, load_window},
    store::AppointmentStore,
};
use crate::models::{AgendaAppointment, ScheduleBlock};

/// A unit's day as loaded for the agenda view.
///
/// Only the drag-and-drop path mutates it ahead of the store; every other
/// change is re-read after the store confirms.
#[derive(Debug, Clone)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub offset: FixedOffset,
    pub slots: Vec<Slot>,
    pub appointments: Vec<AgendaAppointment>,
    pub blocks: Vec<ScheduleBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleOutcome {
    /// Dropped on its own slot and doctor; nothing written.
    Unchanged,
    Moved,
}

impl AgendaDay {
    pub async fn load<S>(
        store: &S,
        unit_id: Uuid,
        hours: UnitHours,
        date: NaiveDate,
        offset: FixedOffset,
        doctor_id: Option<Uuid>,
    ) -> Result<Self, AgendaError>
    where
        S: AppointmentStore + ?Sized,
    {
        let visit = hours.visit_duration()?;
        let slots = generate_slots(&hours, date, offset)?;
        let (from, to) = load_window(date, &slots, offset);

        let mut appointments = store
            .appointments_between(unit_id, from, to, doctor_id)
            .await?;
        for a in &mut appointments {
            normalize_interval(&mut a.appointment, visit);
        }
        let blocks = store.blocks_between(unit_id, from, to).await?;

        tracing::debug!(
            %unit_id,
            %date,
            slots = slots.len(),
            appointments = appointments.len(),
            blocks = blocks.len(),
            "agenda day loaded"
        );

        Ok(Self {
            date,
            offset,
            slots,
            appointments,
            blocks,
        })
    }

    pub fn grid(&self, doctors: &[DoctorColumn], now: DateTime<Utc>) -> DayGrid {
        build_day_grid(
            self.date,
            &self.slots,
            doctors,
            &self.appointments,
            &self.blocks,
            self.offset,
            now,
        )
    }

    /// Moves an appointment to the slot starting at `target_start` with
    /// `target_doctor`, keeping its length. The local copy is updated first;
    /// if the store rejects the write the appointment is put back exactly as
    /// it was.
    pub async fn reschedule<S>(
        &mut self,
        store: &S,
        appointment_id: Uuid,
        target_start: DateTime<Utc>,
        target_doctor: Uuid,
        target_doctor_name: Option<&str>,
    ) -> Result<RescheduleOutcome, AgendaError>
    where
        S: AppointmentStore + ?Sized,
    {
        let index = self
            .appointments
            .iter()
            .position(|a| a.appointment.appointment_id == appointment_id)
            .ok_or(AgendaError::AppointmentNotFound(appointment_id))?;

        let snapshot = self.appointments[index].clone();
        let current = &snapshot.appointment;
        if current.start_at == target_start && current.doctor_id == target_doctor {
            return Ok(RescheduleOutcome::Unchanged);
        }

        if !self.slots.iter().any(|s| s.start == target_start) {
            return Err(AgendaError::NotASlot(target_start));
        }

        let length = current.end_at - current.start_at;
        let target_end = target_start + length;
        if target_end <= target_start {
            return Err(AgendaError::InvalidInterval {
                start: target_start,
                end: target_end,
            });
        }

        {
            let local = &mut self.appointments[index];
            local.appointment.start_at = target_start;
            local.appointment.end_at = target_end;
            local.appointment.doctor_id = target_doctor;
            if let Some(name) = target_doctor_name {
                local.doctor_name = name.to_string();
            }
        }

        match store
            .move_appointment(appointment_id, target_start, target_end, target_doctor)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    %appointment_id,
                    from = %snapshot.appointment.start_at,
                    to = %target_start,
                    doctor_id = %target_doctor,
                    "appointment rescheduled"
                );
                Ok(RescheduleOutcome::Moved)
            }
            Err(e) => {
                tracing::warn!(%appointment_id, error = %e, "reschedule rejected, reverting");
                self.appointments[index] = snapshot;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
impl AgendaDay {
    pub fn appointment(&self, appointment_id: Uuid) -> Option<&AgendaAppointment> {
        self.appointments
            .iter()
            .find(|a| a.appointment.appointment_id == appointment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::store::StoreError;
    use crate::testutils::{MockAppointmentStore, agenda_appointment, at, block};
    use chrono::NaiveTime;
    use std::sync::atomic::Ordering;

    fn hours() -> UnitHours {
        UnitHours {
            opening: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            closing: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            visit_duration_min: 15,
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    async fn loaded(store: &MockAppointmentStore) -> AgendaDay {
        AgendaDay::load(store, Uuid::new_v4(), hours(), at(0, 0).date_naive(), utc(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn drag_moves_start_end_and_doctor() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = agenda_appointment(x, at(9, 0), at(9, 15));
        let id = appt.appointment.appointment_id;
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        let mut day = loaded(&store).await;

        let outcome = day
            .reschedule(&store, id, at(9, 30), y, Some("Dr. Y"))
            .await
            .unwrap();

        assert_eq!(outcome, RescheduleOutcome::Moved);
        let moved = day.appointment(id).unwrap();
        assert_eq!(moved.appointment.start_at, at(9, 30));
        assert_eq!(moved.appointment.end_at, at(9, 45));
        assert_eq!(moved.appointment.doctor_id, y);
        assert_eq!(moved.doctor_name, "Dr. Y");
        assert_eq!(store.0.calls_to_move.load(Ordering::SeqCst), 1);
        assert_eq!(
            *store.0.last_move.lock().unwrap(),
            Some((id, at(9, 30), at(9, 45), y))
        );
    }

    #[tokio::test]
    async fn rejected_write_restores_snapshot() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = agenda_appointment(x, at(9, 0), at(9, 15));
        let before = appt.clone();
        let id = appt.appointment.appointment_id;
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        store.0.success.store(false, Ordering::SeqCst);
        let mut day = loaded(&store).await;

        let err = day
            .reschedule(&store, id, at(9, 30), y, Some("Dr. Y"))
            .await
            .unwrap_err();

        assert!(matches!(err, AgendaError::Store(StoreError::Rejected(_))));
        assert_eq!(day.appointment(id).unwrap(), &before);
        assert_eq!(store.0.calls_to_move.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_on_same_slot_and_doctor_is_a_noop() {
        let x = Uuid::new_v4();
        let appt = agenda_appointment(x, at(9, 0), at(9, 15));
        let before = appt.clone();
        let id = appt.appointment.appointment_id;
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        let mut day = loaded(&store).await;

        let outcome = day.reschedule(&store, id, at(9, 0), x, None).await.unwrap();

        assert_eq!(outcome, RescheduleOutcome::Unchanged);
        assert_eq!(day.appointment(id).unwrap(), &before);
        assert_eq!(store.0.calls_to_move.load(Ordering::SeqCst), 0);
        assert_eq!(store.0.calls_to_appointments_between.load(Ordering::SeqCst), 1);
        assert_eq!(store.0.calls_to_blocks_between.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_slot_other_doctor_still_writes() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = agenda_appointment(x, at(9, 0), at(9, 15));
        let id = appt.appointment.appointment_id;
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        let mut day = loaded(&store).await;

        let outcome = day.reschedule(&store, id, at(9, 0), y, None).await.unwrap();
        assert_eq!(outcome, RescheduleOutcome::Moved);
        assert_eq!(day.appointment(id).unwrap().appointment.doctor_id, y);
    }

    #[tokio::test]
    async fn unknown_appointment_issues_no_write() {
        let store = MockAppointmentStore::new();
        let mut day = loaded(&store).await;
        let err = day
            .reschedule(&store, Uuid::new_v4(), at(9, 0), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgendaError::AppointmentNotFound(_)));
        assert_eq!(store.0.calls_to_move.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn moved_appointment_renders_in_new_cell() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = agenda_appointment(x, at(9, 0), at(9, 15));
        let id = appt.appointment.appointment_id;
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        let mut day = loaded(&store).await;
        let doctors = vec![
            DoctorColumn { doctor_id: x, name: "Dr. X".into() },
            DoctorColumn { doctor_id: y, name: "Dr. Y".into() },
        ];

        day.reschedule(&store, id, at(9, 30), y, None).await.unwrap();
        let grid = day.grid(&doctors, at(0, 0));

        assert!(grid.cell(at(9, 0), x).unwrap().appointments.is_empty());
        assert_eq!(grid.cell(at(9, 30), y).unwrap().appointments.len(), 1);
    }

    #[tokio::test]
    async fn load_normalizes_rows_and_keeps_blocks() {
        let x = Uuid::new_v4();
        let store = MockAppointmentStore::with_appointments(vec![agenda_appointment(
            x,
            at(10, 0),
            at(10, 0),
        )]);
        store
            .0
            .blocks
            .lock()
            .unwrap()
            .push(block(None, at(12, 0), at(13, 0)));

        let day = loaded(&store).await;

        assert_eq!(day.slots.len(), 40);
        assert_eq!(day.appointments[0].appointment.end_at, at(10, 15));
        assert_eq!(day.blocks.len(), 1);
    }

    #[tokio::test]
    async fn load_rejects_zero_duration_units() {
        let store = MockAppointmentStore::new();
        let err = AgendaDay::load(
            &store,
            Uuid::new_v4(),
            UnitHours { visit_duration_min: 0, ..hours() },
            at(0, 0).date_naive(),
            utc(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgendaError::InvalidDuration(0)));
    }

    #[tokio::test]
    async fn target_off_the_slot_grid_is_rejected_without_write() {
        let x = Uuid::new_v4();
        let appt = agenda_appointment(x, at(9, 0), at(9, 15));
        let before = appt.clone();
        let id = appt.appointment.appointment_id;
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        let mut day = loaded(&store).await;

        for target in [at(9, 7), at(9, 0) + chrono::Duration::days(7), at(18, 0)] {
            let err = day.reschedule(&store, id, target, x, None).await.unwrap_err();
            assert!(matches!(err, AgendaError::NotASlot(t) if t == target));
        }
        assert_eq!(day.appointment(id).unwrap(), &before);
        assert_eq!(store.0.calls_to_move.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overnight_drag_across_midnight() {
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        let hours = UnitHours {
            opening: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            closing: NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            visit_duration_min: 60,
        };
        let appt = agenda_appointment(x, at(23, 0), at(23, 0) + chrono::Duration::hours(1));
        let id = appt.appointment.appointment_id;
        let start = appt.appointment.start_at;
        let store = MockAppointmentStore::with_appointments(vec![appt]);

        let target = at(23, 0) + chrono::Duration::hours(2);
        let date = hours.agenda_day(start, utc());
        assert_eq!(date, at(0, 0).date_naive());

        let mut day = AgendaDay::load(&store, Uuid::new_v4(), hours, date, utc(), None)
            .await
            .unwrap();
        let outcome = day.reschedule(&store, id, target, y, None).await.unwrap();

        assert_eq!(outcome, RescheduleOutcome::Moved);
        let moved = &day.appointment(id).unwrap().appointment;
        assert_eq!(moved.start_at, target);
        assert_eq!(moved.end_at, target + chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn overnight_appointment_is_missing_from_the_next_calendar_day() {
        let x = Uuid::new_v4();
        let hours = UnitHours {
            opening: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            closing: NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            visit_duration_min: 60,
        };
        let appt = agenda_appointment(x, at(23, 0), at(23, 0) + chrono::Duration::hours(1));
        let store = MockAppointmentStore::with_appointments(vec![appt]);
        let next_day = at(0, 0).date_naive().succ_opt().unwrap();

        let day = AgendaDay::load(&store, Uuid::new_v4(), hours, next_day, utc(), None)
            .await
            .unwrap();
        assert!(day.appointments.is_empty());
    }
}
