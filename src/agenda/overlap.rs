use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Slot, slots::label};
use crate::models::{AgendaAppointment, Appointment, ScheduleBlock};

/// The doctor's appointments overlapping `slot`.
///
/// Both intervals are half-open, so an appointment ending exactly at
/// `slot.start` is not listed, while one starting anywhere inside the slot
/// always is (appointments carry `end_at > start_at`).
pub fn appointments_in_slot<'a, A>(slot: &Slot, doctor_id: Uuid, appointments: &'a [A]) -> Vec<&'a A>
where
    A: AsRef<Appointment>,
{
    appointments
        .iter()
        .filter(|a| {
            let a = a.as_ref();
            a.doctor_id == doctor_id && slot.overlaps(a.start_at, a.end_at)
        })
        .collect()
}

pub fn is_blocked(slot: &Slot, doctor_id: Uuid, blocks: &[ScheduleBlock]) -> bool {
    blocks.iter().any(|b| {
        b.doctor_id.is_none_or(|d| d == doctor_id) && slot.overlaps(b.start_at, b.end_at)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorColumn {
    pub doctor_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    pub doctor_id: Uuid,
    pub blocked: bool,
    pub appointments: Vec<AgendaAppointment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    #[serde(flatten)]
    pub slot: Slot,
    pub label: String,
    pub past: bool,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayGrid {
    pub date: NaiveDate,
    pub doctors: Vec<DoctorColumn>,
    pub rows: Vec<GridRow>,
}

#[cfg(test)]
impl DayGrid {
    pub fn cell(&self, slot_start: DateTime<Utc>, doctor_id: Uuid) -> Option<&GridCell> {
        self.rows
            .iter()
            .find(|r| r.slot.start == slot_start)?
            .cells
            .iter()
            .find(|c| c.doctor_id == doctor_id)
    }
}

/// Lays the day out as slots x doctor columns.
pub fn build_day_grid(
    date: NaiveDate,
    slots: &[Slot],
    doctors: &[DoctorColumn],
    appointments: &[AgendaAppointment],
    blocks: &[ScheduleBlock],
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> DayGrid {
    let rows = slots
        .iter()
        .map(|slot| GridRow {
            slot: *slot,
            label: label(slot.start, offset),
            past: slot.start < now,
            cells: doctors
                .iter()
                .map(|d| GridCell {
                    doctor_id: d.doctor_id,
                    blocked: is_blocked(slot, d.doctor_id, blocks),
                    appointments: appointments_in_slot(slot, d.doctor_id, appointments)
                        .into_iter()
                        .cloned()
                        .collect(),
                })
                .collect(),
        })
        .collect();

    DayGrid {
        date,
        doctors: doctors.to_vec(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{agenda_appointment, appointment, at, block};
    use chrono::Duration;

    fn slot(h: u32, m: u32) -> Slot {
        Slot::new(at(h, m), Duration::minutes(15))
    }

    #[test]
    fn half_open_boundaries() {
        let doctor = Uuid::new_v4();
        let appts = vec![appointment(doctor, at(9, 0), at(9, 15))];

        assert_eq!(appointments_in_slot(&slot(9, 0), doctor, &appts).len(), 1);
        assert!(appointments_in_slot(&slot(9, 15), doctor, &appts).is_empty());
        assert!(appointments_in_slot(&slot(8, 45), doctor, &appts).is_empty());
    }

    #[test]
    fn other_doctors_are_ignored() {
        let doctor = Uuid::new_v4();
        let appts = vec![appointment(Uuid::new_v4(), at(9, 0), at(9, 15))];
        assert!(appointments_in_slot(&slot(9, 0), doctor, &appts).is_empty());
    }

    #[test]
    fn start_inside_slot_is_always_listed() {
        let doctor = Uuid::new_v4();
        let appts = vec![
            appointment(doctor, at(9, 10), at(9, 11)),
            appointment(doctor, at(9, 14), at(9, 45)),
        ];
        assert_eq!(appointments_in_slot(&slot(9, 0), doctor, &appts).len(), 2);
    }

    #[test]
    fn long_appointment_spans_several_slots() {
        let doctor = Uuid::new_v4();
        let appts = vec![appointment(doctor, at(9, 0), at(9, 40))];
        let hits: Vec<usize> = [(9, 0), (9, 15), (9, 30), (9, 45)]
            .iter()
            .map(|&(h, m)| appointments_in_slot(&slot(h, m), doctor, &appts).len())
            .collect();
        assert_eq!(hits, vec![1, 1, 1, 0]);
    }

    #[test]
    fn unit_wide_and_doctor_blocks() {
        let doctor = Uuid::new_v4();
        let other = Uuid::new_v4();
        let blocks = vec![
            block(None, at(12, 0), at(13, 0)),
            block(Some(other), at(9, 0), at(10, 0)),
        ];
        assert!(is_blocked(&slot(12, 30), doctor, &blocks));
        assert!(!is_blocked(&slot(13, 0), doctor, &blocks));
        assert!(!is_blocked(&slot(9, 0), doctor, &blocks));
        assert!(is_blocked(&slot(9, 0), other, &blocks));
    }

    #[test]
    fn grid_places_appointments_per_doctor_column() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let doctors = vec![
            DoctorColumn { doctor_id: x, name: "Dr. X".into() },
            DoctorColumn { doctor_id: y, name: "Dr. Y".into() },
        ];
        let slots = vec![slot(9, 0), slot(9, 15)];
        let appts = vec![agenda_appointment(x, at(9, 0), at(9, 15))];
        let blocks = vec![block(Some(y), at(9, 15), at(9, 30))];

        let grid = build_day_grid(
            at(0, 0).date_naive(),
            &slots,
            &doctors,
            &appts,
            &blocks,
            FixedOffset::east_opt(0).unwrap(),
            at(9, 10),
        );

        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0].label, "09:00");
        assert!(grid.rows[0].past);
        assert!(!grid.rows[1].past);
        assert_eq!(grid.cell(at(9, 0), x).unwrap().appointments.len(), 1);
        assert!(grid.cell(at(9, 0), y).unwrap().appointments.is_empty());
        assert!(grid.cell(at(9, 15), x).unwrap().appointments.is_empty());
        assert!(grid.cell(at(9, 15), y).unwrap().blocked);
    }
}
