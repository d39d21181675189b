use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::agenda::store::{AppointmentStore, StoreError};
use crate::models::{AgendaAppointment, Appointment, AppointmentStatus, ScheduleBlock};

pub type MoveCall = (Uuid, DateTime<Utc>, DateTime<Utc>, Uuid);

pub struct MockAppointmentStoreInner {
    pub success: AtomicBool,
    pub calls_to_appointments_between: AtomicU64,
    pub calls_to_blocks_between: AtomicU64,
    pub calls_to_move: AtomicU64,
    pub last_move: Mutex<Option<MoveCall>>,
    pub appointments: Mutex<Vec<AgendaAppointment>>,
    pub blocks: Mutex<Vec<ScheduleBlock>>,
}

#[derive(Clone)]
pub struct MockAppointmentStore(pub Arc<MockAppointmentStoreInner>);

impl MockAppointmentStoreInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_appointments_between: AtomicU64::default(),
            calls_to_blocks_between: AtomicU64::default(),
            calls_to_move: AtomicU64::default(),
            last_move: Mutex::default(),
            appointments: Mutex::default(),
            blocks: Mutex::default(),
        }
    }
}

impl MockAppointmentStore {
    pub fn new() -> Self {
        Self(Arc::new(MockAppointmentStoreInner::new()))
    }

    pub fn with_appointments(appointments: Vec<AgendaAppointment>) -> Self {
        let store = Self::new();
        *store.0.appointments.lock().unwrap() = appointments;
        store
    }
}

#[async_trait]
impl AppointmentStore for MockAppointmentStore {
    async fn appointments_between(
        &self,
        _unit_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<AgendaAppointment>, StoreError> {
        self.0
            .calls_to_appointments_between
            .fetch_add(1, Ordering::SeqCst);
        let appointments = self.0.appointments.lock().unwrap();
        // Same window predicate as PgAppointmentStore.
        Ok(appointments
            .iter()
            .filter(|a| {
                let a = &a.appointment;
                a.start_at < to
                    && (a.end_at > from || a.start_at >= from)
                    && doctor_id.is_none_or(|d| a.doctor_id == d)
            })
            .cloned()
            .collect())
    }

    async fn blocks_between(
        &self,
        _unit_id: Uuid,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<ScheduleBlock>, StoreError> {
        self.0.calls_to_blocks_between.fetch_add(1, Ordering::SeqCst);
        Ok(self.0.blocks.lock().unwrap().clone())
    }

    async fn move_appointment(
        &self,
        appointment_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        doctor_id: Uuid,
    ) -> Result<(), StoreError> {
        self.0.calls_to_move.fetch_add(1, Ordering::SeqCst);
        *self.0.last_move.lock().unwrap() = Some((appointment_id, start_at, end_at, doctor_id));
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(StoreError::Rejected("Supposed to fail".into())),
        }
    }
}

/// 2024-03-11 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 11, h, m, 0).unwrap()
}

pub fn appointment(doctor_id: Uuid, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Appointment {
    Appointment {
        appointment_id: Uuid::new_v4(),
        organization_id: Uuid::nil(),
        unit_id: Uuid::nil(),
        doctor_id,
        patient_id: Uuid::new_v4(),
        appointment_type_id: None,
        insurer_id: None,
        plan_id: None,
        start_at,
        end_at,
        status: AppointmentStatus::Scheduled,
        notes: None,
        fit_in: false,
        booked_by_id: None,
    }
}

pub fn agenda_appointment(
    doctor_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> AgendaAppointment {
    AgendaAppointment {
        appointment: appointment(doctor_id, start_at, end_at),
        patient_name: "Maria Souza".into(),
        patient_phone: None,
        doctor_name: "Dr. X".into(),
        appointment_type_name: None,
        insurer_name: None,
        plan_name: None,
    }
}

pub fn block(doctor_id: Option<Uuid>, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> ScheduleBlock {
    ScheduleBlock {
        block_id: Uuid::new_v4(),
        organization_id: Uuid::nil(),
        unit_id: Uuid::nil(),
        doctor_id,
        start_at,
        end_at,
        reason: Some("lunch".into()),
    }
}
