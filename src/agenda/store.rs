use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AgendaAppointment, ScheduleBlock};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("appointment {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Rejected(String),
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What the agenda needs from the backing store.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments of the unit overlapping `[from, to)`, optionally for one doctor.
    async fn appointments_between(
        &self,
        unit_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<AgendaAppointment>, StoreError>;

    async fn blocks_between(
        &self,
        unit_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduleBlock>, StoreError>;

    async fn move_appointment(
        &self,
        appointment_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        doctor_id: Uuid,
    ) -> Result<(), StoreError>;
}

/// Joined appointment projection shared by the agenda and the appointment routes.
pub const AGENDA_APPOINTMENT_SELECT: &str = r#"
    SELECT
      a.appointment_id,
      a.organization_id,
      a.unit_id,
      a.doctor_id,
      a.patient_id,
      a.appointment_type_id,
      a.insurer_id,
      a.plan_id,
      a.start_at,
      a.end_at,
      a.status,
      a.notes,
      a.fit_in,
      a.booked_by_id,

      p.name  AS patient_name,
      p.phone AS patient_phone,
      d.name  AS doctor_name,
      t.name  AS appointment_type_name,
      i.name  AS insurer_name,
      pl.name AS plan_name

    FROM appointments a
    JOIN patients p ON p.patient_id = a.patient_id
    JOIN doctors d ON d.doctor_id = a.doctor_id
    LEFT JOIN appointment_types t ON t.id = a.appointment_type_id
    LEFT JOIN insurers i ON i.id = a.insurer_id
    LEFT JOIN insurance_plans pl ON pl.plan_id = a.plan_id
"#;

/// Postgres-backed store scoped to one organization.
#[derive(Clone)]
pub struct PgAppointmentStore {
    db: PgPool,
    organization_id: Uuid,
}

impl PgAppointmentStore {
    pub fn new(db: PgPool, organization_id: Uuid) -> Self {
        Self { db, organization_id }
    }
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn appointments_between(
        &self,
        unit_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<AgendaAppointment>, StoreError> {
        let sql = format!(
            r#"
            {AGENDA_APPOINTMENT_SELECT}
            WHERE a.organization_id = $1
              AND a.unit_id = $2
              AND a.start_at < $4
              AND (a.end_at > $3 OR a.start_at >= $3)
              AND ($5::uuid IS NULL OR a.doctor_id = $5)
            ORDER BY a.start_at ASC, d.name ASC
            "#
        );
        let rows = sqlx::query_as::<_, AgendaAppointment>(&sql)
            .bind(self.organization_id)
            .bind(unit_id)
            .bind(from)
            .bind(to)
            .bind(doctor_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn blocks_between(
        &self,
        unit_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduleBlock>, StoreError> {
        let rows = sqlx::query_as::<_, ScheduleBlock>(
            r#"
            SELECT block_id, organization_id, unit_id, doctor_id, start_at, end_at, reason
            FROM schedule_blocks
            WHERE organization_id = $1
              AND unit_id = $2
              AND start_at < $4
              AND end_at > $3
            ORDER BY start_at ASC
            "#,
        )
        .bind(self.organization_id)
        .bind(unit_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn move_appointment(
        &self,
        appointment_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        doctor_id: Uuid,
    ) -> Result<(), StoreError> {
        let doctor_ok: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
              SELECT 1 FROM doctors WHERE doctor_id = $1 AND organization_id = $2
            )
            "#,
        )
        .bind(doctor_id)
        .bind(self.organization_id)
        .fetch_one(&self.db)
        .await?;
        if !doctor_ok {
            return Err(StoreError::Rejected(format!("doctor {doctor_id} not found")));
        }

        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET start_at = $2,
                end_at = $3,
                doctor_id = $4,
                updated_at = now()
            WHERE appointment_id = $1
              AND organization_id = $5
            "#,
        )
        .bind(appointment_id)
        .bind(start_at)
        .bind(end_at)
        .bind(doctor_id)
        .bind(self.organization_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(appointment_id));
        }
        Ok(())
    }
}
