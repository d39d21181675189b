// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    agenda::{UnitHours, slots::day_bounds, store::AGENDA_APPOINTMENT_SELECT},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        AgendaAppointment, ApiOk, AppState, AppointmentStatus, OkData, clean,
        deserialize_double_option,
    },
    routes::{agenda_routes::parse_day, unit_routes::fetch_unit},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
        .route("/appointments/{appointment_id}/status", patch(set_status))
}

async fn fetch_appointment(
    state: &AppState,
    organization_id: Uuid,
    appointment_id: Uuid,
) -> Result<AgendaAppointment, ApiError> {
    let sql = format!(
        "{AGENDA_APPOINTMENT_SELECT} WHERE a.appointment_id = $1 AND a.organization_id = $2"
    );
    sqlx::query_as::<_, AgendaAppointment>(&sql)
        .bind(appointment_id)
        .bind(organization_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("appointment"))
}

/// The patient, doctor and lookup ids must belong to the caller's organization.
async fn ensure_references(
    state: &AppState,
    organization_id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    appointment_type_id: Option<Uuid>,
    insurer_id: Option<Uuid>,
    plan_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let (doctor_ok, patient_ok, type_ok, insurer_ok, plan_ok): (bool, bool, bool, bool, bool) =
        sqlx::query_as(
            r#"
            SELECT
              EXISTS (SELECT 1 FROM doctors WHERE doctor_id = $2 AND organization_id = $1),
              EXISTS (SELECT 1 FROM patients WHERE patient_id = $3 AND organization_id = $1),
              ($4::uuid IS NULL OR EXISTS (SELECT 1 FROM appointment_types WHERE id = $4 AND organization_id = $1)),
              ($5::uuid IS NULL OR EXISTS (SELECT 1 FROM insurers WHERE id = $5 AND organization_id = $1)),
              ($6::uuid IS NULL OR EXISTS (
                 SELECT 1 FROM insurance_plans pl
                 JOIN insurers i ON i.id = pl.insurer_id
                 WHERE pl.plan_id = $6 AND i.organization_id = $1
                   AND ($5::uuid IS NULL OR pl.insurer_id = $5)))
            "#,
        )
        .bind(organization_id)
        .bind(doctor_id)
        .bind(patient_id)
        .bind(appointment_type_id)
        .bind(insurer_id)
        .bind(plan_id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;

    let missing = [
        (doctor_ok, "doctor_id"),
        (patient_ok, "patient_id"),
        (type_ok, "appointment_type_id"),
        (insurer_ok, "insurer_id"),
        (plan_ok, "plan_id"),
    ]
    .into_iter()
    .find(|(ok, _)| !ok);

    match missing {
        Some((_, field)) => Err(ApiError::validation(format!("{field} is unknown"))),
        None => Ok(()),
    }
}

/* ============================================================
   GET /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    pub doctor_id: Option<Uuid>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AgendaAppointment>>>, ApiError> {
    let unit_id = auth.require_unit()?;
    let date = parse_day(q.date.as_deref(), state.clinic_offset)?;
    let (from, to) = day_bounds(date, state.clinic_offset);

    let sql = format!(
        r#"
        {AGENDA_APPOINTMENT_SELECT}
        WHERE a.organization_id = $1
          AND a.unit_id = $2
          AND a.start_at >= $3
          AND a.start_at < $4
          AND ($5::uuid IS NULL OR a.doctor_id = $5)
        ORDER BY a.start_at ASC, d.name ASC
        "#
    );
    let rows = sqlx::query_as::<_, AgendaAppointment>(&sql)
        .bind(auth.organization_id)
        .bind(unit_id)
        .bind(from)
        .bind(to)
        .bind(q.doctor_id)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AgendaAppointment>>, ApiError> {
    let appt = fetch_appointment(&state, auth.organization_id, appointment_id).await?;
    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   POST /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type_id: Option<Uuid>,
    pub insurer_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub fit_in: Option<bool>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AgendaAppointment>>, ApiError> {
    auth.ensure_books_appointments()?;
    let unit_id = auth.require_unit()?;

    let unit = fetch_unit(&state, auth.organization_id, unit_id).await?;
    let end_at = req.start_at + UnitHours::from_unit(&unit).visit_duration()?;

    ensure_references(
        &state,
        auth.organization_id,
        req.doctor_id,
        req.patient_id,
        req.appointment_type_id,
        req.insurer_id,
        req.plan_id,
    )
    .await?;

    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointments (
          organization_id, unit_id, doctor_id, patient_id,
          appointment_type_id, insurer_id, plan_id,
          start_at, end_at, status, notes, fit_in, booked_by_id
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
        RETURNING appointment_id
        "#,
    )
    .bind(auth.organization_id)
    .bind(unit_id)
    .bind(req.doctor_id)
    .bind(req.patient_id)
    .bind(req.appointment_type_id)
    .bind(req.insurer_id)
    .bind(req.plan_id)
    .bind(req.start_at)
    .bind(end_at)
    .bind(req.status.unwrap_or(AppointmentStatus::Scheduled))
    .bind(clean(req.notes.as_deref()))
    .bind(req.fit_in.unwrap_or(false))
    .bind(auth.profile_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("APPOINTMENT_CREATE_FAILED"))?;

    tracing::info!(%appointment_id, doctor_id = %req.doctor_id, start = %req.start_at, "appointment booked");

    let appt = fetch_appointment(&state, auth.organization_id, appointment_id).await?;
    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   PATCH /appointments/{id}
   ============================================================ */

/// Staff may move an appointment to any status from any other, terminal
/// ones included.
fn next_status(_current: AppointmentStatus, requested: AppointmentStatus) -> AppointmentStatus {
    requested
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub appointment_type_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub insurer_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub plan_id: Option<Option<Uuid>>,
    pub start_at: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
    pub fit_in: Option<bool>,
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<ApiOk<AgendaAppointment>>, ApiError> {
    auth.ensure_books_appointments()?;

    let current = fetch_appointment(&state, auth.organization_id, appointment_id)
        .await?
        .appointment;

    let doctor_id = req.doctor_id.unwrap_or(current.doctor_id);
    let patient_id = req.patient_id.unwrap_or(current.patient_id);
    let appointment_type_id = req.appointment_type_id.unwrap_or(current.appointment_type_id);
    let insurer_id = req.insurer_id.unwrap_or(current.insurer_id);
    let plan_id = req.plan_id.unwrap_or(current.plan_id);
    let notes = match req.notes {
        Some(v) => clean(v.as_deref()),
        None => current.notes,
    };

    // A new start takes the unit's current visit length, as on creation.
    let (start_at, end_at) = match req.start_at {
        Some(start) => {
            let unit = fetch_unit(&state, auth.organization_id, current.unit_id).await?;
            (start, start + UnitHours::from_unit(&unit).visit_duration()?)
        }
        None => (current.start_at, current.end_at),
    };

    ensure_references(
        &state,
        auth.organization_id,
        doctor_id,
        patient_id,
        appointment_type_id,
        insurer_id,
        plan_id,
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE appointments
        SET doctor_id = $3,
            patient_id = $4,
            appointment_type_id = $5,
            insurer_id = $6,
            plan_id = $7,
            start_at = $8,
            end_at = $9,
            status = $10,
            notes = $11,
            fit_in = $12,
            updated_at = now()
        WHERE appointment_id = $1 AND organization_id = $2
        "#,
    )
    .bind(appointment_id)
    .bind(auth.organization_id)
    .bind(doctor_id)
    .bind(patient_id)
    .bind(appointment_type_id)
    .bind(insurer_id)
    .bind(plan_id)
    .bind(start_at)
    .bind(end_at)
    .bind(req.status.map_or(current.status, |s| next_status(current.status, s)))
    .bind(notes)
    .bind(req.fit_in.unwrap_or(current.fit_in))
    .execute(&state.db)
    .await
    .map_err(ApiError::write_failed("APPOINTMENT_UPDATE_FAILED"))?;

    let appt = fetch_appointment(&state, auth.organization_id, appointment_id).await?;
    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   PATCH /appointments/{id}/status
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
}

pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiOk<AgendaAppointment>>, ApiError> {
    auth.ensure_books_appointments()?;
    let current = fetch_appointment(&state, auth.organization_id, appointment_id)
        .await?
        .appointment;
    let status = next_status(current.status, req.status);

    let result = sqlx::query(
        r#"
        UPDATE appointments
        SET status = $3, updated_at = now()
        WHERE appointment_id = $1 AND organization_id = $2
        "#,
    )
    .bind(appointment_id)
    .bind(auth.organization_id)
    .bind(status)
    .execute(&state.db)
    .await
    .map_err(ApiError::write_failed("APPOINTMENT_UPDATE_FAILED"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }
    tracing::info!(%appointment_id, from = ?current.status, to = ?status, "appointment status set");

    let appt = fetch_appointment(&state, auth.organization_id, appointment_id).await?;
    Ok(Json(ApiOk { data: appt }))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_books_appointments()?;

    let result =
        sqlx::query("DELETE FROM appointments WHERE appointment_id = $1 AND organization_id = $2")
            .bind(appointment_id)
            .bind(auth.organization_id)
            .execute(&state.db)
            .await
            .map_err(ApiError::write_failed("APPOINTMENT_DELETE_FAILED"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }
    tracing::info!(%appointment_id, "appointment deleted");
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_body_keeps_absent_and_null_apart() {
        let req: UpdateAppointmentRequest =
            serde_json::from_str(r#"{"plan_id":null,"status":"no_show"}"#).unwrap();
        assert_eq!(req.plan_id, Some(None));
        assert_eq!(req.insurer_id, None);
        assert_eq!(req.status, Some(AppointmentStatus::NoShow));
    }

    #[test]
    fn create_body_defaults() {
        let req: CreateAppointmentRequest = serde_json::from_str(
            r#"{
                "doctor_id":"00000000-0000-0000-0000-000000000001",
                "patient_id":"00000000-0000-0000-0000-000000000002",
                "start_at":"2024-03-11T09:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(req.status, None);
        assert_eq!(req.fit_in, None);
        assert_eq!(req.appointment_type_id, None);
    }

    #[test_case::test_case(AppointmentStatus::Completed, "scheduled", AppointmentStatus::Scheduled)]
    #[test_case::test_case(AppointmentStatus::Cancelled, "confirmed", AppointmentStatus::Confirmed)]
    #[test_case::test_case(AppointmentStatus::NoShow, "completed", AppointmentStatus::Completed)]
    #[test_case::test_case(AppointmentStatus::Scheduled, "no_show", AppointmentStatus::NoShow)]
    fn terminal_states_can_be_set_back(
        current: AppointmentStatus,
        body: &str,
        expected: AppointmentStatus,
    ) {
        let req: StatusRequest =
            serde_json::from_str(&format!(r#"{{"status":"{body}"}}"#)).unwrap();
        assert_eq!(next_status(current, req.status), expected);
    }

    #[test]
    fn every_status_is_reachable_from_every_other() {
        use AppointmentStatus::*;
        let all = [Scheduled, Confirmed, Cancelled, Completed, NoShow];
        for from in all {
            for to in all {
                assert_eq!(next_status(from, to), to);
            }
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<StatusRequest>(r#"{"status":"done"}"#).is_err());
    }
}
