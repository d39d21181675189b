// src/routes/agenda_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    agenda::{
        AgendaDay, DayGrid, DoctorColumn, RescheduleOutcome, Slot, UnitHours, generate_slots,
        slots::label, store::PgAppointmentStore,
    },
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    routes::unit_routes::fetch_unit,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agenda/slots", get(get_slots))
        .route("/agenda/day", get(get_day))
        .route("/agenda/appointments/{appointment_id}/move", post(move_appointment))
}

/// `YYYY-MM-DD`, or today on the clinic's wall clock.
pub fn parse_day(raw: Option<&str>, offset: FixedOffset) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::validation("date must be YYYY-MM-DD")),
        None => Ok(Utc::now().with_timezone(&offset).date_naive()),
    }
}

async fn doctor_columns(
    state: &AppState,
    organization_id: Uuid,
    doctor_id: Option<Uuid>,
) -> Result<Vec<DoctorColumn>, ApiError> {
    let rows: Vec<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT doctor_id, name
        FROM doctors
        WHERE organization_id = $1
          AND ($2::uuid IS NULL OR doctor_id = $2)
        ORDER BY name ASC
        "#,
    )
    .bind(organization_id)
    .bind(doctor_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    if doctor_id.is_some() && rows.is_empty() {
        return Err(ApiError::not_found("doctor"));
    }

    Ok(rows
        .into_iter()
        .map(|(doctor_id, name)| DoctorColumn { doctor_id, name })
        .collect())
}

/* ============================================================
   GET /agenda/slots
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SlotDto {
    #[serde(flatten)]
    pub slot: Slot,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct SlotsData {
    pub date: NaiveDate,
    pub unit_id: Uuid,
    pub visit_duration_min: i32,
    pub slots: Vec<SlotDto>,
}

pub async fn get_slots(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<DayQuery>,
) -> Result<Json<ApiOk<SlotsData>>, ApiError> {
    let unit_id = auth.require_unit()?;
    let date = parse_day(q.date.as_deref(), state.clinic_offset)?;
    let unit = fetch_unit(&state, auth.organization_id, unit_id).await?;
    let hours = UnitHours::from_unit(&unit);

    let slots = generate_slots(&hours, date, state.clinic_offset)?
        .into_iter()
        .map(|slot| SlotDto {
            label: label(slot.start, state.clinic_offset),
            slot,
        })
        .collect();

    Ok(Json(ApiOk {
        data: SlotsData {
            date,
            unit_id,
            visit_duration_min: hours.visit_duration_min,
            slots,
        },
    }))
}

/* ============================================================
   GET /agenda/day
   ============================================================ */

pub async fn get_day(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<DayQuery>,
) -> Result<Json<ApiOk<DayGrid>>, ApiError> {
    let unit_id = auth.require_unit()?;
    let date = parse_day(q.date.as_deref(), state.clinic_offset)?;
    let unit = fetch_unit(&state, auth.organization_id, unit_id).await?;
    let doctors = doctor_columns(&state, auth.organization_id, q.doctor_id).await?;

    let store = PgAppointmentStore::new(state.db.clone(), auth.organization_id);
    let day = AgendaDay::load(
        &store,
        unit_id,
        UnitHours::from_unit(&unit),
        date,
        state.clinic_offset,
        q.doctor_id,
    )
    .await?;

    Ok(Json(ApiOk {
        data: day.grid(&doctors, Utc::now()),
    }))
}

/* ============================================================
   POST /agenda/appointments/{id}/move
   ============================================================ */

async fn appointment_start(
    state: &AppState,
    organization_id: Uuid,
    appointment_id: Uuid,
) -> Result<DateTime<Utc>, ApiError> {
    sqlx::query_scalar(
        "SELECT start_at FROM appointments WHERE appointment_id = $1 AND organization_id = $2",
    )
    .bind(appointment_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub target_start: DateTime<Utc>,
    pub target_doctor_id: Uuid,
    /// Day shown in the agenda; defaults to the day the appointment is on.
    pub date: Option<String>,
    /// Column filter of the view, if any.
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MoveData {
    pub outcome: RescheduleOutcome,
    pub grid: DayGrid,
}

pub async fn move_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<ApiOk<MoveData>>, ApiError> {
    auth.ensure_books_appointments()?;
    let unit_id = auth.require_unit()?;
    let unit = fetch_unit(&state, auth.organization_id, unit_id).await?;
    let hours = UnitHours::from_unit(&unit);

    let date = match req.date.as_deref() {
        Some(raw) => parse_day(Some(raw), state.clinic_offset)?,
        None => {
            let start = appointment_start(&state, auth.organization_id, appointment_id).await?;
            hours.agenda_day(start, state.clinic_offset)
        }
    };

    let doctors = doctor_columns(&state, auth.organization_id, req.doctor_id).await?;
    let target_name = doctors
        .iter()
        .find(|d| d.doctor_id == req.target_doctor_id)
        .map(|d| d.name.clone());

    let store = PgAppointmentStore::new(state.db.clone(), auth.organization_id);
    let mut day = AgendaDay::load(
        &store,
        unit_id,
        hours,
        date,
        state.clinic_offset,
        req.doctor_id,
    )
    .await?;

    let outcome = day
        .reschedule(
            &store,
            appointment_id,
            req.target_start,
            req.target_doctor_id,
            target_name.as_deref(),
        )
        .await?;

    Ok(Json(ApiOk {
        data: MoveData {
            outcome,
            grid: day.grid(&doctors, Utc::now()),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_day_is_parsed() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            parse_day(Some(" 2024-03-11 "), offset).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
        );
    }

    #[test]
    fn malformed_day_is_a_validation_error() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert!(matches!(
            parse_day(Some("11/03/2024"), offset),
            Err(ApiError::BadRequest("VALIDATION_ERROR", _))
        ));
    }

    #[test]
    fn missing_day_means_today() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(parse_day(None, offset).unwrap(), Utc::now().date_naive());
        assert_eq!(parse_day(Some(""), offset).unwrap(), Utc::now().date_naive());
    }
}
