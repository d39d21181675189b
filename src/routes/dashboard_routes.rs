// src/routes/dashboard_routes.rs

use axum::{Json, Router, extract::State, routing::get};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::agenda::slots::day_bounds;
use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState, AppointmentStatus};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DayCounts {
    pub appointments_today: i64,
    pub confirmed_today: i64,
    pub pending_today: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub today: DayCounts,
    pub patients_total: i64,
    pub doctors_total: i64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

/// Today's numbers for the current unit (or the whole organization when
/// no unit is selected).
pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<DashboardData>>, ApiError> {
    let date = Utc::now().with_timezone(&state.clinic_offset).date_naive();
    let (from, to) = day_bounds(date, state.clinic_offset);

    let today = sqlx::query_as::<_, DayCounts>(
        r#"
        SELECT
          COUNT(*)                            AS appointments_today,
          COUNT(*) FILTER (WHERE status = $5) AS confirmed_today,
          COUNT(*) FILTER (WHERE status = $6) AS pending_today
        FROM appointments
        WHERE organization_id = $1
          AND ($2::uuid IS NULL OR unit_id = $2)
          AND start_at >= $3
          AND start_at < $4
        "#,
    )
    .bind(auth.organization_id)
    .bind(auth.current_unit_id)
    .bind(from)
    .bind(to)
    .bind(AppointmentStatus::Confirmed)
    .bind(AppointmentStatus::Scheduled)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let (patients_total, doctors_total): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
          (SELECT COUNT(*) FROM patients WHERE organization_id = $1),
          (SELECT COUNT(*) FROM doctors  WHERE organization_id = $1)
        "#,
    )
    .bind(auth.organization_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: DashboardData {
            date,
            today,
            patients_total,
            doctors_total,
        },
    }))
}
