// src/routes/schedule_routes.rs
//
// Per-doctor weekly hours and blocked periods (holidays, lunch, leave).

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, ScheduleBlock, ScheduleConfigRow, clean},
    routes::unit_routes::fetch_unit,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule/configs", get(list_configs).post(create_config))
        .route("/schedule/configs/{config_id}", delete(delete_config))
        .route("/schedule/blocks", get(list_blocks).post(create_block))
        .route("/schedule/blocks/{block_id}", delete(delete_block))
}

async fn ensure_doctor(state: &AppState, organization_id: Uuid, doctor_id: Uuid) -> Result<(), ApiError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM doctors WHERE doctor_id = $1 AND organization_id = $2)",
    )
    .bind(doctor_id)
    .bind(organization_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if !exists {
        return Err(ApiError::validation("doctor_id is unknown"));
    }
    Ok(())
}

/* ============================================================
   Weekly configs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ConfigQuery {
    pub doctor_id: Uuid,
    pub unit_id: Option<Uuid>,
}

pub async fn list_configs(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ConfigQuery>,
) -> Result<Json<ApiOk<Vec<ScheduleConfigRow>>>, ApiError> {
    let unit_id = match q.unit_id {
        Some(u) => u,
        None => auth.require_unit()?,
    };
    fetch_unit(&state, auth.organization_id, unit_id).await?;

    let rows = sqlx::query_as::<_, ScheduleConfigRow>(
        r#"
        SELECT config_id, doctor_id, unit_id, weekday, start_time, end_time, visit_duration_min
        FROM schedule_configs
        WHERE doctor_id = $1 AND unit_id = $2
        ORDER BY weekday ASC, start_time ASC
        "#,
    )
    .bind(q.doctor_id)
    .bind(unit_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;
    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct CreateConfigRequest {
    pub doctor_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub visit_duration_min: i32,
}

fn validate_config(req: &CreateConfigRequest) -> Result<(), ApiError> {
    if !(0..=6).contains(&req.weekday) {
        return Err(ApiError::validation("weekday must be between 0 (Sunday) and 6"));
    }
    if req.start_time == req.end_time {
        return Err(ApiError::validation("start_time and end_time must differ"));
    }
    if req.visit_duration_min < 1 {
        return Err(ApiError::validation("visit_duration_min must be at least 1"));
    }
    Ok(())
}

pub async fn create_config(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateConfigRequest>,
) -> Result<Json<ApiOk<ScheduleConfigRow>>, ApiError> {
    auth.ensure_manages_staff()?;
    validate_config(&req)?;
    let unit_id = match req.unit_id {
        Some(u) => u,
        None => auth.require_unit()?,
    };
    fetch_unit(&state, auth.organization_id, unit_id).await?;
    ensure_doctor(&state, auth.organization_id, req.doctor_id).await?;

    let row = sqlx::query_as::<_, ScheduleConfigRow>(
        r#"
        INSERT INTO schedule_configs (doctor_id, unit_id, weekday, start_time, end_time, visit_duration_min)
        VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING config_id, doctor_id, unit_id, weekday, start_time, end_time, visit_duration_min
        "#,
    )
    .bind(req.doctor_id)
    .bind(unit_id)
    .bind(req.weekday)
    .bind(req.start_time)
    .bind(req.end_time)
    .bind(req.visit_duration_min)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("SCHEDULE_CONFIG_CREATE_FAILED"))?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_config(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(config_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_manages_staff()?;
    let result = sqlx::query(
        r#"
        DELETE FROM schedule_configs c
        USING units u
        WHERE c.config_id = $1
          AND u.unit_id = c.unit_id
          AND u.organization_id = $2
        "#,
    )
    .bind(config_id)
    .bind(auth.organization_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::write_failed("SCHEDULE_CONFIG_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("schedule config"));
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

/* ============================================================
   Blocks
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct BlocksQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn list_blocks(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<BlocksQuery>,
) -> Result<Json<ApiOk<Vec<ScheduleBlock>>>, ApiError> {
    let unit_id = auth.require_unit()?;
    if q.end <= q.start {
        return Err(ApiError::validation("end must be after start"));
    }

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
    .bind(auth.organization_id)
    .bind(unit_id)
    .bind(q.start)
    .bind(q.end)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;
    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    pub doctor_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
}

pub async fn create_block(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateBlockRequest>,
) -> Result<Json<ApiOk<ScheduleBlock>>, ApiError> {
    auth.ensure_books_appointments()?;
    let unit_id = auth.require_unit()?;
    if req.end_at <= req.start_at {
        return Err(ApiError::validation("end_at must be after start_at"));
    }
    if let Some(doctor_id) = req.doctor_id {
        ensure_doctor(&state, auth.organization_id, doctor_id).await?;
    }

    let row = sqlx::query_as::<_, ScheduleBlock>(
        r#"
        INSERT INTO schedule_blocks (organization_id, unit_id, doctor_id, start_at, end_at, reason)
        VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING block_id, organization_id, unit_id, doctor_id, start_at, end_at, reason
        "#,
    )
    .bind(auth.organization_id)
    .bind(unit_id)
    .bind(req.doctor_id)
    .bind(req.start_at)
    .bind(req.end_at)
    .bind(clean(req.reason.as_deref()))
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("SCHEDULE_BLOCK_CREATE_FAILED"))?;

    tracing::info!(block_id = %row.block_id, %unit_id, "schedule block created");
    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_block(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(block_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_books_appointments()?;
    let result =
        sqlx::query("DELETE FROM schedule_blocks WHERE block_id = $1 AND organization_id = $2")
            .bind(block_id)
            .bind(auth.organization_id)
            .execute(&state.db)
            .await
            .map_err(ApiError::write_failed("SCHEDULE_BLOCK_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("schedule block"));
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(weekday: i16, start: (u32, u32), end: (u32, u32), duration: i32) -> CreateConfigRequest {
        CreateConfigRequest {
            doctor_id: Uuid::new_v4(),
            unit_id: None,
            weekday,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            visit_duration_min: duration,
        }
    }

    #[test_case::test_case(config(1, (8, 0), (12, 0), 20), true ; "weekday morning")]
    #[test_case::test_case(config(6, (22, 0), (2, 0), 60), true ; "overnight saturday")]
    #[test_case::test_case(config(7, (8, 0), (12, 0), 20), false ; "weekday out of range")]
    #[test_case::test_case(config(1, (8, 0), (8, 0), 20), false ; "empty window")]
    #[test_case::test_case(config(1, (8, 0), (12, 0), 0), false ; "zero duration")]
    fn config_validation(req: CreateConfigRequest, ok: bool) {
        assert_eq!(validate_config(&req).is_ok(), ok);
    }
}
