// src/routes/unit_routes.rs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveTime;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, UnitRow, clean, deserialize_double_option, required},
};

/// Shortest visit a unit may be configured with.
pub const MIN_VISIT_DURATION_MIN: i32 = 5;

const UNIT_COLUMNS: &str = "unit_id, organization_id, name, address, phone, opening_time, closing_time, visit_duration_min, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/units", get(list_units).post(create_unit))
        .route(
            "/units/{unit_id}",
            get(get_unit).patch(update_unit).delete(delete_unit),
        )
}

pub async fn fetch_unit(
    state: &AppState,
    organization_id: Uuid,
    unit_id: Uuid,
) -> Result<UnitRow, ApiError> {
    sqlx::query_as::<_, UnitRow>(&format!(
        "SELECT {UNIT_COLUMNS} FROM units WHERE unit_id = $1 AND organization_id = $2"
    ))
    .bind(unit_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("unit"))
}

/// "HH:mm" (seconds tolerated).
fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, ApiError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ApiError::validation(format!("{field} must be HH:mm")))
}

fn parse_optional_time(field: &str, raw: Option<&str>) -> Result<Option<NaiveTime>, ApiError> {
    clean(raw).map(|s| parse_time(field, &s)).transpose()
}

fn validate_duration(minutes: i32) -> Result<i32, ApiError> {
    if minutes < MIN_VISIT_DURATION_MIN {
        return Err(ApiError::validation(format!(
            "visit_duration_min must be at least {MIN_VISIT_DURATION_MIN}"
        )));
    }
    Ok(minutes)
}

pub async fn list_units(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UnitRow>>>, ApiError> {
    let rows = sqlx::query_as::<_, UnitRow>(&format!(
        "SELECT {UNIT_COLUMNS} FROM units WHERE organization_id = $1 ORDER BY name ASC"
    ))
    .bind(auth.organization_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_unit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<ApiOk<UnitRow>>, ApiError> {
    let unit = fetch_unit(&state, auth.organization_id, unit_id).await?;
    Ok(Json(ApiOk { data: unit }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUnitRequest {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub visit_duration_min: Option<i32>,
}

pub async fn create_unit(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUnitRequest>,
) -> Result<Json<ApiOk<UnitRow>>, ApiError> {
    auth.ensure_manages_staff()?;

    let name = required("name", &req.name)?;
    let opening = parse_optional_time("opening_time", req.opening_time.as_deref())?;
    let closing = parse_optional_time("closing_time", req.closing_time.as_deref())?;
    let duration = validate_duration(req.visit_duration_min.unwrap_or(15))?;

    let row = sqlx::query_as::<_, UnitRow>(&format!(
        r#"
        INSERT INTO units (organization_id, name, address, phone, opening_time, closing_time, visit_duration_min)
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING {UNIT_COLUMNS}
        "#
    ))
    .bind(auth.organization_id)
    .bind(name)
    .bind(clean(req.address.as_deref()))
    .bind(clean(req.phone.as_deref()))
    .bind(opening)
    .bind(closing)
    .bind(duration)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("UNIT_CREATE_FAILED"))?;

    tracing::info!(unit_id = %row.unit_id, "unit created");
    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUnitRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub opening_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub closing_time: Option<Option<String>>,
    pub visit_duration_min: Option<i32>,
}

pub async fn update_unit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(unit_id): Path<Uuid>,
    Json(req): Json<UpdateUnitRequest>,
) -> Result<Json<ApiOk<UnitRow>>, ApiError> {
    auth.ensure_manages_staff()?;

    let current = fetch_unit(&state, auth.organization_id, unit_id).await?;

    let name = match req.name.as_deref() {
        Some(n) => required("name", n)?,
        None => current.name,
    };
    let address = match req.address {
        Some(v) => clean(v.as_deref()),
        None => current.address,
    };
    let phone = match req.phone {
        Some(v) => clean(v.as_deref()),
        None => current.phone,
    };
    let opening = match req.opening_time {
        Some(v) => parse_optional_time("opening_time", v.as_deref())?,
        None => current.opening_time,
    };
    let closing = match req.closing_time {
        Some(v) => parse_optional_time("closing_time", v.as_deref())?,
        None => current.closing_time,
    };
    let duration = match req.visit_duration_min {
        Some(d) => validate_duration(d)?,
        None => current.visit_duration_min,
    };

    let row = sqlx::query_as::<_, UnitRow>(&format!(
        r#"
        UPDATE units
        SET name = $3, address = $4, phone = $5,
            opening_time = $6, closing_time = $7, visit_duration_min = $8
        WHERE unit_id = $1 AND organization_id = $2
        RETURNING {UNIT_COLUMNS}
        "#
    ))
    .bind(unit_id)
    .bind(auth.organization_id)
    .bind(name)
    .bind(address)
    .bind(phone)
    .bind(opening)
    .bind(closing)
    .bind(duration)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::write_failed("UNIT_UPDATE_FAILED"))?
    .ok_or_else(|| ApiError::not_found("unit"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_unit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_manages_staff()?;

    let result = sqlx::query("DELETE FROM units WHERE unit_id = $1 AND organization_id = $2")
        .bind(unit_id)
        .bind(auth.organization_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::write_failed("UNIT_DELETE_FAILED"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("unit"));
    }
    tracing::info!(%unit_id, "unit deleted");
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case::test_case("08:00", 8, 0)]
    #[test_case::test_case(" 22:30 ", 22, 30)]
    #[test_case::test_case("07:15:00", 7, 15)]
    fn accepts_clock_times(raw: &str, h: u32, m: u32) {
        assert_eq!(
            parse_time("opening_time", raw).unwrap(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage_times() {
        assert!(parse_time("opening_time", "8h").is_err());
        assert!(parse_time("opening_time", "25:00").is_err());
    }

    #[test]
    fn blank_time_clears_the_field() {
        assert_eq!(parse_optional_time("closing_time", Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_time("closing_time", None).unwrap(), None);
    }

    #[test]
    fn visit_duration_has_a_floor() {
        assert!(validate_duration(4).is_err());
        assert!(validate_duration(0).is_err());
        assert_eq!(validate_duration(5).unwrap(), 5);
    }
}
