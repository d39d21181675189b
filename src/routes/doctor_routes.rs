// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, DoctorRow, DoctorWithSpecialty, OkData, clean, deserialize_double_option,
        required,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).patch(update_doctor).delete(delete_doctor),
        )
}

const DOCTOR_WITH_SPECIALTY_SELECT: &str = r#"
    SELECT d.doctor_id, d.organization_id, d.name, d.license_number, d.specialty_id,
           d.profile_id, d.created_at, s.name AS specialty_name
    FROM doctors d
    LEFT JOIN specialties s ON s.id = d.specialty_id
"#;

async fn fetch_doctor(
    state: &AppState,
    organization_id: Uuid,
    doctor_id: Uuid,
) -> Result<DoctorWithSpecialty, ApiError> {
    let sql = format!(
        "{DOCTOR_WITH_SPECIALTY_SELECT} WHERE d.doctor_id = $1 AND d.organization_id = $2"
    );
    sqlx::query_as::<_, DoctorWithSpecialty>(&sql)
        .bind(doctor_id)
        .bind(organization_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("doctor"))
}

async fn ensure_specialty(
    state: &AppState,
    organization_id: Uuid,
    specialty_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(specialty_id) = specialty_id else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM specialties WHERE id = $1 AND organization_id = $2)",
    )
    .bind(specialty_id)
    .bind(organization_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if !exists {
        return Err(ApiError::validation("specialty_id is unknown"));
    }
    Ok(())
}

pub async fn list_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DoctorWithSpecialty>>>, ApiError> {
    let sql = format!("{DOCTOR_WITH_SPECIALTY_SELECT} WHERE d.organization_id = $1 ORDER BY d.name ASC");
    let rows = sqlx::query_as::<_, DoctorWithSpecialty>(&sql)
        .bind(auth.organization_id)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<DoctorWithSpecialty>>, ApiError> {
    let doctor = fetch_doctor(&state, auth.organization_id, doctor_id).await?;
    Ok(Json(ApiOk { data: doctor }))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub license_number: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub profile_id: Option<Uuid>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorWithSpecialty>>, ApiError> {
    auth.ensure_manages_staff()?;
    let name = required("name", &req.name)?;
    ensure_specialty(&state, auth.organization_id, req.specialty_id).await?;

    let row: DoctorRow = sqlx::query_as::<_, DoctorRow>(
        r#"
        INSERT INTO doctors (organization_id, name, license_number, specialty_id, profile_id)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING doctor_id, organization_id, name, license_number, specialty_id, profile_id, created_at
        "#,
    )
    .bind(auth.organization_id)
    .bind(name)
    .bind(clean(req.license_number.as_deref()))
    .bind(req.specialty_id)
    .bind(req.profile_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("DOCTOR_CREATE_FAILED"))?;

    let doctor = fetch_doctor(&state, auth.organization_id, row.doctor_id).await?;
    Ok(Json(ApiOk { data: doctor }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub license_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub specialty_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub profile_id: Option<Option<Uuid>>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorWithSpecialty>>, ApiError> {
    auth.ensure_manages_staff()?;
    let current = fetch_doctor(&state, auth.organization_id, doctor_id).await?.doctor;

    let name = match req.name.as_deref() {
        Some(n) => required("name", n)?,
        None => current.name,
    };
    let license_number = match req.license_number {
        Some(v) => clean(v.as_deref()),
        None => current.license_number,
    };
    let specialty_id = req.specialty_id.unwrap_or(current.specialty_id);
    let profile_id = req.profile_id.unwrap_or(current.profile_id);
    ensure_specialty(&state, auth.organization_id, specialty_id).await?;

    sqlx::query(
        r#"
        UPDATE doctors
        SET name = $3, license_number = $4, specialty_id = $5, profile_id = $6
        WHERE doctor_id = $1 AND organization_id = $2
        "#,
    )
    .bind(doctor_id)
    .bind(auth.organization_id)
    .bind(name)
    .bind(license_number)
    .bind(specialty_id)
    .bind(profile_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::write_failed("DOCTOR_UPDATE_FAILED"))?;

    let doctor = fetch_doctor(&state, auth.organization_id, doctor_id).await?;
    Ok(Json(ApiOk { data: doctor }))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_manages_staff()?;
    let result = sqlx::query("DELETE FROM doctors WHERE doctor_id = $1 AND organization_id = $2")
        .bind(doctor_id)
        .bind(auth.organization_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::write_failed("DOCTOR_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("doctor"));
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
