// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, PatientRow, clean, deserialize_double_option, required},
};

const PATIENT_COLUMNS: &str =
    "patient_id, organization_id, name, document, birth_date, phone, email, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(search_patients).post(create_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
}

async fn fetch_patient(
    state: &AppState,
    organization_id: Uuid,
    patient_id: Uuid,
) -> Result<PatientRow, ApiError> {
    sqlx::query_as::<_, PatientRow>(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = $1 AND organization_id = $2"
    ))
    .bind(patient_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("patient"))
}

fn validate_email(email: Option<String>) -> Result<Option<String>, ApiError> {
    match email {
        Some(e) if !e.contains('@') => Err(ApiError::validation("email is invalid")),
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn search_patients(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    let like = clean(q.query.as_deref()).map(|s| format!("%{s}%"));

    let rows = sqlx::query_as::<_, PatientRow>(&format!(
        r#"
        SELECT {PATIENT_COLUMNS}
        FROM patients
        WHERE organization_id = $1
          AND ($2::text IS NULL
               OR name ILIKE $2
               OR document ILIKE $2
               OR phone ILIKE $2
               OR email ILIKE $2)
        ORDER BY name ASC
        LIMIT 200
        "#
    ))
    .bind(auth.organization_id)
    .bind(like)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let row = fetch_patient(&state, auth.organization_id, patient_id).await?;
    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub document: Option<String>,
    pub birth_date: Option<chrono::NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let name = required("name", &req.name)?;
    let email = validate_email(clean(req.email.as_deref()))?;

    let row = sqlx::query_as::<_, PatientRow>(&format!(
        r#"
        INSERT INTO patients (organization_id, name, document, birth_date, phone, email)
        VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING {PATIENT_COLUMNS}
        "#
    ))
    .bind(auth.organization_id)
    .bind(name)
    .bind(clean(req.document.as_deref()))
    .bind(req.birth_date)
    .bind(clean(req.phone.as_deref()))
    .bind(email)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("PATIENT_CREATE_FAILED"))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub document: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub birth_date: Option<Option<chrono::NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
}

pub async fn update_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let current = fetch_patient(&state, auth.organization_id, patient_id).await?;

    let name = match req.name.as_deref() {
        Some(n) => required("name", n)?,
        None => current.name,
    };
    let document = match req.document {
        Some(v) => clean(v.as_deref()),
        None => current.document,
    };
    let phone = match req.phone {
        Some(v) => clean(v.as_deref()),
        None => current.phone,
    };
    let email = match req.email {
        Some(v) => validate_email(clean(v.as_deref()))?,
        None => current.email,
    };
    let birth_date = req.birth_date.unwrap_or(current.birth_date);

    let row = sqlx::query_as::<_, PatientRow>(&format!(
        r#"
        UPDATE patients
        SET name = $3, document = $4, birth_date = $5, phone = $6, email = $7
        WHERE patient_id = $1 AND organization_id = $2
        RETURNING {PATIENT_COLUMNS}
        "#
    ))
    .bind(patient_id)
    .bind(auth.organization_id)
    .bind(name)
    .bind(document)
    .bind(birth_date)
    .bind(phone)
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::write_failed("PATIENT_UPDATE_FAILED"))?
    .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let result = sqlx::query("DELETE FROM patients WHERE patient_id = $1 AND organization_id = $2")
        .bind(patient_id)
        .bind(auth.organization_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::write_failed("PATIENT_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("patient"));
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_an_at_sign() {
        assert!(validate_email(Some("ana.example.com".into())).is_err());
        assert_eq!(
            validate_email(Some("ana@example.com".into())).unwrap(),
            Some("ana@example.com".into())
        );
        assert_eq!(validate_email(None).unwrap(), None);
    }
}
