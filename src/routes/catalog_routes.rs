// src/routes/catalog_routes.rs
//
// Per-organization lookup tables: specialties, appointment types, insurers
// and the insurers' plans.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, CatalogRow, InsurancePlanRow, OkData, required},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Specialties,
    AppointmentTypes,
    Insurers,
}

impl Catalog {
    fn table(self) -> &'static str {
        match self {
            Catalog::Specialties => "specialties",
            Catalog::AppointmentTypes => "appointment_types",
            Catalog::Insurers => "insurers",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Catalog::Specialties => "specialty",
            Catalog::AppointmentTypes => "appointment type",
            Catalog::Insurers => "insurer",
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/specialties", get(list_specialties).post(create_specialty))
        .route("/specialties/{id}", delete(delete_specialty))
        .route(
            "/appointment-types",
            get(list_appointment_types).post(create_appointment_type),
        )
        .route("/appointment-types/{id}", delete(delete_appointment_type))
        .route("/insurers", get(list_insurers).post(create_insurer))
        .route("/insurers/{id}", delete(delete_insurer))
        .route("/insurers/{id}/plans", get(list_plans).post(create_plan))
        .route("/plans/{plan_id}", delete(delete_plan))
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

async fn list_catalog(
    state: &AppState,
    auth: &AuthContext,
    catalog: Catalog,
) -> Result<Vec<CatalogRow>, ApiError> {
    sqlx::query_as::<_, CatalogRow>(&format!(
        "SELECT id, organization_id, name, created_at FROM {} WHERE organization_id = $1 ORDER BY name ASC",
        catalog.table()
    ))
    .bind(auth.organization_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)
}

async fn create_catalog(
    state: &AppState,
    auth: &AuthContext,
    catalog: Catalog,
    req: NameRequest,
) -> Result<CatalogRow, ApiError> {
    auth.ensure_manages_staff()?;
    let name = required("name", &req.name)?;
    sqlx::query_as::<_, CatalogRow>(&format!(
        "INSERT INTO {} (organization_id, name) VALUES ($1, $2) RETURNING id, organization_id, name, created_at",
        catalog.table()
    ))
    .bind(auth.organization_id)
    .bind(name)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("CATALOG_CREATE_FAILED"))
}

async fn delete_catalog(
    state: &AppState,
    auth: &AuthContext,
    catalog: Catalog,
    id: Uuid,
) -> Result<OkData, ApiError> {
    auth.ensure_manages_staff()?;
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE id = $1 AND organization_id = $2",
        catalog.table()
    ))
    .bind(id)
    .bind(auth.organization_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::write_failed("CATALOG_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(catalog.label()));
    }
    Ok(OkData { ok: true })
}

pub async fn list_specialties(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<CatalogRow>>>, ApiError> {
    let data = list_catalog(&state, &auth, Catalog::Specialties).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn create_specialty(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NameRequest>,
) -> Result<Json<ApiOk<CatalogRow>>, ApiError> {
    let data = create_catalog(&state, &auth, Catalog::Specialties, req).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn delete_specialty(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let data = delete_catalog(&state, &auth, Catalog::Specialties, id).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn list_appointment_types(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<CatalogRow>>>, ApiError> {
    let data = list_catalog(&state, &auth, Catalog::AppointmentTypes).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn create_appointment_type(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NameRequest>,
) -> Result<Json<ApiOk<CatalogRow>>, ApiError> {
    let data = create_catalog(&state, &auth, Catalog::AppointmentTypes, req).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn delete_appointment_type(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let data = delete_catalog(&state, &auth, Catalog::AppointmentTypes, id).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn list_insurers(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<CatalogRow>>>, ApiError> {
    let data = list_catalog(&state, &auth, Catalog::Insurers).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn create_insurer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NameRequest>,
) -> Result<Json<ApiOk<CatalogRow>>, ApiError> {
    let data = create_catalog(&state, &auth, Catalog::Insurers, req).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn delete_insurer(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let data = delete_catalog(&state, &auth, Catalog::Insurers, id).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   Plans (scoped through their insurer)
   ============================================================ */

async fn ensure_insurer(state: &AppState, auth: &AuthContext, insurer_id: Uuid) -> Result<(), ApiError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM insurers WHERE id = $1 AND organization_id = $2)",
    )
    .bind(insurer_id)
    .bind(auth.organization_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if !exists {
        return Err(ApiError::not_found("insurer"));
    }
    Ok(())
}

pub async fn list_plans(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(insurer_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<InsurancePlanRow>>>, ApiError> {
    ensure_insurer(&state, &auth, insurer_id).await?;
    let rows = sqlx::query_as::<_, InsurancePlanRow>(
        r#"
        SELECT plan_id, insurer_id, name, created_at
        FROM insurance_plans
        WHERE insurer_id = $1
        ORDER BY name ASC
        "#,
    )
    .bind(insurer_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn create_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(insurer_id): Path<Uuid>,
    Json(req): Json<NameRequest>,
) -> Result<Json<ApiOk<InsurancePlanRow>>, ApiError> {
    auth.ensure_manages_staff()?;
    ensure_insurer(&state, &auth, insurer_id).await?;
    let name = required("name", &req.name)?;

    let row = sqlx::query_as::<_, InsurancePlanRow>(
        r#"
        INSERT INTO insurance_plans (insurer_id, name)
        VALUES ($1, $2)
        RETURNING plan_id, insurer_id, name, created_at
        "#,
    )
    .bind(insurer_id)
    .bind(name)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("PLAN_CREATE_FAILED"))?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_manages_staff()?;
    let result = sqlx::query(
        r#"
        DELETE FROM insurance_plans pl
        USING insurers i
        WHERE pl.plan_id = $1
          AND i.id = pl.insurer_id
          AND i.organization_id = $2
        "#,
    )
    .bind(plan_id)
    .bind(auth.organization_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::write_failed("PLAN_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("plan"));
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
