// src/routes/profile_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, OkData, OrganizationRow, ProfileRow, Role, UnitRow,
        deserialize_double_option, required,
    },
    routes::unit_routes::fetch_unit,
};

const PROFILE_COLUMNS: &str = "profile_id, auth_user_id, organization_id, name, email, role, current_unit_id, default_unit_id, created_at";

/// Passwords shorter than this are refused by the auth provider too.
const MIN_PASSWORD_LEN: usize = 6;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_profiles).post(create_user))
        .route("/profiles/{profile_id}", patch(update_profile).delete(delete_profile))
        .route("/me", get(me))
        .route("/me/unit", post(switch_unit))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProfileWithUnit {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: ProfileRow,
    pub default_unit_name: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuthUserRow {
    pub auth_user_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

fn validate_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::validation("email is invalid")),
    }
}

async fn ensure_unit_in_org(
    state: &AppState,
    organization_id: Uuid,
    unit_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if let Some(unit_id) = unit_id {
        fetch_unit(state, organization_id, unit_id)
            .await
            .map_err(|_| ApiError::validation("default_unit_id is unknown"))?;
    }
    Ok(())
}

async fn fetch_profile(
    state: &AppState,
    organization_id: Uuid,
    profile_id: Uuid,
) -> Result<ProfileRow, ApiError> {
    sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE profile_id = $1 AND organization_id = $2"
    ))
    .bind(profile_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("profile"))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ProfileWithUnit>>>, ApiError> {
    auth.ensure_manages_staff()?;
    let rows = sqlx::query_as::<_, ProfileWithUnit>(
        r#"
        SELECT p.profile_id, p.auth_user_id, p.organization_id, p.name, p.email, p.role,
               p.current_unit_id, p.default_unit_id, p.created_at,
               u.name AS default_unit_name
        FROM profiles p
        LEFT JOIN units u ON u.unit_id = p.default_unit_id
        WHERE p.organization_id = $1
        ORDER BY p.name ASC
        "#,
    )
    .bind(auth.organization_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;
    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   POST /profiles  (auth identity + profile)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub organization_id: Uuid,
    pub role: Role,
    pub default_unit_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserData {
    pub user: AuthUserRow,
    pub profile: ProfileRow,
}

fn user_create_failed(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) => ApiError::BadRequest("USER_CREATE_FAILED", db.message().to_string()),
        _ => ApiError::BadRequest("USER_CREATE_FAILED", e.to_string()),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiOk<CreateUserData>>, ApiError> {
    auth.ensure_manages_staff()?;
    if req.organization_id != auth.organization_id {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Users can only be created in your own organization".into(),
        ));
    }

    let email = validate_email(&req.email)?;
    let name = required("name", &req.name)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    ensure_unit_in_org(&state, auth.organization_id, req.default_unit_id).await?;

    let password_hash = hash_password(&req.password).map_err(ApiError::Internal)?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let user = sqlx::query_as::<_, AuthUserRow>(
        r#"
        INSERT INTO auth_user (email, password_hash)
        VALUES ($1, $2)
        RETURNING auth_user_id, email, created_at
        "#,
    )
    .bind(&email)
    .bind(password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(user_create_failed)?;

    // A profile registered earlier for this email gets linked instead of duplicated.
    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT profile_id FROM profiles WHERE lower(email) = $1 AND organization_id = $2",
    )
    .bind(&email)
    .bind(auth.organization_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(user_create_failed)?;

    let profile = match existing {
        Some(profile_id) => sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            UPDATE profiles
            SET auth_user_id = $2, name = $3, role = $4, default_unit_id = $5
            WHERE profile_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(profile_id)
        .bind(user.auth_user_id)
        .bind(&name)
        .bind(req.role)
        .bind(req.default_unit_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(user_create_failed)?,
        None => sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            INSERT INTO profiles (auth_user_id, organization_id, name, email, role, default_unit_id)
            VALUES ($1,$2,$3,$4,$5,$6)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user.auth_user_id)
        .bind(auth.organization_id)
        .bind(&name)
        .bind(&email)
        .bind(req.role)
        .bind(req.default_unit_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(user_create_failed)?,
    };

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(
        auth_user_id = %user.auth_user_id,
        profile_id = %profile.profile_id,
        linked_existing = existing.is_some(),
        "user created"
    );

    Ok(Json(ApiOk {
        data: CreateUserData { user, profile },
    }))
}

/* ============================================================
   PATCH/DELETE /profiles/{id}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub default_unit_id: Option<Option<Uuid>>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiOk<ProfileRow>>, ApiError> {
    auth.ensure_manages_staff()?;
    let current = fetch_profile(&state, auth.organization_id, profile_id).await?;

    let name = match req.name.as_deref() {
        Some(n) => required("name", n)?,
        None => current.name,
    };
    let default_unit_id = req.default_unit_id.unwrap_or(current.default_unit_id);
    ensure_unit_in_org(&state, auth.organization_id, default_unit_id).await?;

    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        r#"
        UPDATE profiles
        SET name = $3, role = $4, default_unit_id = $5
        WHERE profile_id = $1 AND organization_id = $2
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(profile_id)
    .bind(auth.organization_id)
    .bind(name)
    .bind(req.role.unwrap_or(current.role))
    .bind(default_unit_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::write_failed("PROFILE_UPDATE_FAILED"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_manages_staff()?;
    if profile_id == auth.profile_id {
        return Err(ApiError::validation("you cannot delete your own profile"));
    }
    let result = sqlx::query("DELETE FROM profiles WHERE profile_id = $1 AND organization_id = $2")
        .bind(profile_id)
        .bind(auth.organization_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::write_failed("PROFILE_DELETE_FAILED"))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("profile"));
    }
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

/* ============================================================
   /me
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct MeData {
    pub profile: ProfileRow,
    pub organization: OrganizationRow,
    pub current_unit: Option<UnitRow>,
}

async fn me_data(state: &AppState, auth: &AuthContext) -> Result<MeData, ApiError> {
    let mut profile = fetch_profile(state, auth.organization_id, auth.profile_id).await?;
    profile.current_unit_id = auth.current_unit_id;

    let organization = sqlx::query_as::<_, OrganizationRow>(
        "SELECT organization_id, name, tax_id, created_at FROM organizations WHERE organization_id = $1",
    )
    .bind(auth.organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("organization"))?;

    let current_unit = match auth.current_unit_id {
        Some(unit_id) => Some(fetch_unit(state, auth.organization_id, unit_id).await?),
        None => None,
    };

    Ok(MeData {
        profile,
        organization,
        current_unit,
    })
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let data = me_data(&state, &auth).await?;
    Ok(Json(ApiOk { data }))
}

#[derive(Debug, Deserialize)]
pub struct SwitchUnitRequest {
    pub unit_id: Uuid,
}

pub async fn switch_unit(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Json(req): Json<SwitchUnitRequest>,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    fetch_unit(&state, auth.organization_id, req.unit_id).await?;

    sqlx::query("UPDATE profiles SET current_unit_id = $2 WHERE profile_id = $1")
        .bind(auth.profile_id)
        .bind(req.unit_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::write_failed("PROFILE_UPDATE_FAILED"))?;

    tracing::info!(profile_id = %auth.profile_id, unit_id = %req.unit_id, "current unit switched");
    auth.current_unit_id = Some(req.unit_id);

    let data = me_data(&state, &auth).await?;
    Ok(Json(ApiOk { data }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case::test_case(" Ana@Clinic.com ", Some("ana@clinic.com"))]
    #[test_case::test_case("ana@clinic", None)]
    #[test_case::test_case("@clinic.com", None)]
    #[test_case::test_case("ana", None)]
    fn emails(raw: &str, expected: Option<&str>) {
        assert_eq!(validate_email(raw).ok().as_deref(), expected);
    }

    #[test]
    fn create_user_body_parses_role() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{
                "email":"ana@clinic.com",
                "password":"secret1",
                "name":"Ana",
                "organization_id":"00000000-0000-0000-0000-000000000001",
                "role":"front_desk"
            }"#,
        )
        .unwrap();
        assert_eq!(req.role, Role::FrontDesk);
        assert_eq!(req.default_unit_id, None);
    }
}
