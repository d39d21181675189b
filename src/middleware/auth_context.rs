use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Role};

/// Who is calling and in which organization/unit. Handlers take it as an
/// argument; nothing reads tenant scope from anywhere else.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub profile_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub current_unit_id: Option<Uuid>,
}

impl AuthContext {
    pub fn require_unit(&self) -> Result<Uuid, ApiError> {
        self.current_unit_id.ok_or_else(|| {
            ApiError::BadRequest("NO_CURRENT_UNIT", "Select a unit first".into())
        })
    }

    pub fn ensure_manages_staff(&self) -> Result<(), ApiError> {
        if self.role.manages_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only admin/manager can do this".into(),
            ))
        }
    }

    pub fn ensure_books_appointments(&self) -> Result<(), ApiError> {
        if self.role.books_appointments() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Doctors cannot manage the agenda".into(),
            ))
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    profile_id: Uuid,
    organization_id: Uuid,
    role: Role,
    current_unit_id: Option<Uuid>,
    default_unit_id: Option<Uuid>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let row: SessionLookupRow = sqlx::query_as::<_, SessionLookupRow>(
                r#"
                SELECT st.session_token_id, p.profile_id, p.organization_id, p.role,
                       p.current_unit_id, p.default_unit_id
                FROM session_token st
                JOIN profiles p ON p.auth_user_id = st.auth_user_id
                WHERE st.session_token_hash = $1
                  AND st.revoked_at IS NULL
                  AND st.expires_at > now()
                "#,
            )
            .bind(&token_hash)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::db)?
            .ok_or_else(ApiError::session_expired)?;

            // Fall back to the default unit and remember it (best-effort).
            let current_unit_id = match (row.current_unit_id, row.default_unit_id) {
                (Some(unit), _) => Some(unit),
                (None, Some(default_unit)) => {
                    if let Err(e) = sqlx::query(
                        r#"
                        UPDATE profiles
                        SET current_unit_id = $2
                        WHERE profile_id = $1
                        "#,
                    )
                    .bind(row.profile_id)
                    .bind(default_unit)
                    .execute(&state.db)
                    .await
                    {
                        tracing::warn!(profile_id = %row.profile_id, error = %e, "could not persist default unit");
                    }
                    Some(default_unit)
                }
                (None, None) => None,
            };

            let _ = sqlx::query(
                r#"
                UPDATE session_token
                SET last_seen_at = now()
                WHERE session_token_id = $1
                "#,
            )
            .bind(row.session_token_id)
            .execute(&state.db)
            .await;

            Ok(AuthContext {
                profile_id: row.profile_id,
                organization_id: row.organization_id,
                role: row.role,
                current_unit_id,
            })
        }
    }
}
