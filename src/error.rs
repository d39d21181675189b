use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::agenda::AgendaError;
use crate::agenda::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound("NOT_FOUND", format!("{what} not found"))
    }

    /// Read-side store failures.
    pub fn db(e: sqlx::Error) -> Self {
        ApiError::Internal(format!("db error: {e}"))
    }

    /// Write-side store failures; the store message is passed through.
    pub fn write_failed(code: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict(code, db.message().to_string())
            }
            sqlx::Error::Database(db) => ApiError::BadRequest(code, db.message().to_string()),
            _ => ApiError::Internal(format!("db error: {e}")),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<AgendaError> for ApiError {
    fn from(e: AgendaError) -> Self {
        match e {
            AgendaError::InvalidDuration(_)
            | AgendaError::InvalidInterval { .. }
            | AgendaError::NotASlot(_) => {
                ApiError::BadRequest("VALIDATION_ERROR", e.to_string())
            }
            AgendaError::AppointmentNotFound(_) => ApiError::NotFound("NOT_FOUND", e.to_string()),
            AgendaError::Store(StoreError::NotFound(_)) => {
                ApiError::NotFound("NOT_FOUND", e.to_string())
            }
            AgendaError::Store(StoreError::Rejected(msg)) => {
                ApiError::BadRequest("APPOINTMENT_MOVE_FAILED", msg)
            }
            AgendaError::Store(StoreError::Database(db)) => {
                ApiError::write_failed("APPOINTMENT_MOVE_FAILED")(db)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(?self, "request failed");
        }
        let body = match &self {
            ApiError::Unauthorized(code, msg)
            | ApiError::Forbidden(code, msg)
            | ApiError::BadRequest(code, msg)
            | ApiError::NotFound(code, msg)
            | ApiError::Conflict(code, msg) => ApiError::to_error_response(code, msg),
            ApiError::Internal(msg) => ApiError::to_error_response("INTERNAL", msg),
        };
        (status, body).into_response()
    }
}
