use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

use crate::services::attendance_workflow::AttendanceError;
use crate::utils::shift_time::InvalidTime;

/// MySQL reports duplicate keys as SQLSTATE 23000.
const DUPLICATE_KEY_SQLSTATE: &str = "23000";

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    Attendance(AttendanceError),

    #[display(fmt = "Database error: {}", _0)]
    Database(sqlx::Error),

    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Attendance(e) => match e {
                AttendanceError::LocationNotFound => StatusCode::NOT_FOUND,
                AttendanceError::AlreadyCheckedIn | AttendanceError::AlreadyCheckedOut => {
                    StatusCode::CONFLICT
                }
                AttendanceError::CorruptShift(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<AttendanceError> for AppError {
    fn from(e: AttendanceError) -> Self {
        AppError::Attendance(e)
    }
}

// A stored shift with an unparseable time is corrupt data, not bad input.
impl From<InvalidTime> for AppError {
    fn from(e: InvalidTime) -> Self {
        AppError::Internal(e.to_string())
    }
}

pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(DUPLICATE_KEY_SQLSTATE),
        _ => false,
    }
}
