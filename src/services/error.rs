use crate::models::ParseStatusError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::serde::json::Json;
use rocket::Responder;
use serde::Serialize;

/// Failure of a service operation, independent of the surface that invoked it.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        ServiceError::InvalidInput(detail.into())
    }

    /// Logs the detail and keeps only a generic message for the caller.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{context}");
        ServiceError::InternalError(context.to_string())
    }

    /// Machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::InternalError(_) => "internal_server_error",
        }
    }

    pub fn status(&self) -> rocket::http::Status {
        use rocket::http::Status;
        match self {
            ServiceError::InvalidInput(_) => Status::BadRequest,
            ServiceError::Unauthorized(_) => Status::Unauthorized,
            ServiceError::Forbidden(_) => Status::Forbidden,
            ServiceError::NotFound(_) => Status::NotFound,
            ServiceError::Conflict(_) => Status::Conflict,
            ServiceError::InternalError(_) => Status::InternalServerError,
        }
    }

    /// Text that is safe to show to the client.
    pub fn message(&self) -> String {
        match self {
            ServiceError::InternalError(_) => "An unexpected error occurred on the server.".to_string(),
            ServiceError::InvalidInput(detail)
            | ServiceError::Unauthorized(detail)
            | ServiceError::Forbidden(detail)
            | ServiceError::NotFound(detail)
            | ServiceError::Conflict(detail) => detail.clone(),
        }
    }
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ServiceError::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ServiceError::Conflict("Record already exists".to_string())
            }
            other => ServiceError::internal("database error", other),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::internal("failed to get DB connection", err)
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ServiceError::internal("password hashing failed", err)
    }
}

impl From<ParseStatusError> for ServiceError {
    fn from(err: ParseStatusError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

// Serializable error response struct
#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    pub error: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorDetail {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// JSON rendering of a `ServiceError`, one variant per status code.
#[derive(Responder, Debug)]
pub enum ApiError {
    #[response(status = 400)]
    BadRequest(Json<ErrorDetail>),
    #[response(status = 401)]
    Unauthorized(Json<ErrorDetail>),
    #[response(status = 403)]
    Forbidden(Json<ErrorDetail>),
    #[response(status = 404)]
    NotFound(Json<ErrorDetail>),
    #[response(status = 409)]
    Conflict(Json<ErrorDetail>),
    #[response(status = 500)]
    InternalError(Json<ErrorDetail>),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let detail = Json(ErrorDetail::new(err.code(), err.message()));
        match err {
            ServiceError::InvalidInput(_) => ApiError::BadRequest(detail),
            ServiceError::Unauthorized(_) => ApiError::Unauthorized(detail),
            ServiceError::Forbidden(_) => ApiError::Forbidden(detail),
            ServiceError::NotFound(_) => ApiError::NotFound(detail),
            ServiceError::Conflict(_) => ApiError::Conflict(detail),
            ServiceError::InternalError(_) => ApiError::InternalError(detail),
        }
    }
}
