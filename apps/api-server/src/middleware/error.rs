//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use nichofy_core::{DomainError, RepoError};
use nichofy_shared::ErrorResponse;
use std::fmt;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    InvalidQuery(String),
    Validation(String),
    Unauthorized,
    Forbidden(String),
    Unavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidQuery(msg) => write!(f, "Invalid query: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Unavailable(detail) = self {
            tracing::error!("Document store unavailable: {}", detail);
        }

        HttpResponse::build(self.status_code()).json(self.problem())
    }
}

impl AppError {
    /// Problem details body for this error.
    pub fn problem(&self) -> ErrorResponse {
        match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::InvalidQuery(detail) => ErrorResponse::invalid_query(detail),
            AppError::Validation(detail) => ErrorResponse::validation(detail),
            AppError::Unauthorized => ErrorResponse::unauthorized(),
            AppError::Forbidden(detail) => ErrorResponse::permission_denied(detail),
            AppError::Unavailable(_) => ErrorResponse::unavailable(),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::Validation(msg),
            DomainError::Unauthorized => AppError::Unauthorized,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { id } => AppError::NotFound(format!("post {} not found", id)),
            RepoError::PermissionDenied(msg) => AppError::Forbidden(msg),
            RepoError::Connection(msg) => AppError::Unavailable(msg),
            RepoError::Query(msg) => AppError::InvalidQuery(msg),
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (RepoError::not_found("p1"), StatusCode::NOT_FOUND),
            (RepoError::PermissionDenied("rules".into()), StatusCode::FORBIDDEN),
            (RepoError::Connection("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RepoError::Query("no index".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }
}
