// src/error.rs
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Request, Response};
use thiserror::Error;

use crate::app_log;
use crate::web::types::StandardErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limit exceeded. Retry after {retry_after} seconds.")]
    RateLimited { retry_after: u64 },

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::RateLimited { .. } => Status::TooManyRequests,
            ApiError::Unavailable(_) => Status::ServiceUnavailable,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn suggestions(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            ApiError::BadRequest(_) => &["Check your request body and query parameters"],
            ApiError::Unauthorized(_) => &["Sign in again to obtain a fresh session"],
            ApiError::Forbidden(_) => &["Only the owner of this resource can do that"],
            ApiError::NotFound(_) => &["Verify the identifier is correct"],
            ApiError::Conflict(_) => &["The resource already exists"],
            ApiError::RateLimited { .. } => &["Slow down and retry later"],
            ApiError::Unavailable(_) => &["Try again in a few moments"],
            ApiError::Internal(_) => &[
                "Try again in a few moments",
                "Contact support if the problem persists",
            ],
        };
        hints.iter().map(|s| s.to_string()).collect()
    }

    fn public_message(&self) -> String {
        match self {
            // Internal details stay in the logs.
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn conflict() -> ApiError {
    ApiError::Conflict("Resource already exists".to_string())
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return conflict();
        }
        ApiError::Internal(err.into())
    }
}

// Repositories return anyhow, so constraint violations are found by walking the chain.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let unique = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
            .any(is_unique_violation);
        if unique {
            app_log!(info, "Constraint violation: {:#}", err);
            return conflict();
        }
        ApiError::Internal(err)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            app_log!(error, "{} {} failed: {:#}", req.method(), req.uri(), self);
        } else {
            app_log!(
                info,
                "{} {} rejected with {}: {}",
                req.method(),
                req.uri(),
                status.code,
                self
            );
        }

        let body = Json(StandardErrorResponse::new(
            self.public_message(),
            self.error_code().to_string(),
            self.suggestions(),
        ));

        let mut builder = Response::build_from(body.respond_to(req)?);
        builder.status(status);
        if let ApiError::RateLimited { retry_after } = self {
            builder.raw_header("Retry-After", retry_after.to_string());
        }
        builder.ok()
    }
}
