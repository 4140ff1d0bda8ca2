use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::common::response::DetailResponse;

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// In debug mode 500 responses carry the underlying error text.
pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

/// Field name to list of messages, the shape API clients already parse.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub fn field_error(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message.to_string()]);
    errors
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::Validation(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::Validation(fields) => {
                return (StatusCode::BAD_REQUEST, Json(fields)).into_response();
            }
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AppError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                let detail = if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
                    format!("{:#}", e)
                } else {
                    "Internal server error.".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };

        (status, Json(DetailResponse::new(detail))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct SignupForm {
        #[validate(email(message = "Enter a valid email address."))]
        email: String,
        #[validate(length(min = 1))]
        password: String,
    }

    #[test]
    fn validation_errors_become_field_map() {
        let form = SignupForm {
            email: "not-an-email".to_string(),
            password: String::new(),
        };
        let err = AppError::from(form.validate().unwrap_err());

        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields["email"], vec!["Enter a valid email address."]);
                assert_eq!(fields["password"], vec!["length"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::Unauthorized("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Validation(field_error("email", "bad")).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
