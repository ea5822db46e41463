//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: model {model} field {field}")]
    InvalidPrimaryKey { model: String, field: String },
    #[error("unknown field: model {model} field {field}")]
    UnknownField { model: String, field: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Validation error")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Conflict(String),
    #[error("Duplicate {field} values")]
    DuplicateKeys {
        field: String,
        values: Vec<serde_json::Value>,
    },
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Db(e) => {
                tracing::error!(error = %e, "store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DuplicateKeys { .. } => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let detail = match &self {
            AppError::Validation(violations) => {
                Some(serde_json::Value::String(violations.clone()))
            }
            AppError::DuplicateKeys { values, .. } => {
                Some(serde_json::Value::Array(values.clone()))
            }
            _ => None,
        };
        let message = match &self {
            // Raw driver messages are logged, never returned to the caller.
            AppError::Db(_) => "Unexpected store error".to_string(),
            other => other.to_string(),
        };
        let body = crate::response::failure(status.as_u16(), message, detail);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status_of(AppError::NotFound("User".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409_for_single_and_bulk() {
        assert_eq!(
            status_of(AppError::Conflict("User with this email already exists".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::DuplicateKeys {
                field: "email".into(),
                values: vec![serde_json::json!("a@b.c")],
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn store_errors_map_to_500_everywhere() {
        assert_eq!(
            status_of(AppError::Db(sqlx::Error::PoolClosed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status_of(AppError::Validation("email is required".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
