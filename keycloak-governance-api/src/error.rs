use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keycloak_governance_domain::domain::errors::DomainError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Domain(e) => {
                let status = match &e {
                    DomainError::UserNotFound { .. } | DomainError::RoleNotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
                    DomainError::AuthenticationFailed { .. } | DomainError::InvalidToken { .. } => {
                        StatusCode::UNAUTHORIZED
                    }
                    DomainError::AuthorizationFailed { .. } => StatusCode::FORBIDDEN,
                    DomainError::PolicyViolation { .. } | DomainError::AlreadyExists { .. } => {
                        StatusCode::CONFLICT
                    }
                    DomainError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
                    DomainError::Configuration { .. } | DomainError::Serialization { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };

                let body = match &e {
                    DomainError::PolicyViolation {
                        role_name,
                        violation,
                    } => json!({
                        "error": e.to_string(),
                        "role": role_name,
                        "category": violation.candidate_category(),
                    }),
                    DomainError::Validation { field, .. } => json!({
                        "error": e.to_string(),
                        "field": field,
                    }),
                    _ => json!({ "error": e.to_string() }),
                };
                (status, body)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
