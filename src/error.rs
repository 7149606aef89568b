use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::ports::RepositoryError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("payment gateway error: {0}")]
    ExternalGateway(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExternalGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Persistence(_) => "internal server error, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            RepositoryError::Duplicate(what) => AppError::Conflict(format!("{} already exists", what)),
            other => AppError::Persistence(other.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::ExternalGateway(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Persistence(detail) = &self {
            tracing::error!(error = %detail, "request failed on persistence");
        }

        let body = Json(json!({
            "status": false,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}
