// ============================================================
// Layer 1 — Service Errors
// ============================================================
// Request failures and the HTTP status each maps to:
//
//   BadRequest       → 400  malformed body or instance
//   ModelUnavailable → 503  the model's slot failed to load
//   Prediction       → 500  the model rejected the prepared input
//
// Every error body is {"error": "<message>"}.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No {0} model loaded")]
    ModelUnavailable(&'static str),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_)       => StatusCode::BAD_REQUEST,
            ServiceError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Prediction(_)       => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(e: anyhow::Error) -> Self {
        ServiceError::Prediction(format!("{e:#}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
