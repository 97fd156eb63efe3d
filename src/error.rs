use crate::api::pretty::PrettyJson;
use crate::domain::push::ChunkFailure;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Push service unavailable: {message}")]
    Upstream { message: String, failures: Vec<ChunkFailure> },
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => {
                tracing::debug!(error = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            Self::Upstream { message, failures } => {
                tracing::warn!(error = %message, failed_chunks = failures.len(), "Every provider call failed");
                (StatusCode::BAD_GATEWAY, json!({ "error": message, "failures": failures }))
            }
        };

        (status, PrettyJson(body)).into_response()
    }
}
