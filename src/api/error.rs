use crate::services::error::GatewayError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// A failed gateway operation, with the message shown to the caller.
    #[error("{message}: {source}")]
    Operation {
        message: &'static str,
        source: GatewayError,
    },
}

impl AppError {
    /// `map_err` adapter attaching the caller-facing message to a gateway error.
    pub fn operation(message: &'static str) -> impl FnOnce(GatewayError) -> AppError {
        move |source| AppError::Operation { message, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "message": msg }))
            }
            AppError::Operation { message, source } => {
                let status = match &source {
                    GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    GatewayError::StoreUnavailable(_) | GatewayError::IoFailure(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    tracing::error!("{}: {:?}", message, source);
                } else {
                    tracing::warn!("{}: {}", message, source);
                }
                (
                    status,
                    json!({ "message": message, "error": source.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
