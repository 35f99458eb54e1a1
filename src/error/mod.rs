use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::notification::DispatchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailureBody>,
}

#[derive(Serialize)]
struct FailureBody {
    backend: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut failures = Vec::new();

        let (status, code, client_message, log_message) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Dispatch(DispatchError::Closed) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DISPATCHER_CLOSED",
                "Dispatcher is shutting down".to_string(),
                "dispatcher is closed".to_string(),
            ),
            AppError::Dispatch(DispatchError::Encode(e)) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "ENCODE_ERROR", client_msg, log_msg)
            }
            AppError::Dispatch(DispatchError::Delivery(delivery)) => {
                let log_msg = delivery.to_string();
                let production = is_production();
                failures = delivery
                    .failures()
                    .iter()
                    .map(|f| FailureBody {
                        backend: f.backend.clone(),
                        message: if production {
                            "delivery failed".to_string()
                        } else {
                            f.cause.to_string()
                        },
                    })
                    .collect();
                (
                    StatusCode::BAD_GATEWAY,
                    "DELIVERY_FAILED",
                    format!("Delivery failed for: {}", delivery.backends().join(", ")),
                    log_msg,
                )
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
                failures,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_bad_request() {
        let response =
            AppError::Validation("applicationID must be positive".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_closed_dispatcher_is_unavailable() {
        let response = AppError::from(DispatchError::Closed).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
