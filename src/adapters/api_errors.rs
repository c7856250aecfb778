use crate::domain::error::FlowError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Adapter-layer wrapper so HTTP concerns stay out of the domain error.
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            FlowError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            FlowError::MalformedCallback(msg) => {
                (StatusCode::BAD_REQUEST, "malformed_callback", msg.clone())
            }
            FlowError::Auth(err) => {
                tracing::error!("gateway auth error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "auth_error",
                    "payment gateway authentication failed".to_string(),
                )
            }
            FlowError::Gateway(err) => {
                tracing::error!("gateway error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "gateway_error",
                    "payment gateway request failed".to_string(),
                )
            }
            FlowError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            FlowError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            FlowError::Notification(err) => {
                tracing::error!("notification error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
