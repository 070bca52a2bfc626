use crate::error::LendingError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Maps a [`LendingError`] onto an HTTP response with a stable `code`.
#[derive(Debug)]
pub struct ApiError(pub LendingError);

impl From<LendingError> for ApiError {
    fn from(e: LendingError) -> Self {
        Self(e)
    }
}

/// Malformed bodies get the same `{code, message}` shape as every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LendingError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LendingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            LendingError::Forbidden(_) => StatusCode::FORBIDDEN,
            LendingError::NotFound(_) => StatusCode::NOT_FOUND,
            LendingError::InvalidTransition(_) | LendingError::Conflict(_) => StatusCode::CONFLICT,
            // Benign: the fee is settled, the caller has nothing left to do.
            LendingError::AlreadyPaid => StatusCode::OK,
            LendingError::InvalidSignal | LendingError::Validation(_) => StatusCode::BAD_REQUEST,
            LendingError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LendingError::Storage { .. } | LendingError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && !matches!(self.0, LendingError::GatewayUnavailable(_)) {
            tracing::error!(error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let body = json!({ "code": self.0.code(), "message": message });
        (status, Json(body)).into_response()
    }
}
