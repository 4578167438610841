use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use application::usecases::subscription_lifecycle::LifecycleError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

pub fn lifecycle_error(err: LifecycleError) -> Response {
    let (status, message) = match &err {
        LifecycleError::InvalidPlan => (StatusCode::BAD_REQUEST, err.to_string()),
        LifecycleError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        LifecycleError::OwnershipMismatch => (StatusCode::FORBIDDEN, err.to_string()),
        LifecycleError::AlreadyScheduled => (StatusCode::CONFLICT, err.to_string()),
        LifecycleError::NoLowerTier => (StatusCode::BAD_REQUEST, err.to_string()),
        // Gateway and internal detail stays in the logs, not the response.
        LifecycleError::Gateway(_) => (
            StatusCode::BAD_GATEWAY,
            "payment gateway is unavailable".to_string(),
        ),
        LifecycleError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    };

    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message,
    });

    (status, body).into_response()
}
