use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};

use crate::utils::error::{BookingError, ErrorSeverity};

/// Error answered as `{ "success": false, "error": ... }`.
#[derive(Debug)]
pub struct ApiError(pub BookingError);

/// Error answered with a redirect back to the booking page carrying `?error=<code>`.
#[derive(Debug)]
pub struct FormError(pub BookingError);

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        ApiError(error)
    }
}

impl From<BookingError> for FormError {
    fn from(error: BookingError) -> Self {
        FormError(error)
    }
}

pub fn status_for(error: &BookingError) -> StatusCode {
    match error {
        BookingError::ValidationError { .. } => StatusCode::BAD_REQUEST,
        BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
        BookingError::Unauthorized { .. } | BookingError::SessionExpired => StatusCode::UNAUTHORIZED,
        BookingError::SlotUnavailable => StatusCode::CONFLICT,
        BookingError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        BookingError::HttpError(_) | BookingError::PlatformError { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_error(error: &BookingError) {
    match error.severity() {
        ErrorSeverity::Low => tracing::info!("Request rejected: {}", error),
        ErrorSeverity::Medium => tracing::warn!("Platform call failed: {}", error),
        ErrorSeverity::High | ErrorSeverity::Critical => {
            tracing::error!("Request failed: {} ({})", error, error.recovery_suggestion())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_error(&self.0);
        let body = serde_json::json!({
            "success": false,
            "error": self.0.user_friendly_message(),
            "code": self.0.error_code(),
        });
        (status_for(&self.0), Json(body)).into_response()
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        log_error(&self.0);
        Redirect::to(&format!("/booking?error={}", self.0.error_code())).into_response()
    }
}
