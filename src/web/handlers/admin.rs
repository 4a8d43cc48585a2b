use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{header::AUTHORIZATION, request::Parts},
    response::{Html, IntoResponse},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::core::availability::day_window;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::BookingError;
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Requests carrying `Authorization: Bearer <admin.token>`.
pub struct AdminAuth;

impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        match provided {
            Some(token) if token_matches(token, &state.config.admin.token) => Ok(AdminAuth),
            _ => Err(BookingError::unauthorized("Admin token required").into()),
        }
    }
}

/// 固定時間比較，避免以回應時間猜測 token
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Deserialize)]
pub struct AdminRange {
    pub start: NaiveDate,
    pub days: Option<i64>,
}

pub async fn appointments(
    _admin: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(range): Query<AdminRange>,
) -> Result<impl IntoResponse, ApiError> {
    let (start_at, end_at) = day_window(range.start, range.days, state.config.max_search_days())?;
    let bookings = state.bookings.list_for_location(start_at, end_at).await?;

    Ok(Json(json!({ "success": true, "appointments": bookings })))
}

/// Sanitize a page-builder fragment and echo it back as HTML.
pub async fn page_preview(
    _admin: AdminAuth,
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let cleaned = state.sanitizer.clean(&body);
    tracing::debug!("Sanitized page fragment {} -> {} bytes", body.len(), cleaned.len());
    Html(cleaned)
}
