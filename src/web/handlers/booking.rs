//! Booking-flow handlers: catalog, selection, availability, confirmation.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Redirect},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::core::availability::{search_window, AvailabilityRequest};
use crate::core::booking::ConfirmRequest;
use crate::core::session::{parse_service_pairs, parse_staff_preference, validate_selection};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::BookingError;
use crate::web::error::{ApiError, FormError};
use crate::web::session::{ensure_session, require_session};
use crate::web::state::AppState;

pub async fn list_services(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let services = state.platform.list_services().await?;
    Ok(Json(json!({ "success": true, "services": services })))
}

pub async fn list_staff(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let staff = state.platform.list_bookable_staff().await?;
    Ok(Json(json!({ "success": true, "staff": staff })))
}

pub async fn current_selection(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let (_, session) = require_session(&state, &jar).await?;
    Ok(Json(json!({
        "success": true,
        "authenticated": session.is_authenticated(),
        "services": session.services,
        "staff": session.staff,
    })))
}

/// `service=<id>` repeated, `qty_<id>=<n>` optional.
pub async fn select_services(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<impl IntoResponse, FormError> {
    let submitted = parse_service_pairs(&pairs)?;
    let catalog = state.platform.list_services().await?;
    let selection = validate_selection(
        submitted,
        &catalog,
        state.config.max_quantity_per_service(),
    )?;

    let (jar, id) = ensure_session(&state, jar).await;
    let count = selection.len();
    state
        .sessions
        .update(&id, move |session| session.services = selection)
        .await?;

    tracing::debug!("Session {} selected {} services", id, count);
    Ok((jar, Redirect::to("/booking/staff")))
}

#[derive(Debug, Deserialize)]
pub struct StaffForm {
    #[serde(default)]
    pub staff: String,
}

pub async fn select_staff(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<StaffForm>,
) -> Result<impl IntoResponse, FormError> {
    let (id, _) = require_session(&state, &jar).await?;
    let staff = state.platform.list_bookable_staff().await?;
    let preference = parse_staff_preference(&form.staff, &staff)?;

    state
        .sessions
        .update(&id, move |session| session.staff = preference)
        .await?;

    Ok(Redirect::to("/booking/time"))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub start: Option<NaiveDate>,
    pub days: Option<i64>,
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<AvailabilityParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, session) = require_session(&state, &jar).await?;
    if session.services.is_empty() {
        return Err(BookingError::validation("Select at least one service first").into());
    }

    let (start_at, end_at) = search_window(
        params.start,
        params.days,
        Utc::now(),
        state.config.default_search_days(),
        state.config.max_search_days(),
    )?;

    let catalog = state.platform.list_services().await?;
    let request = AvailabilityRequest {
        services: session.services,
        staff: session.staff,
        start_at,
        end_at,
    };
    let aggregated = state.bookings.availability().search(&request, &catalog).await?;

    Ok(Json(json!({
        "success": true,
        "required_minutes": aggregated.required_minutes,
        "start_at": start_at,
        "end_at": end_at,
        "slots": aggregated.slots,
    })))
}

pub async fn confirm(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| BookingError::validation(e.body_text()))?;
    let (id, session) = require_session(&state, &jar).await?;

    let catalog = state.platform.list_services().await?;
    let confirmed = state
        .bookings
        .confirm(&session, request, &catalog, Utc::now())
        .await?;

    // 預約完成後記住顧客 id 並清空選擇
    let customer_id = confirmed.customer_id.clone();
    state
        .sessions
        .update(&id, move |session| {
            if let Some(customer) = session.customer.as_mut() {
                customer.customer_id = Some(customer_id);
            }
            session.services.clear();
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": confirmed.booking,
        "card": confirmed.card,
    })))
}
