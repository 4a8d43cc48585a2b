use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::core::session::SessionCustomer;
use crate::utils::error::{BookingError, Result};
use crate::utils::validation::validate_phone_number;
use crate::web::error::ApiError;
use crate::web::session::{clear_session_cookie, require_session, rotate_session, session_id};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionLogin {
    pub id_token: String,
}

/// Exchange a phone-auth ID token for an authenticated booking session.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<SessionLogin>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let Json(login) = payload.map_err(|e| BookingError::validation(e.body_text()))?;

    let identity = state.identity.verify(&login.id_token).await?;
    validate_phone_number(&identity.phone_number)?;

    let customer_id = state
        .platform
        .search_customer_by_phone(&identity.phone_number)
        .await?
        .map(|customer| customer.id);

    // 登入成功後換發新的 session id
    let (jar, id) = rotate_session(&state, jar).await;
    let phone_number = identity.phone_number.clone();
    state
        .sessions
        .update(&id, move |session| {
            session.customer = Some(SessionCustomer {
                phone_number,
                customer_id,
            });
        })
        .await?;

    tracing::info!("Session {} signed in as {}", id, identity.uid);
    Ok((
        jar,
        Json(json!({ "success": true, "phone_number": identity.phone_number })),
    ))
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(id) = session_id(&jar) {
        state.sessions.remove(&id).await;
    }
    (clear_session_cookie(jar), Redirect::to("/"))
}

/// Platform customer id for the signed-in session, looked up by phone
/// number when the session does not know it yet.
async fn session_customer_id(state: &AppState, jar: &CookieJar) -> Result<Option<String>> {
    let (id, session) = require_session(state, jar).await?;
    let customer = session
        .customer
        .ok_or_else(|| BookingError::unauthorized("Sign in to view appointments"))?;

    if let Some(customer_id) = customer.customer_id {
        return Ok(Some(customer_id));
    }

    let found = state
        .platform
        .search_customer_by_phone(&customer.phone_number)
        .await?
        .map(|customer| customer.id);

    if let Some(customer_id) = found.clone() {
        state
            .sessions
            .update(&id, move |session| {
                if let Some(customer) = session.customer.as_mut() {
                    customer.customer_id = Some(customer_id);
                }
            })
            .await?;
    }
    Ok(found)
}

pub async fn appointments(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let bookings = match session_customer_id(&state, &jar).await? {
        // 顯示最近一天內開始的預約，方便顧客查看今天稍早的行程
        Some(customer_id) => {
            state
                .bookings
                .list_for_customer(&customer_id, Utc::now() - Duration::days(1))
                .await?
        }
        None => Vec::new(),
    };

    Ok(Json(json!({ "success": true, "appointments": bookings })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(booking_id): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let customer_id = session_customer_id(&state, &jar)
        .await?
        .ok_or_else(|| BookingError::not_found(format!("Booking {}", booking_id)))?;

    let booking = state.bookings.cancel(&customer_id, &booking_id).await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}
