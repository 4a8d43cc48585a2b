use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::core::session::BookingSession;
use crate::utils::error::{BookingError, Result};
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "salon_sid";

pub fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Return the live session for this cookie jar, starting a new one if needed.
pub async fn ensure_session(state: &AppState, jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = session_id(&jar) {
        if state.sessions.get(&id).await.is_some() {
            return (jar, id);
        }
    }

    let id = state.sessions.create().await;
    tracing::debug!("Started session {}", id);
    (jar.add(session_cookie(state, id)), id)
}

/// Move the visitor's selection onto a new session id and drop the old one.
pub async fn rotate_session(state: &AppState, jar: CookieJar) -> (CookieJar, Uuid) {
    let previous = session_id(&jar);
    let id = state.sessions.rotate(previous.as_ref()).await;
    tracing::debug!("Rotated session {:?} -> {}", previous, id);
    (jar.add(session_cookie(state, id)), id)
}

fn session_cookie(state: &AppState, id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.server.cookie_secure)
        .build()
}

/// Existing session or `SessionExpired`.
pub async fn require_session(state: &AppState, jar: &CookieJar) -> Result<(Uuid, BookingSession)> {
    let id = session_id(jar).ok_or(BookingError::SessionExpired)?;
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or(BookingError::SessionExpired)?;
    Ok((id, session))
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
