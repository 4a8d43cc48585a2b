use crate::domain::model::{ServiceVariation, TeamMember};
use crate::utils::error::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedService {
    pub variation_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "team_member_id", rename_all = "snake_case")]
pub enum StaffPreference {
    #[default]
    Any,
    Member(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCustomer {
    pub phone_number: String,
    pub customer_id: Option<String>,
}

/// Per-visitor booking state. Holds only what the visitor last submitted.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSession {
    pub customer: Option<SessionCustomer>,
    pub services: Vec<SelectedService>,
    pub staff: StaffPreference,
    pub updated_at: DateTime<Utc>,
}

impl BookingSession {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            customer: None,
            services: Vec::new(),
            staff: StaffPreference::Any,
            updated_at: now,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.customer.is_some()
    }
}

/// In-memory session store keyed by the cookie's session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, BookingSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, BookingSession::new(Utc::now()));
        id
    }

    /// 取得未過期的 session 快照，並視為一次活動重設閒置計時
    pub async fn get(&self, id: &Uuid) -> Option<BookingSession> {
        self.get_at(id, Utc::now()).await
    }

    pub async fn get_at(&self, id: &Uuid, now: DateTime<Utc>) -> Option<BookingSession> {
        let mut sessions = self.sessions.write().await;
        let expired = self.is_expired(sessions.get(id)?, now);
        if expired {
            sessions.remove(id);
            return None;
        }

        let session = sessions.get_mut(id)?;
        session.updated_at = now;
        Some(session.clone())
    }

    /// Issue a fresh id carrying the selection of `previous`, which is dropped.
    pub async fn rotate(&self, previous: Option<&Uuid>) -> Uuid {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let mut session = BookingSession::new(now);
        if let Some(old) = previous.and_then(|id| sessions.remove(id)) {
            if !self.is_expired(&old, now) {
                session.services = old.services;
                session.staff = old.staff;
            }
        }

        let id = Uuid::new_v4();
        sessions.insert(id, session);
        id
    }

    /// Mutate a live session and refresh its idle timer.
    pub async fn update<F, T>(&self, id: &Uuid, f: F) -> Result<T>
    where
        F: FnOnce(&mut BookingSession) -> T,
    {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let expired = match sessions.get(id) {
            Some(session) => self.is_expired(session, now),
            None => return Err(BookingError::SessionExpired),
        };
        if expired {
            sessions.remove(id);
            return Err(BookingError::SessionExpired);
        }

        let session = sessions.get_mut(id).ok_or(BookingError::SessionExpired)?;
        let out = f(session);
        session.updated_at = now;
        Ok(out)
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id).is_some()
    }

    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_expired(&self, session: &BookingSession, now: DateTime<Utc>) -> bool {
        now - session.updated_at > self.ttl
    }
}

/// Read `service=<id>` entries (with optional `qty_<id>=<n>`) from a
/// submitted form.
pub fn parse_service_pairs(pairs: &[(String, String)]) -> Result<Vec<SelectedService>> {
    let quantities: HashMap<&str, &str> = pairs
        .iter()
        .filter_map(|(key, value)| key.strip_prefix("qty_").map(|id| (id, value.as_str())))
        .collect();

    let mut seen = HashSet::new();
    pairs
        .iter()
        .filter(|(key, _)| key == "service")
        .map(|(_, id)| id.trim())
        .filter(|id| seen.insert(*id))
        .map(|id| {
            let quantity = match quantities.get(id) {
                Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                    BookingError::validation(format!("Quantity '{}' is not a number", raw))
                })?,
                None => 1,
            };
            Ok(SelectedService {
                variation_id: id.to_string(),
                quantity,
            })
        })
        .collect()
}

/// Validate a submitted selection against the catalog. Duplicate ids are
/// merged by summing their quantities.
pub fn validate_selection(
    submitted: Vec<SelectedService>,
    catalog: &[ServiceVariation],
    max_quantity: u32,
) -> Result<Vec<SelectedService>> {
    let mut merged: Vec<SelectedService> = Vec::new();

    for service in submitted {
        if service.variation_id.is_empty() {
            return Err(BookingError::validation("Service id cannot be empty"));
        }
        match merged
            .iter_mut()
            .find(|existing| existing.variation_id == service.variation_id)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(service.quantity),
            None => merged.push(service),
        }
    }

    if merged.is_empty() {
        return Err(BookingError::validation("Select at least one service"));
    }

    for service in &merged {
        if !catalog.iter().any(|variation| variation.id == service.variation_id) {
            return Err(BookingError::validation(format!(
                "Unknown service '{}'",
                service.variation_id
            )));
        }
        if service.quantity == 0 || service.quantity > max_quantity {
            return Err(BookingError::validation(format!(
                "Quantity must be between 1 and {}",
                max_quantity
            )));
        }
    }

    Ok(merged)
}

pub fn parse_staff_preference(raw: &str, staff: &[TeamMember]) -> Result<StaffPreference> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("any") {
        return Ok(StaffPreference::Any);
    }

    if staff.iter().any(|member| member.id == raw) {
        Ok(StaffPreference::Member(raw.to_string()))
    } else {
        Err(BookingError::validation(format!("Unknown staff member '{}'", raw)))
    }
}
