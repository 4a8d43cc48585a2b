//! Availability aggregation.
//!
//! The platform's availability search answers differently depending on how a
//! query is scoped, so the same window is searched several ways and the
//! answers are merged into one list of bookable start times.

use crate::core::session::{SelectedService, StaffPreference};
use crate::domain::model::{AvailabilityQuery, AvailabilitySlot, SegmentFilter, ServiceVariation};
use crate::domain::ports::BookingPlatform;
use crate::utils::error::{BookingError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Every booked unit of every selected service, staff preference applied.
    Combined,
    /// Only the first selected service, staff preference applied.
    LeadService,
    /// Every booked unit, no staff filter on the request; staff checked afterwards.
    LocationWide,
}

impl SearchScope {
    pub const ALL: [SearchScope; 3] = [
        SearchScope::Combined,
        SearchScope::LeadService,
        SearchScope::LocationWide,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SearchScope::Combined => "combined",
            SearchScope::LeadService => "lead_service",
            SearchScope::LocationWide => "location_wide",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityRequest {
    pub services: Vec<SelectedService>,
    pub staff: StaffPreference,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScopeOutcome {
    pub scope: SearchScope,
    pub returned: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AggregatedAvailability {
    pub required_minutes: u32,
    pub slots: Vec<AvailabilitySlot>,
    pub scopes: Vec<ScopeOutcome>,
}

pub struct AvailabilityAggregator {
    platform: Arc<dyn BookingPlatform>,
    location_id: String,
}

impl AvailabilityAggregator {
    pub fn new(platform: Arc<dyn BookingPlatform>, location_id: impl Into<String>) -> Self {
        Self {
            platform,
            location_id: location_id.into(),
        }
    }

    pub async fn search(
        &self,
        request: &AvailabilityRequest,
        catalog: &[ServiceVariation],
    ) -> Result<AggregatedAvailability> {
        if request.services.is_empty() {
            return Err(BookingError::validation("Select at least one service first"));
        }
        if request.end_at <= request.start_at {
            return Err(BookingError::validation("Search range is empty"));
        }

        let required_minutes = required_minutes(&request.services, catalog)?;

        let mut batches = Vec::new();
        let mut scopes = Vec::new();
        let mut issued: Vec<AvailabilityQuery> = Vec::new();
        let mut last_error = None;

        for scope in SearchScope::ALL {
            let query = self.build_query(scope, request);

            // 單一服務時 LeadService 與 Combined 完全相同，不必重複呼叫
            if issued.contains(&query) {
                tracing::debug!("Skipping {} search, identical to an earlier scope", scope.label());
                continue;
            }

            match self.platform.search_availability(&query).await {
                Ok(slots) => {
                    tracing::debug!("{} search returned {} slots", scope.label(), slots.len());
                    scopes.push(ScopeOutcome {
                        scope,
                        returned: slots.len(),
                        error: None,
                    });
                    batches.push((scope, slots));
                }
                Err(e) => {
                    tracing::warn!("{} availability search failed: {}", scope.label(), e);
                    scopes.push(ScopeOutcome {
                        scope,
                        returned: 0,
                        error: Some(e.to_string()),
                    });
                    last_error = Some(e);
                }
            }
            issued.push(query);
        }

        if batches.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let slots = merge_slots(batches, required_minutes, &request.staff);
        tracing::info!(
            "Aggregated {} slots needing {} minutes between {} and {}",
            slots.len(),
            required_minutes,
            request.start_at,
            request.end_at
        );

        Ok(AggregatedAvailability {
            required_minutes,
            slots,
            scopes,
        })
    }

    fn build_query(&self, scope: SearchScope, request: &AvailabilityRequest) -> AvailabilityQuery {
        let team_filter = match (&request.staff, scope) {
            (_, SearchScope::LocationWide) | (StaffPreference::Any, _) => None,
            (StaffPreference::Member(id), _) => Some(vec![id.clone()]),
        };

        let segment_filters = match scope {
            SearchScope::LeadService => request
                .services
                .iter()
                .take(1)
                .map(|service| SegmentFilter {
                    service_variation_id: service.variation_id.clone(),
                    team_member_ids: team_filter.clone(),
                })
                .collect(),
            SearchScope::Combined | SearchScope::LocationWide => request
                .services
                .iter()
                .flat_map(|service| {
                    std::iter::repeat(service.variation_id.clone()).take(service.quantity as usize)
                })
                .map(|variation_id| SegmentFilter {
                    service_variation_id: variation_id,
                    team_member_ids: team_filter.clone(),
                })
                .collect(),
        };

        AvailabilityQuery {
            location_id: self.location_id.clone(),
            start_at: request.start_at,
            end_at: request.end_at,
            segment_filters,
        }
    }
}

/// Sum of catalog durations for the selection, counting every booked unit.
pub fn required_minutes(services: &[SelectedService], catalog: &[ServiceVariation]) -> Result<u32> {
    let mut total = 0u32;
    for service in services {
        let variation = catalog
            .iter()
            .find(|variation| variation.id == service.variation_id)
            .ok_or_else(|| BookingError::not_found(format!("Service {}", service.variation_id)))?;
        total += variation.duration_minutes * service.quantity;
    }
    Ok(total)
}

/// Merge scope answers in order. Short or wrongly-staffed slots are dropped,
/// then the first slot kept for a start time wins. Sorted by start time.
pub fn merge_slots(
    batches: Vec<(SearchScope, Vec<AvailabilitySlot>)>,
    required_minutes: u32,
    staff: &StaffPreference,
) -> Vec<AvailabilitySlot> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for (scope, slots) in batches {
        for slot in slots {
            if scope == SearchScope::LocationWide && !staff_matches(&slot, staff) {
                continue;
            }
            if slot.total_minutes() < required_minutes {
                tracing::debug!(
                    "Dropping {} slot at {}: {} < {} minutes",
                    scope.label(),
                    slot.start_at,
                    slot.total_minutes(),
                    required_minutes
                );
                continue;
            }
            if seen.insert(slot.start_at) {
                merged.push(slot);
            }
        }
    }

    merged.sort_by_key(|slot| slot.start_at);
    merged
}

fn staff_matches(slot: &AvailabilitySlot, staff: &StaffPreference) -> bool {
    match staff {
        StaffPreference::Any => true,
        StaffPreference::Member(id) => slot.team_member_ids().all(|member| member == id),
    }
}

/// `at + days`, or a validation error when the result leaves the calendar range.
pub fn add_days(at: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(|| BookingError::validation("Search range is out of bounds"))
}

fn midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| BookingError::validation("Invalid start date"))
}

/// Whole UTC days starting at midnight of `start`, `days` clamped to `1..=max_days`.
pub fn day_window(
    start: NaiveDate,
    days: Option<i64>,
    max_days: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let days = days.unwrap_or(1).clamp(1, max_days.max(1));
    let start_at = midnight(start)?;
    Ok((start_at, add_days(start_at, days)?))
}

/// Resolve the search window: starts at `start` (UTC midnight) or now,
/// never in the past, spanning `days` clamped to `1..=max_days`.
pub fn search_window(
    start: Option<NaiveDate>,
    days: Option<i64>,
    now: DateTime<Utc>,
    default_days: i64,
    max_days: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let days = days.unwrap_or(default_days).clamp(1, max_days);

    let day_start = match start {
        Some(date) => midnight(date)?,
        None => now,
    };

    let end_at = add_days(day_start, days)?;
    let start_at = day_start.max(now);

    if end_at <= start_at {
        return Err(BookingError::validation("Search range is in the past"));
    }

    Ok((start_at, end_at))
}
