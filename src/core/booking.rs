use crate::core::availability::{add_days, AvailabilityAggregator, AvailabilityRequest};
use crate::core::session::{BookingSession, SessionCustomer};
use crate::domain::model::{
    Booking, BookingListQuery, Card, Customer, NewBooking, NewCustomer, ServiceVariation,
};
use crate::domain::ports::BookingPlatform;
use crate::utils::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_NOTE_LENGTH: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub start_at: DateTime<Utc>,
    pub card_nonce: Option<String>,
    pub customer_note: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedBooking {
    pub booking: Booking,
    pub customer_id: String,
    pub card: Option<Card>,
}

/// Orchestrates customer resolution, card-on-file and booking creation.
pub struct BookingService {
    platform: Arc<dyn BookingPlatform>,
    availability: AvailabilityAggregator,
    location_id: String,
}

impl BookingService {
    pub fn new(platform: Arc<dyn BookingPlatform>, location_id: impl Into<String>) -> Self {
        let location_id = location_id.into();
        Self {
            availability: AvailabilityAggregator::new(platform.clone(), location_id.clone()),
            platform,
            location_id,
        }
    }

    pub fn availability(&self) -> &AvailabilityAggregator {
        &self.availability
    }

    /// 以電話號碼尋找平台上的顧客，找不到就建立
    pub async fn resolve_customer(
        &self,
        session_customer: &SessionCustomer,
        request: &ConfirmRequest,
    ) -> Result<Customer> {
        if let Some(existing) = self
            .platform
            .search_customer_by_phone(&session_customer.phone_number)
            .await?
        {
            tracing::debug!("Matched existing customer {}", existing.id);
            return Ok(existing);
        }

        let new_customer = NewCustomer {
            given_name: non_empty(request.given_name.as_deref()),
            family_name: non_empty(request.family_name.as_deref()),
            email_address: non_empty(request.email_address.as_deref()),
            phone_number: session_customer.phone_number.clone(),
        };
        self.platform.create_customer(&new_customer).await
    }

    pub async fn confirm(
        &self,
        session: &BookingSession,
        request: ConfirmRequest,
        catalog: &[ServiceVariation],
        now: DateTime<Utc>,
    ) -> Result<ConfirmedBooking> {
        let session_customer = session
            .customer
            .as_ref()
            .ok_or_else(|| BookingError::unauthorized("Sign in before booking"))?;
        if session.services.is_empty() {
            return Err(BookingError::validation("Select at least one service first"));
        }
        if request.start_at <= now {
            return Err(BookingError::validation("Start time must be in the future"));
        }
        let customer_note = match non_empty(request.customer_note.as_deref()) {
            Some(note) if note.chars().count() > MAX_NOTE_LENGTH => {
                return Err(BookingError::validation(format!(
                    "Note must be at most {} characters",
                    MAX_NOTE_LENGTH
                )))
            }
            note => note,
        };

        // 先確認時段仍可預約，再動到顧客與卡片資料
        let search = AvailabilityRequest {
            services: session.services.clone(),
            staff: session.staff.clone(),
            start_at: request.start_at,
            end_at: add_days(request.start_at, 1)?,
        };
        let aggregated = self.availability.search(&search, catalog).await?;
        let slot = aggregated
            .slots
            .into_iter()
            .find(|slot| slot.start_at == request.start_at)
            .ok_or(BookingError::SlotUnavailable)?;

        let customer = match &session_customer.customer_id {
            Some(id) => Customer {
                id: id.clone(),
                given_name: None,
                family_name: None,
                email_address: None,
                phone_number: Some(session_customer.phone_number.clone()),
            },
            None => self.resolve_customer(session_customer, &request).await?,
        };

        let card = match non_empty(request.card_nonce.as_deref()) {
            Some(nonce) => Some(self.platform.create_card(&customer.id, &nonce).await?),
            None => None,
        };

        let appointment_segments = slot
            .appointment_segments
            .into_iter()
            .map(|mut segment| {
                if segment.service_variation_version.is_none() {
                    segment.service_variation_version = catalog
                        .iter()
                        .find(|variation| variation.id == segment.service_variation_id)
                        .and_then(|variation| variation.version);
                }
                segment
            })
            .collect();

        let booking = self
            .platform
            .create_booking(&NewBooking {
                start_at: slot.start_at,
                location_id: self.location_id.clone(),
                customer_id: customer.id.clone(),
                customer_note,
                appointment_segments,
            })
            .await?;

        tracing::info!(
            "Booking {} created for customer {} at {}",
            booking.id,
            customer.id,
            booking.start_at
        );

        Ok(ConfirmedBooking {
            booking,
            customer_id: customer.id,
            card,
        })
    }

    pub async fn list_for_customer(
        &self,
        customer_id: &str,
        from: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let mut bookings = self
            .platform
            .list_bookings(&BookingListQuery {
                location_id: Some(self.location_id.clone()),
                customer_id: Some(customer_id.to_string()),
                start_at_min: Some(from),
                start_at_max: None,
            })
            .await?;
        bookings.sort_by_key(|booking| booking.start_at);
        Ok(bookings)
    }

    pub async fn list_for_location(
        &self,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        if end_at <= start_at {
            return Err(BookingError::validation("End must be after start"));
        }
        let mut bookings = self
            .platform
            .list_bookings(&BookingListQuery {
                location_id: Some(self.location_id.clone()),
                customer_id: None,
                start_at_min: Some(start_at),
                start_at_max: Some(end_at),
            })
            .await?;
        bookings.sort_by_key(|booking| booking.start_at);
        Ok(bookings)
    }

    /// Cancel a booking owned by `customer_id`.
    pub async fn cancel(&self, customer_id: &str, booking_id: &str) -> Result<Booking> {
        let booking = self.platform.retrieve_booking(booking_id).await?;

        // 不洩漏其他顧客的預約是否存在
        if booking.customer_id.as_deref() != Some(customer_id) {
            return Err(BookingError::not_found(format!("Booking {}", booking_id)));
        }
        if !booking.status.is_active() {
            return Err(BookingError::validation("Booking is already cancelled"));
        }

        self.platform.cancel_booking(&booking.id, booking.version).await
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
