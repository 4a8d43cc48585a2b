#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use salon_booking::domain::model::{
    AppointmentSegment, AvailabilityQuery, AvailabilitySlot, Booking, BookingListQuery,
    BookingStatus, Card, Customer, NewBooking, NewCustomer, ServiceVariation, TeamMember,
    VerifiedIdentity,
};
use salon_booking::domain::ports::{BookingPlatform, IdentityVerifier};
use salon_booking::{AppConfig, BookingError, Result};

pub const LOCATION_ID: &str = "L1";
pub const ADMIN_TOKEN: &str = "admin-token-0123456789";
pub const PHONE: &str = "+15551234567";

pub type AvailabilityFn =
    Box<dyn Fn(&AvailabilityQuery) -> Result<Vec<AvailabilitySlot>> + Send + Sync>;

pub fn test_config(square_url: &str, identity_url: &str) -> AppConfig {
    let content = format!(
        r#"
[server]
host = "127.0.0.1"
port = 3000
cookie_secure = false

[square]
base_url = "{}"
access_token = "test-token"
location_id = "{}"

[identity]
base_url = "{}"
api_key = "test-key"

[admin]
token = "{}"
"#,
        square_url, LOCATION_ID, identity_url, ADMIN_TOKEN
    );
    AppConfig::from_toml_str(&content).unwrap()
}

/// A fixed day far enough ahead that it is always in the future.
pub fn day_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2040, 5, 1, hour, minute, 0).unwrap()
}

pub fn catalog() -> Vec<ServiceVariation> {
    vec![
        ServiceVariation {
            id: "CUT".to_string(),
            item_id: "ITEM-CUT".to_string(),
            name: "Haircut".to_string(),
            variation_name: "Regular".to_string(),
            version: Some(3),
            duration_minutes: 30,
            price: None,
        },
        ServiceVariation {
            id: "COLOR".to_string(),
            item_id: "ITEM-COLOR".to_string(),
            name: "Color".to_string(),
            variation_name: "Full".to_string(),
            version: Some(5),
            duration_minutes: 60,
            price: None,
        },
    ]
}

pub fn staff() -> Vec<TeamMember> {
    vec![
        TeamMember {
            id: "T1".to_string(),
            display_name: "Alex".to_string(),
        },
        TeamMember {
            id: "T2".to_string(),
            display_name: "Sam".to_string(),
        },
    ]
}

/// Slot with one segment per `(team member, variation, minutes)`.
pub fn slot(start_at: DateTime<Utc>, segments: &[(&str, &str, u32)]) -> AvailabilitySlot {
    AvailabilitySlot {
        start_at,
        location_id: LOCATION_ID.to_string(),
        appointment_segments: segments
            .iter()
            .map(|(team_member_id, variation_id, minutes)| AppointmentSegment {
                team_member_id: team_member_id.to_string(),
                service_variation_id: variation_id.to_string(),
                service_variation_version: None,
                duration_minutes: *minutes,
            })
            .collect(),
    }
}

pub fn booking(id: &str, customer_id: &str, status: BookingStatus) -> Booking {
    Booking {
        id: id.to_string(),
        version: 1,
        status,
        start_at: day_at(10, 0),
        location_id: LOCATION_ID.to_string(),
        customer_id: Some(customer_id.to_string()),
        customer_note: None,
        appointment_segments: Vec::new(),
    }
}

/// In-memory platform that records what it was asked to do.
pub struct FakePlatform {
    availability: AvailabilityFn,
    pub queries: Mutex<Vec<AvailabilityQuery>>,
    pub customers: Mutex<Vec<Customer>>,
    pub cards: Mutex<Vec<(String, String)>>,
    pub bookings: Mutex<Vec<Booking>>,
    pub created: Mutex<Vec<NewBooking>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            availability: Box::new(|_| Ok(Vec::new())),
            queries: Mutex::new(Vec::new()),
            customers: Mutex::new(Vec::new()),
            cards: Mutex::new(Vec::new()),
            bookings: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_availability<F>(mut self, availability: F) -> Self
    where
        F: Fn(&AvailabilityQuery) -> Result<Vec<AvailabilitySlot>> + Send + Sync + 'static,
    {
        self.availability = Box::new(availability);
        self
    }

    /// Always offers the given slots, limited to the queried window.
    pub fn offering(slots: Vec<AvailabilitySlot>) -> Self {
        Self::new().with_availability(move |query| {
            Ok(slots
                .iter()
                .filter(|slot| slot.start_at >= query.start_at && slot.start_at < query.end_at)
                .cloned()
                .collect())
        })
    }

    pub fn with_customer(self, id: &str, phone_number: &str) -> Self {
        self.customers.lock().unwrap().push(Customer {
            id: id.to_string(),
            given_name: None,
            family_name: None,
            email_address: None,
            phone_number: Some(phone_number.to_string()),
        });
        self
    }

    pub fn with_booking(self, booking: Booking) -> Self {
        self.bookings.lock().unwrap().push(booking);
        self
    }
}

#[async_trait]
impl BookingPlatform for FakePlatform {
    async fn list_services(&self) -> Result<Vec<ServiceVariation>> {
        Ok(catalog())
    }

    async fn list_bookable_staff(&self) -> Result<Vec<TeamMember>> {
        Ok(staff())
    }

    async fn search_availability(&self, query: &AvailabilityQuery) -> Result<Vec<AvailabilitySlot>> {
        self.queries.lock().unwrap().push(query.clone());
        (self.availability)(query)
    }

    async fn search_customer_by_phone(&self, phone_number: &str) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .iter()
            .find(|customer| customer.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        let mut customers = self.customers.lock().unwrap();
        let created = Customer {
            id: format!("CUST{}", customers.len() + 1),
            given_name: customer.given_name.clone(),
            family_name: customer.family_name.clone(),
            email_address: customer.email_address.clone(),
            phone_number: Some(customer.phone_number.clone()),
        };
        customers.push(created.clone());
        Ok(created)
    }

    async fn create_card(&self, customer_id: &str, source_id: &str) -> Result<Card> {
        self.cards
            .lock()
            .unwrap()
            .push((customer_id.to_string(), source_id.to_string()));
        Ok(Card {
            id: "CARD1".to_string(),
            card_brand: Some("VISA".to_string()),
            last_4: Some("1111".to_string()),
            exp_month: Some(12),
            exp_year: Some(2045),
        })
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<Booking> {
        self.created.lock().unwrap().push(booking.clone());
        let mut bookings = self.bookings.lock().unwrap();
        let created = Booking {
            id: format!("BOOK{}", bookings.len() + 1),
            version: 0,
            status: BookingStatus::Accepted,
            start_at: booking.start_at,
            location_id: booking.location_id.clone(),
            customer_id: Some(booking.customer_id.clone()),
            customer_note: booking.customer_note.clone(),
            appointment_segments: booking.appointment_segments.clone(),
        };
        bookings.push(created.clone());
        Ok(created)
    }

    async fn retrieve_booking(&self, booking_id: &str) -> Result<Booking> {
        self.bookings
            .lock()
            .unwrap()
            .iter()
            .find(|booking| booking.id == booking_id)
            .cloned()
            .ok_or_else(|| BookingError::not_found(format!("Booking {}", booking_id)))
    }

    async fn list_bookings(&self, query: &BookingListQuery) -> Result<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|booking| {
                query.customer_id.is_none() || booking.customer_id == query.customer_id
            })
            .filter(|booking| query.start_at_min.map_or(true, |min| booking.start_at >= min))
            .filter(|booking| query.start_at_max.map_or(true, |max| booking.start_at < max))
            .cloned()
            .collect())
    }

    async fn cancel_booking(&self, booking_id: &str, booking_version: i64) -> Result<Booking> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings
            .iter_mut()
            .find(|booking| booking.id == booking_id)
            .ok_or_else(|| BookingError::not_found(format!("Booking {}", booking_id)))?;
        if booking.version != booking_version {
            return Err(BookingError::validation("Booking version mismatch"));
        }
        booking.status = BookingStatus::CancelledByCustomer;
        booking.version += 1;
        Ok(booking.clone())
    }
}

/// Accepts the token `good-token` only.
pub struct FakeIdentity;

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity> {
        if id_token == "good-token" {
            Ok(VerifiedIdentity {
                uid: "uid-1".to_string(),
                phone_number: PHONE.to_string(),
            })
        } else {
            Err(BookingError::unauthorized("Invalid ID token"))
        }
    }
}
