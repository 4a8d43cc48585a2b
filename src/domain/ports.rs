use crate::domain::model::{
    AvailabilityQuery, AvailabilitySlot, Booking, BookingListQuery, Card, Customer, NewBooking,
    NewCustomer, ServiceVariation, TeamMember, VerifiedIdentity,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait ConfigProvider: Send + Sync {
    fn location_id(&self) -> &str;
    fn max_quantity_per_service(&self) -> u32;
    fn max_search_days(&self) -> i64;
    fn default_search_days(&self) -> i64;
}

/// The hosted bookings/payments platform.
#[async_trait]
pub trait BookingPlatform: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceVariation>>;
    async fn list_bookable_staff(&self) -> Result<Vec<TeamMember>>;
    async fn search_availability(&self, query: &AvailabilityQuery) -> Result<Vec<AvailabilitySlot>>;

    async fn search_customer_by_phone(&self, phone_number: &str) -> Result<Option<Customer>>;
    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer>;
    async fn create_card(&self, customer_id: &str, source_id: &str) -> Result<Card>;

    async fn create_booking(&self, booking: &NewBooking) -> Result<Booking>;
    async fn retrieve_booking(&self, booking_id: &str) -> Result<Booking>;
    async fn list_bookings(&self, query: &BookingListQuery) -> Result<Vec<Booking>>;
    async fn cancel_booking(&self, booking_id: &str, booking_version: i64) -> Result<Booking>;
}

/// Phone-number identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity>;
}
