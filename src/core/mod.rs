pub mod availability;
pub mod booking;
pub mod sanitizer;
pub mod session;

pub use crate::domain::model::{AvailabilitySlot, Booking, ServiceVariation, TeamMember};
pub use crate::domain::ports::{BookingPlatform, ConfigProvider, IdentityVerifier};
pub use crate::utils::error::Result;
