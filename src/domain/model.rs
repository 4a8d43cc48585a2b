use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// 最小貨幣單位（例如美分）
    pub amount: i64,
    pub currency: String,
}

/// A bookable offering from the platform catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceVariation {
    pub id: String,
    pub item_id: String,
    pub name: String,
    pub variation_name: String,
    pub version: Option<i64>,
    pub duration_minutes: u32,
    pub price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSegment {
    pub team_member_id: String,
    pub service_variation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_variation_version: Option<i64>,
    pub duration_minutes: u32,
}

/// A candidate start time returned by the availability search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start_at: DateTime<Utc>,
    pub location_id: String,
    pub appointment_segments: Vec<AppointmentSegment>,
}

impl AvailabilitySlot {
    pub fn total_minutes(&self) -> u32 {
        self.appointment_segments
            .iter()
            .map(|segment| segment.duration_minutes)
            .sum()
    }

    pub fn team_member_ids(&self) -> impl Iterator<Item = &str> {
        self.appointment_segments
            .iter()
            .map(|segment| segment.team_member_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFilter {
    pub service_variation_id: String,
    /// `None` 代表任何員工皆可
    pub team_member_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub location_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub segment_filters: Vec<SegmentFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub card_brand: Option<String>,
    pub last_4: Option<String>,
    pub exp_month: Option<u32>,
    pub exp_year: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    CancelledByCustomer,
    CancelledBySeller,
    Declined,
    NoShow,
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub version: i64,
    pub status: BookingStatus,
    pub start_at: DateTime<Utc>,
    pub location_id: String,
    pub customer_id: Option<String>,
    pub customer_note: Option<String>,
    pub appointment_segments: Vec<AppointmentSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub start_at: DateTime<Utc>,
    pub location_id: String,
    pub customer_id: String,
    pub customer_note: Option<String>,
    pub appointment_segments: Vec<AppointmentSegment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingListQuery {
    pub location_id: Option<String>,
    pub customer_id: Option<String>,
    pub start_at_min: Option<DateTime<Utc>>,
    pub start_at_max: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub phone_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(minutes: u32, team_member_id: &str) -> AppointmentSegment {
        AppointmentSegment {
            team_member_id: team_member_id.to_string(),
            service_variation_id: "SV".to_string(),
            service_variation_version: None,
            duration_minutes: minutes,
        }
    }

    #[test]
    fn test_slot_total_minutes() {
        let slot = AvailabilitySlot {
            start_at: Utc::now(),
            location_id: "L1".to_string(),
            appointment_segments: vec![segment(30, "T1"), segment(45, "T2")],
        };
        assert_eq!(slot.total_minutes(), 75);
        assert_eq!(slot.team_member_ids().collect::<Vec<_>>(), vec!["T1", "T2"]);
    }

    #[test]
    fn test_unknown_booking_status_is_tolerated() {
        let status: BookingStatus = serde_json::from_str("\"SOME_NEW_STATUS\"").unwrap();
        assert_eq!(status, BookingStatus::Unknown);

        let status: BookingStatus = serde_json::from_str("\"CANCELLED_BY_CUSTOMER\"").unwrap();
        assert_eq!(status, BookingStatus::CancelledByCustomer);
        assert!(!status.is_active());
    }
}
