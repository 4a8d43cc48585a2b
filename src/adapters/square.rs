use crate::config::toml_config::SquareConfig;
use crate::domain::model::{
    AppointmentSegment, AvailabilityQuery, AvailabilitySlot, Booking, BookingListQuery,
    BookingStatus, Card, Customer, Money, NewBooking, NewCustomer, ServiceVariation, TeamMember,
};
use crate::domain::ports::BookingPlatform;
use crate::utils::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const MAX_PAGES: usize = 20;

/// Square REST v2 client.
pub struct SquareClient {
    client: Client,
    base_url: String,
    access_token: String,
    api_version: String,
    location_id: String,
}

impl SquareClient {
    pub fn new(config: &SquareConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_seconds.unwrap_or(15)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            api_version: config.api_version.clone(),
            location_id: config.location_id.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .header("Square-Version", &self.api_version)
            .header("Accept", "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let error = map_error(status, &body);
        tracing::warn!("Square request failed: {}", error);
        Err(error)
    }
}

/// Map a non-2xx Square response onto the error type.
pub fn map_error(status: StatusCode, body: &str) -> BookingError {
    let first = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|parsed| parsed.errors.into_iter().next());

    let code = first
        .as_ref()
        .and_then(|e| e.code.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let detail = first
        .as_ref()
        .and_then(|e| e.detail.clone())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::NOT_FOUND => BookingError::not_found(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let field = first.and_then(|e| e.field);
            match field {
                Some(field) => BookingError::validation(format!("{} ({})", detail, field)),
                None => BookingError::validation(detail),
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BookingError::unauthorized(detail),
        StatusCode::TOO_MANY_REQUESTS => BookingError::RateLimited,
        _ => BookingError::PlatformError {
            status: status.as_u16(),
            code,
            detail,
        },
    }
}

fn ensure_object_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id.len() > 192
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BookingError::validation(format!("Invalid id '{}'", id)));
    }
    Ok(())
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 分頁上限用完時仍有 cursor，結果不完整
fn warn_if_truncated(what: &str, cursor: &Option<String>) -> bool {
    if cursor.is_none() {
        return false;
    }
    tracing::warn!(
        "Stopped listing {} after {} pages, remaining results were not loaded",
        what,
        MAX_PAGES
    );
    true
}

fn idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl BookingPlatform for SquareClient {
    async fn list_services(&self) -> Result<Vec<ServiceVariation>> {
        let mut services = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self
                .request(Method::GET, "/v2/catalog/list")
                .query(&[("types", "ITEM")]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor)]);
            }

            let page: ListCatalogResponse = self.send(request).await?;
            services.extend(page.objects.into_iter().flat_map(CatalogObject::into_services));

            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        warn_if_truncated("catalog items", &cursor);
        tracing::debug!("Loaded {} bookable service variations", services.len());
        Ok(services)
    }

    async fn list_bookable_staff(&self) -> Result<Vec<TeamMember>> {
        let mut staff = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self
                .request(Method::GET, "/v2/bookings/team-member-booking-profiles")
                .query(&[
                    ("bookable_only", "true"),
                    ("location_id", self.location_id.as_str()),
                ]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor)]);
            }

            let page: ListBookingProfilesResponse = self.send(request).await?;
            staff.extend(
                page.team_member_booking_profiles
                    .into_iter()
                    .filter(|profile| profile.is_bookable.unwrap_or(true))
                    .map(|profile| TeamMember {
                        display_name: profile
                            .display_name
                            .unwrap_or_else(|| profile.team_member_id.clone()),
                        id: profile.team_member_id,
                    }),
            );

            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        warn_if_truncated("team member booking profiles", &cursor);
        Ok(staff)
    }

    async fn search_availability(&self, query: &AvailabilityQuery) -> Result<Vec<AvailabilitySlot>> {
        let body = SearchAvailabilityRequest {
            query: AvailabilityQueryBody {
                filter: AvailabilityFilterBody {
                    start_at_range: TimeRangeBody {
                        start_at: rfc3339(query.start_at),
                        end_at: rfc3339(query.end_at),
                    },
                    location_id: &query.location_id,
                    segment_filters: query
                        .segment_filters
                        .iter()
                        .map(|filter| SegmentFilterBody {
                            service_variation_id: &filter.service_variation_id,
                            team_member_id_filter: filter
                                .team_member_ids
                                .as_ref()
                                .map(|ids| FilterValueBody { any: ids.clone() }),
                        })
                        .collect(),
                },
            },
        };

        let request = self
            .request(Method::POST, "/v2/bookings/availability/search")
            .json(&body);
        let response: SearchAvailabilityResponse = self.send(request).await?;

        let location_id = query.location_id.clone();
        Ok(response
            .availabilities
            .into_iter()
            .filter_map(|availability| availability.into_slot(&location_id))
            .collect())
    }

    async fn search_customer_by_phone(&self, phone_number: &str) -> Result<Option<Customer>> {
        let body = serde_json::json!({
            "limit": 1,
            "query": { "filter": { "phone_number": { "exact": phone_number } } }
        });

        let request = self.request(Method::POST, "/v2/customers/search").json(&body);
        let response: SearchCustomersResponse = self.send(request).await?;
        Ok(response.customers.into_iter().next())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer> {
        let body = CreateCustomerRequest {
            idempotency_key: idempotency_key(),
            customer,
        };

        let request = self.request(Method::POST, "/v2/customers").json(&body);
        let response: CustomerResponse = self.send(request).await?;
        tracing::info!("Created Square customer {}", response.customer.id);
        Ok(response.customer)
    }

    async fn create_card(&self, customer_id: &str, source_id: &str) -> Result<Card> {
        let body = serde_json::json!({
            "idempotency_key": idempotency_key(),
            "source_id": source_id,
            "card": { "customer_id": customer_id }
        });

        let request = self.request(Method::POST, "/v2/cards").json(&body);
        let response: CardResponse = self.send(request).await?;
        Ok(response.card)
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<Booking> {
        let body = CreateBookingRequest {
            idempotency_key: idempotency_key(),
            booking: BookingBody {
                start_at: rfc3339(booking.start_at),
                location_id: &booking.location_id,
                customer_id: &booking.customer_id,
                customer_note: booking.customer_note.as_deref(),
                appointment_segments: &booking.appointment_segments,
            },
        };

        let request = self.request(Method::POST, "/v2/bookings").json(&body);
        let response: BookingResponse = self.send(request).await?;
        response.booking.into_booking()
    }

    async fn retrieve_booking(&self, booking_id: &str) -> Result<Booking> {
        ensure_object_id(booking_id)?;
        let request = self.request(Method::GET, &format!("/v2/bookings/{}", booking_id));
        let response: BookingResponse = self.send(request).await?;
        response.booking.into_booking()
    }

    async fn list_bookings(&self, query: &BookingListQuery) -> Result<Vec<Booking>> {
        let mut params: Vec<(&str, String)> = vec![("limit", "100".to_string())];
        if let Some(location_id) = &query.location_id {
            params.push(("location_id", location_id.clone()));
        }
        if let Some(customer_id) = &query.customer_id {
            params.push(("customer_id", customer_id.clone()));
        }
        if let Some(min) = query.start_at_min {
            params.push(("start_at_min", rfc3339(min)));
        }
        if let Some(max) = query.start_at_max {
            params.push(("start_at_max", rfc3339(max)));
        }

        let mut bookings = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self.request(Method::GET, "/v2/bookings").query(&params);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor)]);
            }

            let page: ListBookingsResponse = self.send(request).await?;
            for booking in page.bookings {
                bookings.push(booking.into_booking()?);
            }

            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        warn_if_truncated("bookings", &cursor);
        Ok(bookings)
    }

    async fn cancel_booking(&self, booking_id: &str, booking_version: i64) -> Result<Booking> {
        ensure_object_id(booking_id)?;
        let body = serde_json::json!({
            "idempotency_key": idempotency_key(),
            "booking_version": booking_version
        });

        let request = self
            .request(Method::POST, &format!("/v2/bookings/{}/cancel", booking_id))
            .json(&body);
        let response: BookingResponse = self.send(request).await?;
        tracing::info!("Cancelled booking {}", booking_id);
        response.booking.into_booking()
    }
}

// ---- wire types ----

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<SquareErrorBody>,
}

#[derive(Debug, Deserialize)]
struct SquareErrorBody {
    code: Option<String>,
    detail: Option<String>,
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListCatalogResponse {
    #[serde(default)]
    objects: Vec<CatalogObject>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogObject {
    id: String,
    #[serde(default)]
    is_deleted: bool,
    item_data: Option<ItemData>,
}

#[derive(Debug, Deserialize)]
struct ItemData {
    name: Option<String>,
    product_type: Option<String>,
    #[serde(default)]
    variations: Vec<VariationObject>,
}

#[derive(Debug, Deserialize)]
struct VariationObject {
    id: String,
    version: Option<i64>,
    #[serde(default)]
    is_deleted: bool,
    item_variation_data: Option<ItemVariationData>,
}

#[derive(Debug, Deserialize)]
struct ItemVariationData {
    name: Option<String>,
    /// 毫秒
    service_duration: Option<i64>,
    price_money: Option<Money>,
    available_for_booking: Option<bool>,
}

impl CatalogObject {
    fn into_services(self) -> Vec<ServiceVariation> {
        let item_id = self.id;
        let Some(item) = self.item_data else {
            return Vec::new();
        };
        if self.is_deleted || item.product_type.as_deref() != Some("APPOINTMENTS_SERVICE") {
            return Vec::new();
        }

        let item_name = item.name.unwrap_or_default();
        item.variations
            .into_iter()
            .filter(|variation| !variation.is_deleted)
            .filter_map(|variation| {
                let data = variation.item_variation_data?;
                if data.available_for_booking == Some(false) {
                    return None;
                }
                let duration_ms = data.service_duration.filter(|ms| *ms > 0)?;
                // 不足一分鐘的部分進位，避免預約時段比服務短
                let duration_minutes = u32::try_from((duration_ms - 1) / 60_000 + 1).ok()?;
                Some(ServiceVariation {
                    id: variation.id,
                    item_id: item_id.clone(),
                    name: item_name.clone(),
                    variation_name: data.name.unwrap_or_default(),
                    version: variation.version,
                    duration_minutes,
                    price: data.price_money,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ListBookingProfilesResponse {
    #[serde(default)]
    team_member_booking_profiles: Vec<BookingProfile>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookingProfile {
    team_member_id: String,
    display_name: Option<String>,
    is_bookable: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SearchAvailabilityRequest<'a> {
    query: AvailabilityQueryBody<'a>,
}

#[derive(Debug, Serialize)]
struct AvailabilityQueryBody<'a> {
    filter: AvailabilityFilterBody<'a>,
}

#[derive(Debug, Serialize)]
struct AvailabilityFilterBody<'a> {
    start_at_range: TimeRangeBody,
    location_id: &'a str,
    segment_filters: Vec<SegmentFilterBody<'a>>,
}

#[derive(Debug, Serialize)]
struct TimeRangeBody {
    start_at: String,
    end_at: String,
}

#[derive(Debug, Serialize)]
struct SegmentFilterBody<'a> {
    service_variation_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_member_id_filter: Option<FilterValueBody>,
}

#[derive(Debug, Serialize)]
struct FilterValueBody {
    any: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchAvailabilityResponse {
    #[serde(default)]
    availabilities: Vec<AvailabilityBody>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityBody {
    start_at: Option<DateTime<Utc>>,
    location_id: Option<String>,
    #[serde(default)]
    appointment_segments: Vec<SegmentBody>,
}

impl AvailabilityBody {
    fn into_slot(self, fallback_location: &str) -> Option<AvailabilitySlot> {
        let start_at = self.start_at?;
        Some(AvailabilitySlot {
            start_at,
            location_id: self
                .location_id
                .unwrap_or_else(|| fallback_location.to_string()),
            appointment_segments: self
                .appointment_segments
                .into_iter()
                .map(SegmentBody::into_segment)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SegmentBody {
    #[serde(default)]
    team_member_id: String,
    #[serde(default)]
    service_variation_id: String,
    service_variation_version: Option<i64>,
    duration_minutes: Option<u32>,
}

impl SegmentBody {
    fn into_segment(self) -> AppointmentSegment {
        AppointmentSegment {
            team_member_id: self.team_member_id,
            service_variation_id: self.service_variation_id,
            service_variation_version: self.service_variation_version,
            duration_minutes: self.duration_minutes.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchCustomersResponse {
    #[serde(default)]
    customers: Vec<Customer>,
}

#[derive(Debug, Serialize)]
struct CreateCustomerRequest<'a> {
    idempotency_key: String,
    #[serde(flatten)]
    customer: &'a NewCustomer,
}

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    customer: Customer,
}

#[derive(Debug, Deserialize)]
struct CardResponse {
    card: Card,
}

#[derive(Debug, Serialize)]
struct CreateBookingRequest<'a> {
    idempotency_key: String,
    booking: BookingBody<'a>,
}

#[derive(Debug, Serialize)]
struct BookingBody<'a> {
    start_at: String,
    location_id: &'a str,
    customer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_note: Option<&'a str>,
    appointment_segments: &'a [AppointmentSegment],
}

#[derive(Debug, Deserialize)]
struct BookingResponse {
    booking: BookingRecord,
}

#[derive(Debug, Deserialize)]
struct ListBookingsResponse {
    #[serde(default)]
    bookings: Vec<BookingRecord>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookingRecord {
    id: String,
    version: Option<i64>,
    status: Option<BookingStatus>,
    start_at: Option<DateTime<Utc>>,
    location_id: Option<String>,
    customer_id: Option<String>,
    customer_note: Option<String>,
    #[serde(default)]
    appointment_segments: Vec<SegmentBody>,
}

impl BookingRecord {
    fn into_booking(self) -> Result<Booking> {
        let start_at = self.start_at.ok_or_else(|| BookingError::PlatformError {
            status: 200,
            code: "MISSING_START_AT".to_string(),
            detail: format!("Booking {} has no start_at", self.id),
        })?;

        Ok(Booking {
            id: self.id,
            version: self.version.unwrap_or(0),
            status: self.status.unwrap_or(BookingStatus::Unknown),
            start_at,
            location_id: self.location_id.unwrap_or_default(),
            customer_id: self.customer_id,
            customer_note: self.customer_note,
            appointment_segments: self
                .appointment_segments
                .into_iter()
                .map(SegmentBody::into_segment)
                .collect(),
        })
    }
}
