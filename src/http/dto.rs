//! Data Transfer Objects for the HTTP API.
//!
//! Ids travel as ULID strings and dates as `YYYY-MM-DD`.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{
    DateRange, Day, OwnerReservation, PropertyListing, PropertyReview, RenterReservation,
    ReservationStatus, Review, User,
};

/// Renter name shown in review lists when the renter no longer exists.
pub const ANONYMOUS_RENTER: &str = "Anônimo";
/// Renter name shown in owner reservation lists when the renter is unknown.
pub const UNKNOWN_RENTER: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub users: usize,
    pub properties: usize,
}

// ── Auth ────────────────────────────────────────────────────────

/// Fields are optional so that a missing one is reported as a validation
/// error naming the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// `locador` / `locatario` (or `owner` / `renter`)
    #[serde(default)]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Ulid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub user_type: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            user_type: user.role.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditUserRequest {
    pub id: Ulid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// ── Owner side ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    pub price_per_day: f64,
    pub available_from: Day,
    pub available_until: Day,
    pub owner_id: Ulid,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePropertyResponse {
    pub message: String,
    pub property_id: Ulid,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePropertyRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub price_per_day: Option<f64>,
    #[serde(default)]
    pub available_from: Option<Day>,
    #[serde(default)]
    pub available_until: Option<Day>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A property as listed to owners and in search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDto {
    pub id: Ulid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub price_per_day: f64,
    pub available_from: Day,
    pub available_until: Day,
    pub image_url: Option<String>,
    pub owner_id: Ulid,
    /// Mean review rating to one decimal; `null` when unrated.
    pub average_rating: Option<f64>,
    pub reservation_count: usize,
}

impl From<PropertyListing> for PropertyDto {
    fn from(listing: PropertyListing) -> Self {
        let p = listing.property;
        Self {
            id: p.id,
            title: p.title,
            description: p.description,
            address: p.address,
            city: p.city,
            price_per_day: p.price_per_day,
            available_from: p.window.start,
            available_until: p.window.end,
            image_url: p.image_url,
            owner_id: p.owner_id,
            average_rating: listing.average_rating,
            reservation_count: listing.reservation_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerReservationDto {
    pub reservation_id: Ulid,
    pub property_id: Ulid,
    pub property_title: String,
    pub renter_name: String,
    pub start_date: Day,
    pub end_date: Day,
    pub status: ReservationStatus,
}

impl From<OwnerReservation> for OwnerReservationDto {
    fn from(row: OwnerReservation) -> Self {
        let r = row.reservation;
        Self {
            reservation_id: r.id,
            property_id: r.property_id,
            property_title: row.property_title,
            renter_name: row.renter_name.unwrap_or_else(|| UNKNOWN_RENTER.to_string()),
            start_date: r.range.start,
            end_date: r.range.end,
            status: r.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideRequest {
    pub approved: bool,
    #[serde(default)]
    pub owner_id: Option<Ulid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideResponse {
    pub message: String,
    pub status: ReservationStatus,
}

// ── Renter side ─────────────────────────────────────────────────

/// Raw search query; every field is parsed by the handler so that bad
/// values come back as API errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub min_price: Option<String>,
    #[serde(default)]
    pub max_price: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub property_id: Ulid,
    pub renter_id: Ulid,
    pub start_date: Day,
    pub end_date: Day,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveResponse {
    pub message: String,
    pub reservation_id: Ulid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDto {
    pub id: Ulid,
    pub reservation_id: Ulid,
    pub rating: u8,
    pub comment: String,
}

impl From<Review> for ReviewDto {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            reservation_id: r.reservation_id,
            rating: r.rating,
            comment: r.comment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenterReservationDto {
    pub reservation_id: Ulid,
    pub property_id: Ulid,
    pub property_title: String,
    pub image_url: Option<String>,
    pub start_date: Day,
    pub end_date: Day,
    pub status: ReservationStatus,
    pub review: Option<ReviewDto>,
}

impl From<RenterReservation> for RenterReservationDto {
    fn from(row: RenterReservation) -> Self {
        let r = row.reservation;
        Self {
            reservation_id: r.id,
            property_id: r.property_id,
            property_title: row.property_title,
            image_url: row.image_url,
            start_date: r.range.start,
            end_date: r.range.end,
            status: r.status,
            review: row.review.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub reservation_id: Ulid,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub renter_id: Option<Ulid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub message: String,
    pub review_id: Ulid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyReviewDto {
    pub rating: u8,
    pub comment: String,
    pub renter_name: String,
}

impl From<PropertyReview> for PropertyReviewDto {
    fn from(r: PropertyReview) -> Self {
        Self {
            rating: r.rating,
            comment: r.comment,
            renter_name: r.renter_name.unwrap_or_else(|| ANONYMOUS_RENTER.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeDto {
    pub start_date: Day,
    pub end_date: Day,
}

impl From<DateRange> for RangeDto {
    fn from(r: DateRange) -> Self {
        Self {
            start_date: r.start,
            end_date: r.end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub property_id: Ulid,
    pub free: Vec<RangeDto>,
}
