//! HTTP handlers for the REST API.
//!
//! Each handler parses its input, delegates to the [`Engine`](crate::engine::Engine)
//! and shapes the result into a DTO.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ulid::Ulid;

use super::dto::*;
use super::error::{ApiJson, AppError};
use super::state::AppState;
use crate::engine::{EngineError, NewProperty, PropertyPatch, SearchFilter};
use crate::model::{DateRange, Day, ReservationStatus, Role};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Result type for handlers that create a resource.
pub type CreatedResult<T> = Result<(StatusCode, Json<T>), AppError>;

fn parse_id(raw: &str) -> Result<Ulid, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("malformed id: {raw}")))
}

fn parse_price(raw: Option<&str>, field: &str) -> Result<Option<f64>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{field} must be a number"))),
    }
}

fn parse_day(raw: Option<&str>, field: &str) -> Result<Option<Day>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Day::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{field} must be a YYYY-MM-DD date"))),
    }
}

/// Build a [`SearchFilter`] from raw query strings. The date filter applies
/// only when both ends are given.
pub fn search_filter(query: &SearchQuery) -> Result<SearchFilter, AppError> {
    let min = parse_price(query.min_price.as_deref(), "min_price")?;
    let max = parse_price(query.max_price.as_deref(), "max_price")?;
    let start = parse_day(query.start_date.as_deref(), "start_date")?;
    let end = parse_day(query.end_date.as_deref(), "end_date")?;

    let mut filter = SearchFilter::new()
        .city(query.city.as_deref().unwrap_or(""))
        .price_between(min, max)?;
    if let (Some(start), Some(end)) = (start, end) {
        filter = filter.available(DateRange::checked(start, end)?);
    }
    Ok(filter)
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        users: state.engine.store.user_count(),
        properties: state.engine.store.property_count(),
    }))
}

// =============================================================================
// Auth
// =============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> CreatedResult<RegisterResponse> {
    let role = req
        .user_type
        .as_deref()
        .and_then(Role::parse)
        .ok_or(EngineError::Invalid("user_type must be locador or locatario"))?;
    let user = state
        .engine
        .register_user(
            Ulid::new(),
            req.name.as_deref().unwrap_or(""),
            req.email.as_deref().unwrap_or(""),
            role,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "user registered".to_string(),
            user_id: user.id,
        }),
    ))
}

/// POST /auth/login
///
/// Email-only identification; there is no password.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> HandlerResult<LoginResponse> {
    let user = state.engine.login(req.email.as_deref().unwrap_or(""))?;
    Ok(Json(LoginResponse {
        message: "login successful".to_string(),
        user: user.into(),
    }))
}

/// PUT /auth/edit
pub async fn edit_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EditUserRequest>,
) -> HandlerResult<MessageResponse> {
    state
        .engine
        .update_user(req.id, req.name.as_deref(), req.email.as_deref())
        .await?;
    Ok(Json(MessageResponse::new("user updated")))
}

// =============================================================================
// Owner (locador)
// =============================================================================

/// POST /locador/properties
pub async fn create_property(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePropertyRequest>,
) -> CreatedResult<CreatePropertyResponse> {
    let new = NewProperty {
        owner_id: req.owner_id,
        title: req.title,
        description: req.description,
        address: req.address,
        city: req.city.unwrap_or_default(),
        price_per_day: req.price_per_day,
        available_from: req.available_from,
        available_until: req.available_until,
        image_url: req.image_url,
    };
    let property = state.engine.create_property(Ulid::new(), new).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePropertyResponse {
            message: "property created".to_string(),
            property_id: property.id,
        }),
    ))
}

/// GET /locador/properties/{owner_id}
pub async fn owner_properties(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> HandlerResult<Vec<PropertyDto>> {
    let owner_id = parse_id(&owner_id)?;
    let listings = state.engine.owner_properties(&owner_id).await;
    Ok(Json(listings.into_iter().map(Into::into).collect()))
}

/// PUT /locador/property/{id}
pub async fn update_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePropertyRequest>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id)?;
    let patch = PropertyPatch {
        title: req.title,
        description: req.description,
        address: req.address,
        city: req.city,
        price_per_day: req.price_per_day,
        available_from: req.available_from,
        available_until: req.available_until,
        image_url: req.image_url,
    };
    state.engine.update_property(id, patch).await?;
    Ok(Json(MessageResponse::new("property updated")))
}

/// DELETE /locador/property/{id}
///
/// Also removes the property's reservations and reviews.
pub async fn delete_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id)?;
    state.engine.delete_property(id).await?;
    Ok(Json(MessageResponse::new("property deleted")))
}

/// GET /locador/reservations/{owner_id}
pub async fn owner_reservations(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> HandlerResult<Vec<OwnerReservationDto>> {
    let owner_id = parse_id(&owner_id)?;
    let rows = state.engine.owner_reservations(&owner_id).await;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// PUT /locador/reservation/{id}
pub async fn decide_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DecideRequest>,
) -> HandlerResult<DecideResponse> {
    let id = parse_id(&id)?;
    let reservation = state
        .engine
        .decide_reservation(id, req.approved, req.owner_id)
        .await?;
    let message = match reservation.status {
        ReservationStatus::Approved => "reservation approved",
        _ => "reservation rejected",
    };
    Ok(Json(DecideResponse {
        message: message.to_string(),
        status: reservation.status,
    }))
}

// =============================================================================
// Renter (locatario)
// =============================================================================

/// GET /locatario/search
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> HandlerResult<Vec<PropertyDto>> {
    let filter = search_filter(&query)?;
    let listings = state.engine.search(&filter).await;
    Ok(Json(listings.into_iter().map(Into::into).collect()))
}

/// POST /locatario/reserve
pub async fn reserve(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReserveRequest>,
) -> CreatedResult<ReserveResponse> {
    let range = DateRange::checked(req.start_date, req.end_date)?;
    let reservation = state
        .engine
        .request_reservation(Ulid::new(), req.property_id, req.renter_id, range)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReserveResponse {
            message: "reservation requested".to_string(),
            reservation_id: reservation.id,
        }),
    ))
}

/// GET /locatario/my-reservations/{user_id}
pub async fn renter_reservations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> HandlerResult<Vec<RenterReservationDto>> {
    let user_id = parse_id(&user_id)?;
    let rows = state.engine.renter_reservations(&user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// POST /locatario/review
pub async fn post_review(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> CreatedResult<ReviewResponse> {
    let review = state
        .engine
        .post_review(
            Ulid::new(),
            req.reservation_id,
            req.rating,
            &req.comment,
            req.renter_id,
            state.today(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            message: "review posted".to_string(),
            review_id: review.id,
        }),
    ))
}

/// GET /locatario/property/{id}/reviews
pub async fn property_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Vec<PropertyReviewDto>> {
    let id = parse_id(&id)?;
    let reviews = state.engine.property_reviews(&id).await;
    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

/// GET /locatario/property/{id}/availability
///
/// Free sub-ranges of the availability window, in ascending order.
pub async fn property_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<AvailabilityResponse> {
    let property_id = parse_id(&id)?;
    let free = state.engine.property_free_ranges(&property_id).await?;
    Ok(Json(AvailabilityResponse {
        property_id,
        free: free.into_iter().map(Into::into).collect(),
    }))
}
