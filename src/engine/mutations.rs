use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::availability::{check_bookable, check_no_approved_overlap};
use super::{Engine, EngineError, Entity, WalCommand};

/// Fields an owner supplies when listing a property.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProperty {
    pub owner_id: Ulid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub price_per_day: f64,
    pub available_from: Day,
    pub available_until: Day,
    pub image_url: Option<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub price_per_day: Option<f64>,
    pub available_from: Option<Day>,
    pub available_until: Option<Day>,
    pub image_url: Option<String>,
}

fn required(value: &str, max: usize, field: &'static str) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::Invalid(field));
    }
    optional(value, max, field)
}

fn optional(value: &str, max: usize, field: &'static str) -> Result<String, EngineError> {
    let value = value.trim();
    if value.len() > max {
        return Err(EngineError::LimitExceeded(field));
    }
    Ok(value.to_string())
}

fn validate_email(email: &str) -> Result<String, EngineError> {
    let email = required(email, MAX_EMAIL_LEN, "email")?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(EngineError::Invalid("email")),
    }
}

fn validate_price(price: f64) -> Result<f64, EngineError> {
    if !price.is_finite() || price < 0.0 {
        return Err(EngineError::Invalid("price_per_day must be a non-negative number"));
    }
    if price > MAX_PRICE_PER_DAY {
        return Err(EngineError::LimitExceeded("price_per_day"));
    }
    Ok(price)
}

fn validate_image(url: Option<String>) -> Result<Option<String>, EngineError> {
    match url {
        Some(u) if u.trim().is_empty() => Ok(None),
        Some(u) => optional(&u, MAX_IMAGE_URL_LEN, "image_url").map(Some),
        None => Ok(None),
    }
}

impl Engine {
    // ── Users ────────────────────────────────────────────────

    pub async fn register_user(
        &self,
        id: Ulid,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<User, EngineError> {
        let name = required(name, MAX_NAME_LEN, "name")?;
        let email = validate_email(email)?;

        let _gate = self.write_gate.read().await;
        let _users = self.users_lock.lock().await;
        if self.store.user_count() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        if self.store.user(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.store.user_by_email(&email).is_some() {
            return Err(EngineError::EmailTaken);
        }

        let user = User { id, name, email, role };
        self.wal_append(&Event::UserRegistered { user: user.clone() }).await?;
        self.store.upsert_user(user.clone());
        tracing::info!(user = %id, role = role.as_str(), "user registered");
        Ok(user)
    }

    /// Change a user's name and/or email. The role is fixed at registration.
    pub async fn update_user(
        &self,
        id: Ulid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, EngineError> {
        let name = name.filter(|n| !n.trim().is_empty());
        let email = email.filter(|e| !e.trim().is_empty());

        let _gate = self.write_gate.read().await;
        let _users = self.users_lock.lock().await;
        let mut user = self.store.user(&id).ok_or(EngineError::NotFound(Entity::User, id))?;
        if let Some(name) = name {
            user.name = required(name, MAX_NAME_LEN, "name")?;
        }
        if let Some(email) = email {
            let email = validate_email(email)?;
            if let Some(holder) = self.store.user_by_email(&email)
                && holder.id != id
            {
                return Err(EngineError::EmailTaken);
            }
            user.email = email;
        }

        let event = Event::UserUpdated {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
        };
        self.wal_append(&event).await?;
        self.store.upsert_user(user.clone());
        Ok(user)
    }

    // ── Properties ───────────────────────────────────────────

    pub async fn create_property(&self, id: Ulid, new: NewProperty) -> Result<Property, EngineError> {
        let owner = self
            .store
            .user(&new.owner_id)
            .ok_or(EngineError::NotFound(Entity::User, new.owner_id))?;
        if owner.role != Role::Owner {
            return Err(EngineError::WrongRole {
                user: owner.id,
                expected: Role::Owner,
            });
        }
        let property = Property {
            id,
            owner_id: owner.id,
            title: required(&new.title, MAX_TITLE_LEN, "title")?,
            description: optional(&new.description, MAX_DESCRIPTION_LEN, "description")?,
            address: required(&new.address, MAX_ADDRESS_LEN, "address")?,
            city: optional(&new.city, MAX_CITY_LEN, "city")?,
            price_per_day: validate_price(new.price_per_day)?,
            window: DateRange::checked(new.available_from, new.available_until)?,
            image_url: validate_image(new.image_url)?,
        };

        let _gate = self.write_gate.read().await;
        if self.store.property_count() >= MAX_PROPERTIES {
            return Err(EngineError::LimitExceeded("too many properties"));
        }
        if self.store.contains_property(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        self.wal_append(&Event::PropertyCreated { property: property.clone() }).await?;
        self.store.insert_property(PropertyState::new(property.clone()));
        tracing::info!(property = %id, owner = %owner.id, "property listed");
        Ok(property)
    }

    /// Apply an owner's edit. Existing reservations are not re-checked
    /// against a changed window; the window constrains new requests only.
    pub async fn update_property(&self, id: Ulid, patch: PropertyPatch) -> Result<Property, EngineError> {
        let _gate = self.write_gate.read().await;
        let mut guard = self.lock_property(&id).await?;

        let mut property = guard.property.clone();
        if let Some(title) = &patch.title {
            property.title = required(title, MAX_TITLE_LEN, "title")?;
        }
        if let Some(description) = &patch.description {
            property.description = optional(description, MAX_DESCRIPTION_LEN, "description")?;
        }
        if let Some(address) = &patch.address {
            property.address = required(address, MAX_ADDRESS_LEN, "address")?;
        }
        if let Some(city) = &patch.city {
            property.city = optional(city, MAX_CITY_LEN, "city")?;
        }
        if let Some(price) = patch.price_per_day {
            property.price_per_day = validate_price(price)?;
        }
        if patch.available_from.is_some() || patch.available_until.is_some() {
            property.window = DateRange::checked(
                patch.available_from.unwrap_or(property.window.start),
                patch.available_until.unwrap_or(property.window.end),
            )?;
        }
        if patch.image_url.is_some() {
            property.image_url = validate_image(patch.image_url)?;
        }

        let event = Event::PropertyUpdated { property: property.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!(property = %id, "property updated");
        Ok(property)
    }

    /// Delete a property together with its reservations and reviews.
    pub async fn delete_property(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.write_gate.read().await;
        let guard = self.lock_property(&id).await?;
        self.wal_append(&Event::PropertyDeleted { id }).await?;
        self.store.forget_reservations(&guard);
        self.store.remove_property(&id);
        tracing::info!(
            property = %id,
            reservations = guard.reservations.len(),
            reviews = guard.reviews.len(),
            "property deleted"
        );
        Ok(())
    }

    // ── Reservation lifecycle ────────────────────────────────

    /// Create a pending reservation. The bookability check and the insert
    /// happen under the property's write lock.
    pub async fn request_reservation(
        &self,
        id: Ulid,
        property_id: Ulid,
        renter_id: Ulid,
        range: DateRange,
    ) -> Result<Reservation, EngineError> {
        let renter = self
            .store
            .user(&renter_id)
            .ok_or(EngineError::Invalid("unknown renter"))?;
        if renter.role != Role::Renter {
            return Err(EngineError::WrongRole {
                user: renter_id,
                expected: Role::Renter,
            });
        }
        if range.nights() > MAX_STAY_NIGHTS {
            return Err(EngineError::LimitExceeded("stay too long"));
        }

        let _gate = self.write_gate.read().await;
        let mut guard = match self.lock_property(&property_id).await {
            Ok(guard) => guard,
            Err(EngineError::NotFound(..)) => return Err(EngineError::Invalid("unknown property")),
            Err(e) => return Err(e),
        };
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_PROPERTY {
            return Err(EngineError::LimitExceeded("too many reservations on property"));
        }
        if self.store.property_for_reservation(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }

        if let Err(e) = check_bookable(&guard, &range) {
            metrics::counter!(observability::BOOKING_REJECTIONS_TOTAL, "reason" => e.code())
                .increment(1);
            tracing::debug!(property = %property_id, renter = %renter_id, "reservation refused: {e}");
            return Err(e);
        }

        let reservation = Reservation {
            id,
            property_id,
            renter_id,
            range,
            status: ReservationStatus::Pending,
        };
        let event = Event::ReservationRequested { reservation: reservation.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::RESERVATIONS_REQUESTED_TOTAL).increment(1);
        tracing::info!(reservation = %id, property = %property_id, "reservation requested");
        Ok(reservation)
    }

    /// Approve or reject a pending reservation.
    ///
    /// Approval re-checks overlap against the other approved reservations so
    /// two overlapping requests cannot both be approved; a refused approval
    /// leaves the reservation pending.
    pub async fn decide_reservation(
        &self,
        id: Ulid,
        approve: bool,
        acting_owner: Option<Ulid>,
    ) -> Result<Reservation, EngineError> {
        let _gate = self.write_gate.read().await;
        let mut guard = self.lock_reservation(&id).await?;
        let property_id = guard.id();

        if let Some(owner) = acting_owner
            && owner != guard.property.owner_id
        {
            return Err(EngineError::NotOwner(owner));
        }
        let current = guard
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        if current.status.is_terminal() {
            return Err(EngineError::AlreadyDecided(id));
        }

        let status = if approve {
            if let Err(e) = check_no_approved_overlap(&guard, &current.range, Some(id)) {
                metrics::counter!(observability::BOOKING_REJECTIONS_TOTAL, "reason" => "APPROVAL_OVERLAP")
                    .increment(1);
                tracing::warn!(reservation = %id, "approval refused: {e}");
                return Err(e);
            }
            ReservationStatus::Approved
        } else {
            ReservationStatus::Rejected
        };

        let event = Event::ReservationDecided { id, property_id, status };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::RESERVATIONS_DECIDED_TOTAL, "status" => status.as_str())
            .increment(1);
        tracing::info!(reservation = %id, status = status.as_str(), "reservation decided");
        Ok(Reservation { status, ..current })
    }

    /// Review a finished stay. `today` is the caller's current date; the
    /// stay's last day must be strictly before it.
    ///
    /// The reservation's approval status is not consulted.
    pub async fn post_review(
        &self,
        id: Ulid,
        reservation_id: Ulid,
        rating: i64,
        comment: &str,
        acting_renter: Option<Ulid>,
        today: Day,
    ) -> Result<Review, EngineError> {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::InvalidRating(rating));
        }
        let comment = optional(comment, MAX_COMMENT_LEN, "comment")?;

        let _gate = self.write_gate.read().await;
        let mut guard = self.lock_reservation(&reservation_id).await?;
        let reservation = guard
            .reservation(&reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, reservation_id))?;

        if let Some(renter) = acting_renter
            && renter != reservation.renter_id
        {
            return Err(EngineError::NotRenter(renter));
        }
        if guard.review_for(&reservation_id).is_some() {
            return Err(EngineError::AlreadyReviewed(reservation_id));
        }
        if reservation.range.end >= today {
            return Err(EngineError::StayNotEnded);
        }

        let review = Review {
            id,
            reservation_id,
            rating: rating as u8,
            comment,
        };
        let event = Event::ReviewPosted {
            property_id: guard.id(),
            review: review.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::REVIEWS_POSTED_TOTAL).increment(1);
        tracing::info!(review = %id, reservation = %reservation_id, rating, "review posted");
        Ok(review)
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the WAL as the minimal event set recreating current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.write_gate.write().await;

        let mut events: Vec<Event> = self
            .store
            .users()
            .into_iter()
            .map(|user| Event::UserRegistered { user })
            .collect();
        for (_, state) in self.store.properties() {
            let guard = state.read().await;
            events.push(Event::PropertyCreated {
                property: guard.property.clone(),
            });
            // Reservations carry their current status, so no Decided events.
            for reservation in &guard.reservations {
                events.push(Event::ReservationRequested {
                    reservation: reservation.clone(),
                });
                if let Some(review) = guard.review_for(&reservation.id) {
                    events.push(Event::ReviewPosted {
                        property_id: guard.id(),
                        review: review.clone(),
                    });
                }
            }
        }
        let count = events.len();

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
