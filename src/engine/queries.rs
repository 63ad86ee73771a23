use ulid::Ulid;

use crate::model::*;

use super::availability::free_ranges;
use super::rating::average_rating;
use super::search::SearchFilter;
use super::{Engine, EngineError, Entity};

fn listing(state: &PropertyState) -> PropertyListing {
    PropertyListing {
        property: state.property.clone(),
        average_rating: average_rating(state),
        reservation_count: state.reservations.len(),
    }
}

impl Engine {
    pub fn login(&self, email: &str) -> Result<User, EngineError> {
        if email.trim().is_empty() {
            return Err(EngineError::Invalid("email"));
        }
        self.store.user_by_email(email).ok_or(EngineError::EmailNotFound)
    }

    pub fn get_user(&self, id: &Ulid) -> Option<User> {
        self.store.user(id)
    }

    pub async fn get_property(&self, id: &Ulid) -> Option<Property> {
        let state = self.store.property(id)?;
        let guard = state.read().await;
        Some(guard.property.clone())
    }

    pub async fn get_reservation(&self, id: &Ulid) -> Option<Reservation> {
        let pid = self.store.property_for_reservation(id)?;
        let state = self.store.property(&pid)?;
        let guard = state.read().await;
        guard.reservation(id).cloned()
    }

    /// Properties matching `filter`, in creation order, each with its
    /// current average rating.
    pub async fn search(&self, filter: &SearchFilter) -> Vec<PropertyListing> {
        let mut out = Vec::new();
        for (_, state) in self.store.properties() {
            let guard = state.read().await;
            if filter.matches(&guard) {
                out.push(listing(&guard));
            }
        }
        out
    }

    pub async fn owner_properties(&self, owner_id: &Ulid) -> Vec<PropertyListing> {
        let mut out = Vec::new();
        for (_, state) in self.store.properties() {
            let guard = state.read().await;
            if guard.property.owner_id == *owner_id {
                out.push(listing(&guard));
            }
        }
        out
    }

    /// Every reservation across an owner's properties.
    pub async fn owner_reservations(&self, owner_id: &Ulid) -> Vec<OwnerReservation> {
        let mut out = Vec::new();
        for (_, state) in self.store.properties() {
            let guard = state.read().await;
            if guard.property.owner_id != *owner_id {
                continue;
            }
            for reservation in &guard.reservations {
                out.push(OwnerReservation {
                    reservation: reservation.clone(),
                    property_title: guard.property.title.clone(),
                    renter_name: self.store.user(&reservation.renter_id).map(|u| u.name),
                });
            }
        }
        out
    }

    /// A renter's reservations with the property's title, image and any review.
    pub async fn renter_reservations(&self, renter_id: &Ulid) -> Result<Vec<RenterReservation>, EngineError> {
        let renter = self
            .store
            .user(renter_id)
            .ok_or(EngineError::NotFound(Entity::User, *renter_id))?;
        if renter.role != Role::Renter {
            return Err(EngineError::WrongRole {
                user: renter.id,
                expected: Role::Renter,
            });
        }

        let mut out = Vec::new();
        for (_, state) in self.store.properties() {
            let guard = state.read().await;
            for reservation in guard.reservations.iter().filter(|r| r.renter_id == *renter_id) {
                out.push(RenterReservation {
                    reservation: reservation.clone(),
                    property_title: guard.property.title.clone(),
                    image_url: guard.property.image_url.clone(),
                    review: guard.review_for(&reservation.id).cloned(),
                });
            }
        }
        out.sort_by_key(|r| r.reservation.id);
        Ok(out)
    }

    /// Reviews left on a property. An unknown property has no reviews.
    pub async fn property_reviews(&self, property_id: &Ulid) -> Vec<PropertyReview> {
        let Some(state) = self.store.property(property_id) else {
            return Vec::new();
        };
        let guard = state.read().await;
        guard
            .reservations
            .iter()
            .filter_map(|r| {
                let review = guard.review_for(&r.id)?;
                Some(PropertyReview {
                    rating: review.rating,
                    comment: review.comment.clone(),
                    renter_name: self.store.user(&r.renter_id).map(|u| u.name),
                })
            })
            .collect()
    }

    pub async fn property_average_rating(&self, property_id: &Ulid) -> Result<Option<f64>, EngineError> {
        let state = self
            .store
            .property(property_id)
            .ok_or(EngineError::NotFound(Entity::Property, *property_id))?;
        let guard = state.read().await;
        Ok(average_rating(&guard))
    }

    /// Sub-ranges of the window still open for booking.
    pub async fn property_free_ranges(&self, property_id: &Ulid) -> Result<Vec<DateRange>, EngineError> {
        let state = self
            .store
            .property(property_id)
            .ok_or(EngineError::NotFound(Entity::Property, *property_id))?;
        let guard = state.read().await;
        Ok(free_ranges(&guard))
    }
}
