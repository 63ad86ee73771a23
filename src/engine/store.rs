use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::SharedPropertyState;

/// Normalised key for the unique-email index.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory collections behind the engine.
///
/// Users and the email index are plain records; each property owns its
/// reservations and reviews behind one lock.
pub struct Store {
    users: DashMap<Ulid, User>,
    emails: DashMap<String, Ulid>,
    properties: DashMap<Ulid, SharedPropertyState>,
    /// Reverse lookup: reservation id → property id.
    reservation_to_property: DashMap<Ulid, Ulid>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            properties: DashMap::new(),
            reservation_to_property: DashMap::new(),
        }
    }

    /// Rebuild state from a replayed event log. Events referring to records
    /// that no longer exist are skipped.
    pub fn from_events(events: &[Event]) -> Self {
        let store = Self::new();
        // Sole owner of every Arc here, so try_write never contends. Avoid
        // blocking_write: this may run inside the runtime.
        for event in events {
            match event {
                Event::UserRegistered { user } => store.upsert_user(user.clone()),
                Event::UserUpdated { id, name, email } => {
                    if let Some(mut user) = store.user(id) {
                        user.name = name.clone();
                        user.email = email.clone();
                        store.upsert_user(user);
                    }
                }
                Event::PropertyCreated { property } => {
                    store.insert_property(PropertyState::new(property.clone()));
                }
                Event::PropertyDeleted { id } => {
                    if let Some(state) = store.property(id) {
                        let guard = state.try_read().expect("replay: uncontended read");
                        store.forget_reservations(&guard);
                    }
                    store.remove_property(id);
                }
                other => {
                    if let Some(pid) = event_property_id(other)
                        && let Some(state) = store.property(&pid)
                    {
                        let mut guard = state.try_write().expect("replay: uncontended write");
                        store.apply_event(&mut guard, other);
                    }
                }
            }
        }
        store
    }

    // ── Users ────────────────────────────────────────────────

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(&email_key(email))?.value();
        self.user(&id)
    }

    /// Insert or replace a user, keeping the email index in step.
    pub fn upsert_user(&self, user: User) {
        if let Some(previous) = self.users.get(&user.id).map(|e| e.value().email.clone())
            && email_key(&previous) != email_key(&user.email)
        {
            self.emails.remove(&email_key(&previous));
        }
        self.emails.insert(email_key(&user.email), user.id);
        self.users.insert(user.id, user);
    }

    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    // ── Properties ───────────────────────────────────────────

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn contains_property(&self, id: &Ulid) -> bool {
        self.properties.contains_key(id)
    }

    pub fn property(&self, id: &Ulid) -> Option<SharedPropertyState> {
        self.properties.get(id).map(|e| e.value().clone())
    }

    pub fn insert_property(&self, state: PropertyState) {
        for r in &state.reservations {
            self.map_reservation(r.id, state.id());
        }
        self.properties.insert(state.id(), Arc::new(RwLock::new(state)));
    }

    pub fn remove_property(&self, id: &Ulid) -> Option<SharedPropertyState> {
        self.properties.remove(id).map(|(_, state)| state)
    }

    /// Every property, in creation order (ULIDs sort by time).
    pub fn properties(&self) -> Vec<(Ulid, SharedPropertyState)> {
        let mut all: Vec<_> = self
            .properties
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    // ── Reservation index ────────────────────────────────────

    pub fn property_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_property
            .get(reservation_id)
            .map(|e| *e.value())
    }

    pub fn map_reservation(&self, reservation_id: Ulid, property_id: Ulid) {
        self.reservation_to_property.insert(reservation_id, property_id);
    }

    /// Drop index entries for every reservation of a property being deleted.
    pub fn forget_reservations(&self, state: &PropertyState) {
        for r in &state.reservations {
            self.reservation_to_property.remove(&r.id);
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply a property-scoped event. The caller holds the property's lock.
    pub fn apply_event(&self, ps: &mut PropertyState, event: &Event) {
        match event {
            Event::PropertyUpdated { property } => {
                ps.property = property.clone();
            }
            Event::ReservationRequested { reservation } => {
                ps.reservations.push(reservation.clone());
                self.map_reservation(reservation.id, ps.id());
            }
            Event::ReservationDecided { id, status, .. } => {
                if let Some(r) = ps.reservation_mut(id) {
                    r.status = *status;
                }
            }
            Event::ReviewPosted { review, .. } => {
                ps.reviews.insert(review.reservation_id, review.clone());
            }
            // Handled at the collection level.
            Event::UserRegistered { .. }
            | Event::UserUpdated { .. }
            | Event::PropertyCreated { .. }
            | Event::PropertyDeleted { .. } => {}
        }
    }
}

/// The property a property-scoped event belongs to.
fn event_property_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::PropertyUpdated { property } => Some(property.id),
        Event::ReservationRequested { reservation } => Some(reservation.property_id),
        Event::ReservationDecided { property_id, .. } | Event::ReviewPosted { property_id, .. } => {
            Some(*property_id)
        }
        Event::UserRegistered { .. }
        | Event::UserUpdated { .. }
        | Event::PropertyCreated { .. }
        | Event::PropertyDeleted { .. } => None,
    }
}
