use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Calendar day; the only time type stored in records.
pub type Day = NaiveDate;

/// Closed interval `[start, end]` of calendar days.
///
/// Both ends are inclusive: a stay from the 1st to the 5th occupies the 5th,
/// so a second stay starting on the 5th conflicts with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Day,
    pub end: Day,
}

impl DateRange {
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Build a range from caller input, rejecting inverted bounds.
    pub fn checked(start: Day, end: Day) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Days between start and end (a same-day stay has zero nights).
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Inclusive-bound intersection test. Symmetric.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// True if `self` lies entirely inside `window`.
    pub fn within(&self, window: &DateRange) -> bool {
        self.start >= window.start && self.end <= window.end
    }

    pub fn contains_day(&self, day: Day) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "locador", alias = "owner")]
    Owner,
    #[serde(rename = "locatario", alias = "renter")]
    Renter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "locador",
            Role::Renter => "locatario",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "locador" | "owner" => Some(Role::Owner),
            "locatario" | "renter" => Some(Role::Renter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub price_per_day: f64,
    /// Availability window; every reservation must fall inside it when created.
    pub window: DateRange,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub property_id: Ulid,
    pub renter_id: Ulid,
    pub range: DateRange,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn is_approved(&self) -> bool {
        self.status == ReservationStatus::Approved
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Ulid,
    pub reservation_id: Ulid,
    pub rating: u8,
    pub comment: String,
}

/// Everything that hangs off one property: the unit of locking.
#[derive(Debug, Clone)]
pub struct PropertyState {
    pub property: Property,
    /// Reservations in request order.
    pub reservations: Vec<Reservation>,
    /// Reviews keyed by reservation id (at most one per reservation).
    pub reviews: HashMap<Ulid, Review>,
}

impl PropertyState {
    pub fn new(property: Property) -> Self {
        Self {
            property,
            reservations: Vec::new(),
            reviews: HashMap::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.property.id
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    /// Approved reservations. Only these block a candidate range.
    pub fn approved(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(|r| r.is_approved())
    }

    pub fn review_for(&self, reservation_id: &Ulid) -> Option<&Review> {
        self.reviews.get(reservation_id)
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        user: User,
    },
    UserUpdated {
        id: Ulid,
        name: String,
        email: String,
    },
    PropertyCreated {
        property: Property,
    },
    PropertyUpdated {
        property: Property,
    },
    PropertyDeleted {
        id: Ulid,
    },
    ReservationRequested {
        reservation: Reservation,
    },
    ReservationDecided {
        id: Ulid,
        property_id: Ulid,
        status: ReservationStatus,
    },
    ReviewPosted {
        property_id: Ulid,
        review: Review,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyListing {
    pub property: Property,
    pub average_rating: Option<f64>,
    pub reservation_count: usize,
}

/// A reservation as seen by the owner of the property.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerReservation {
    pub reservation: Reservation,
    pub property_title: String,
    pub renter_name: Option<String>,
}

/// A reservation as seen by the renter who made it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenterReservation {
    pub reservation: Reservation,
    pub property_title: String,
    pub image_url: Option<String>,
    pub review: Option<Review>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyReview {
    pub rating: u8,
    pub comment: String,
    pub renter_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn r(start: &str, end: &str) -> DateRange {
        DateRange::new(d(start), d(end))
    }

    #[test]
    fn range_basics() {
        let a = r("2025-05-01", "2025-05-05");
        assert_eq!(a.nights(), 4);
        assert!(a.contains_day(d("2025-05-01")));
        assert!(a.contains_day(d("2025-05-05"))); // closed
        assert!(!a.contains_day(d("2025-05-06")));
        assert_eq!(r("2025-05-01", "2025-05-01").nights(), 0);
    }

    #[test]
    fn range_checked_rejects_inverted() {
        assert!(DateRange::checked(d("2025-05-02"), d("2025-05-01")).is_err());
        assert!(DateRange::checked(d("2025-05-01"), d("2025-05-01")).is_ok());
    }

    #[test]
    fn range_overlap() {
        let a = r("2025-05-01", "2025-05-05");
        let b = r("2025-05-03", "2025-05-04");
        let c = r("2025-05-06", "2025-05-09");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn shared_boundary_day_overlaps() {
        // Same-day checkout/checkin is a conflict.
        let a = r("2025-05-01", "2025-05-05");
        let b = r("2025-05-05", "2025-05-08");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn overlap_is_symmetric() {
        let days = [
            "2025-01-01",
            "2025-01-02",
            "2025-01-03",
            "2025-01-04",
            "2025-01-05",
        ];
        let mut ranges = Vec::new();
        for (i, s) in days.iter().enumerate() {
            for e in &days[i..] {
                ranges.push(r(s, e));
            }
        }
        for a in &ranges {
            for b in &ranges {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn range_within() {
        let window = r("2025-04-10", "2025-12-31");
        assert!(r("2025-04-10", "2025-04-12").within(&window));
        assert!(r("2025-12-01", "2025-12-31").within(&window));
        assert!(window.within(&window)); // self-containment
        assert!(!r("2025-04-09", "2025-04-12").within(&window));
        assert!(!r("2025-12-30", "2026-01-01").within(&window));
    }

    #[test]
    fn role_parse_accepts_both_vocabularies() {
        assert_eq!(Role::parse("locador"), Some(Role::Owner));
        assert_eq!(Role::parse("Owner"), Some(Role::Owner));
        assert_eq!(Role::parse("locatario"), Some(Role::Renter));
        assert_eq!(Role::parse(" renter "), Some(Role::Renter));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::Owner.as_str(), "locador");
    }

    #[test]
    fn role_json_names() {
        assert_eq!(serde_json::to_string(&Role::Renter).unwrap(), "\"locatario\"");
        let parsed: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(parsed, Role::Owner);
    }

    #[test]
    fn status_terminality() {
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(ReservationStatus::Approved.is_terminal());
        assert!(ReservationStatus::Rejected.is_terminal());
    }

    #[test]
    fn property_state_approved_filter() {
        let pid = Ulid::new();
        let mut ps = PropertyState::new(Property {
            id: pid,
            owner_id: Ulid::new(),
            title: "Casa".into(),
            description: String::new(),
            address: "Rua A".into(),
            city: "Recife".into(),
            price_per_day: 100.0,
            window: r("2025-01-01", "2025-12-31"),
            image_url: None,
        });
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Approved,
            ReservationStatus::Rejected,
        ] {
            ps.reservations.push(Reservation {
                id: Ulid::new(),
                property_id: pid,
                renter_id: Ulid::new(),
                range: r("2025-02-01", "2025-02-03"),
                status,
            });
        }
        let approved: Vec<_> = ps.approved().collect();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].status, ReservationStatus::Approved);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationRequested {
            reservation: Reservation {
                id: Ulid::new(),
                property_id: Ulid::new(),
                renter_id: Ulid::new(),
                range: r("2025-05-01", "2025-05-05"),
                status: ReservationStatus::Pending,
            },
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
