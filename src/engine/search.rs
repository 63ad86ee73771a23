use crate::model::*;

use super::EngineError;
use super::availability::is_bookable;

/// Transliterate to ASCII and lowercase, so `"São Paulo"` and `"SAO PAULO"`
/// fold to the same key.
pub fn fold_key(s: &str) -> String {
    deunicode::deunicode(s).to_lowercase()
}

/// Price, text and availability predicates over the property collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    /// Folded substring matched against city or address. `None` matches all.
    city: Option<String>,
    pub min_price: f64,
    pub max_price: f64,
    pub range: Option<DateRange>,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            city: None,
            min_price: 0.0,
            max_price: f64::INFINITY,
            range: None,
        }
    }
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(mut self, city: &str) -> Self {
        let folded = fold_key(city.trim());
        self.city = (!folded.is_empty()).then_some(folded);
        self
    }

    pub fn price_between(mut self, min: Option<f64>, max: Option<f64>) -> Result<Self, EngineError> {
        let min = min.unwrap_or(0.0);
        let max = max.unwrap_or(f64::INFINITY);
        if min.is_nan() || max.is_nan() || min < 0.0 || max < 0.0 {
            return Err(EngineError::Invalid("price bounds must be non-negative numbers"));
        }
        self.min_price = min;
        self.max_price = max;
        Ok(self)
    }

    pub fn available(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Price and text predicates; cheap, no reservation scan.
    pub fn matches_listing(&self, property: &Property) -> bool {
        if property.price_per_day < self.min_price || property.price_per_day > self.max_price {
            return false;
        }
        match &self.city {
            None => true,
            Some(needle) => {
                fold_key(&property.city).contains(needle.as_str())
                    || fold_key(&property.address).contains(needle.as_str())
            }
        }
    }

    /// Full predicate, including bookability when a range was supplied.
    pub fn matches(&self, state: &PropertyState) -> bool {
        if !self.matches_listing(&state.property) {
            return false;
        }
        match &self.range {
            Some(range) => is_bookable(state, range),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn prop(city: &str, address: &str, price: f64) -> PropertyState {
        PropertyState::new(Property {
            id: Ulid::new(),
            owner_id: Ulid::new(),
            title: "Casa".into(),
            description: String::new(),
            address: address.into(),
            city: city.into(),
            price_per_day: price,
            window: DateRange::new(d("2025-04-10"), d("2025-12-31")),
            image_url: None,
        })
    }

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold_key("São Paulo"), "sao paulo");
        assert_eq!(fold_key("FLORIANÓPOLIS"), "florianopolis");
        assert_eq!(fold_key("Maceió"), "maceio");
    }

    #[test]
    fn city_matches_address_accent_insensitive() {
        let ps = prop("", "Rua Augusta 500, Sao Paulo - SP", 100.0);
        assert!(SearchFilter::new().city("São Paulo").matches(&ps));
        assert!(SearchFilter::new().city("sao paulo").matches(&ps));
        assert!(!SearchFilter::new().city("Recife").matches(&ps));
    }

    #[test]
    fn city_matches_city_field() {
        let ps = prop("São Paulo", "Rua Augusta 500", 100.0);
        assert!(SearchFilter::new().city("SAO").matches(&ps));
    }

    #[test]
    fn blank_city_is_no_filter() {
        let ps = prop("Recife", "Rua da Aurora", 100.0);
        assert!(SearchFilter::new().city("   ").matches(&ps));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let ps = prop("Recife", "Rua da Aurora", 100.0);
        let f = |min, max| SearchFilter::new().price_between(min, max).unwrap();
        assert!(f(Some(100.0), Some(100.0)).matches(&ps));
        assert!(f(None, None).matches(&ps));
        assert!(!f(Some(100.01), None).matches(&ps));
        assert!(!f(None, Some(99.99)).matches(&ps));
    }

    #[test]
    fn negative_price_bound_rejected() {
        assert!(SearchFilter::new().price_between(Some(-1.0), None).is_err());
        assert!(SearchFilter::new().price_between(None, Some(f64::NAN)).is_err());
    }

    #[test]
    fn range_filter_uses_bookability() {
        let mut ps = prop("Recife", "Rua da Aurora", 100.0);
        ps.reservations.push(Reservation {
            id: Ulid::new(),
            property_id: ps.id(),
            renter_id: Ulid::new(),
            range: DateRange::new(d("2025-05-01"), d("2025-05-05")),
            status: ReservationStatus::Approved,
        });
        let clash = SearchFilter::new().available(DateRange::new(d("2025-05-03"), d("2025-05-04")));
        let clear = SearchFilter::new().available(DateRange::new(d("2025-06-01"), d("2025-06-05")));
        let outside = SearchFilter::new().available(DateRange::new(d("2026-01-01"), d("2026-01-05")));
        assert!(!clash.matches(&ps));
        assert!(clear.matches(&ps));
        assert!(!outside.matches(&ps));
        // without a range, booking conflicts are not considered
        assert!(SearchFilter::new().matches(&ps));
    }
}
