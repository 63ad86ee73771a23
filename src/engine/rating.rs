use crate::model::PropertyState;

/// Mean review rating for a property, rounded to one decimal place.
///
/// `None` when nobody has reviewed a stay yet; an unrated property is not a
/// zero-rated one.
pub fn average_rating(state: &PropertyState) -> Option<f64> {
    let ratings: Vec<u32> = state
        .reservations
        .iter()
        .filter_map(|r| state.review_for(&r.id))
        .map(|review| u32::from(review.rating))
        .collect();
    mean_one_decimal(&ratings)
}

pub(crate) fn mean_one_decimal(ratings: &[u32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: u32 = ratings.iter().sum();
    let mean = f64::from(sum) / ratings.len() as f64;
    // Half-way cases go to the even tenth: 4.25 -> 4.2, 4.75 -> 4.8.
    Some((mean * 10.0).round_ties_even() / 10.0)
}
