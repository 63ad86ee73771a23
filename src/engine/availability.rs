use ulid::Ulid;

use crate::model::*;

use super::EngineError;

// ── Bookability ──────────────────────────────────────────────────

/// Fail if `candidate` overlaps an approved reservation other than `exclude`.
///
/// Pending and rejected reservations never block.
pub fn check_no_approved_overlap(
    state: &PropertyState,
    candidate: &DateRange,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    for existing in state.approved() {
        if Some(existing.id) == exclude {
            continue;
        }
        if existing.range.overlaps(candidate) {
            return Err(EngineError::Conflict(existing.id));
        }
    }
    Ok(())
}

/// The single gate shared by search and booking: the candidate must sit
/// inside the availability window and clear every approved reservation.
pub fn check_bookable(state: &PropertyState, candidate: &DateRange) -> Result<(), EngineError> {
    if !candidate.within(&state.property.window) {
        return Err(EngineError::OutsideWindow);
    }
    check_no_approved_overlap(state, candidate, None)
}

pub fn is_bookable(state: &PropertyState, candidate: &DateRange) -> bool {
    check_bookable(state, candidate).is_ok()
}

// ── Free ranges ──────────────────────────────────────────────────

/// The availability window minus every approved reservation, ascending.
///
/// A range is bookable exactly when it fits inside one of the returned ranges.
pub fn free_ranges(state: &PropertyState) -> Vec<DateRange> {
    let window = state.property.window;
    let mut taken: Vec<DateRange> = state
        .approved()
        .map(|r| r.range)
        .filter(|r| r.overlaps(&window))
        .collect();
    taken.sort_by_key(|r| r.start);

    let mut free = Vec::new();
    let mut cursor = Some(window.start);
    for t in &taken {
        let Some(from) = cursor else { break };
        if t.start > from
            && let Some(until) = t.start.pred_opt()
        {
            free.push(DateRange::new(from, until.min(window.end)));
        }
        if t.end >= from {
            cursor = t.end.succ_opt();
        }
    }
    if let Some(from) = cursor
        && from <= window.end
    {
        free.push(DateRange::new(from, window.end));
    }
    free
}
