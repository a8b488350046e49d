//! Pure funding-direction predicates and ordering.

use std::cmp::Ordering;

use crate::domain::Direction;

/// Whether a funding rate clears the cut for the requested direction.
///
/// Negative screening wants rates at or below a negative cut ("more negative
/// or equal passes"); positive screening mirrors it. A rate on the wrong
/// side of zero never passes, whatever the cut.
pub fn passes_direction(funding_rate: f64, direction: Direction, funding_cut: f64) -> bool {
    match direction {
        Direction::Negative => funding_rate < 0.0 && funding_rate <= funding_cut,
        Direction::Positive => funding_rate > 0.0 && funding_rate >= funding_cut,
    }
}

/// Comparator for the response ordering: most negative first when screening
/// negative, most positive first when screening positive.
///
/// Equal rates compare `Equal`; callers must use a stable sort so ties keep
/// their upstream discovery order.
pub fn compare_for_ordering(a: f64, b: f64, direction: Direction) -> Ordering {
    let ascending = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match direction {
        Direction::Negative => ascending,
        Direction::Positive => ascending.reverse(),
    }
}
