//! Interval primitives shared by attribution, merging and reassembly.
//!
//! Pure functions over well-formed spans ([`TimeSpan`] guarantees
//! `end > start`), so none of these have failure modes.

use crate::model::TimeSpan;

/// Seconds during which both spans are active; 0.0 when disjoint.
#[must_use]
pub fn overlap_duration(a: TimeSpan, b: TimeSpan) -> f64 {
    (a.end().min(b.end()) - a.start().max(b.start())).max(0.0)
}

/// Absolute distance between the two span midpoints.
#[must_use]
pub fn center_distance(a: TimeSpan, b: TimeSpan) -> f64 {
    (a.center() - b.center()).abs()
}

/// Stable ascending sort on each element's start time. Ties keep input order.
pub fn sort_by_start<T>(items: &mut [T], start: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| start(a).total_cmp(&start(b)));
}
