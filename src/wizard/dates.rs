//! Nested date-range predicates. Each rule is independent so callers can
//! attribute a failure to the exact field that broke it.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Interval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Closed-interval intersection: touching end/start days overlap.
    pub fn intersects(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("start date {start} must be before end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("range {start}..{end} spans more than one calendar-year boundary")]
    SpanTooLong { start: NaiveDate, end: NaiveDate },
    #[error("range {start}..{end} falls outside {outer_start}..{outer_end}")]
    OutOfBounds {
        start: NaiveDate,
        end: NaiveDate,
        outer_start: NaiveDate,
        outer_end: NaiveDate,
    },
    #[error("intervals #{first} and #{second} overlap")]
    OverlappingIntervals { first: usize, second: usize },
    #[error("interval at position {order} does not start after the one before it ends")]
    OutOfOrder { order: usize },
}

pub fn validate_outer_range(start: NaiveDate, end: NaiveDate) -> Result<(), DateRangeError> {
    if start >= end {
        return Err(DateRangeError::InvalidRange { start, end });
    }
    Ok(())
}

pub fn validate_year_span(start: NaiveDate, end: NaiveDate) -> Result<(), DateRangeError> {
    if end.year() - start.year() > 1 {
        return Err(DateRangeError::SpanTooLong { start, end });
    }
    Ok(())
}

pub fn validate_containment(outer: Interval, inner: Interval) -> Result<(), DateRangeError> {
    if inner.start >= inner.end {
        return Err(DateRangeError::InvalidRange {
            start: inner.start,
            end: inner.end,
        });
    }
    if inner.start < outer.start || inner.end > outer.end {
        return Err(DateRangeError::OutOfBounds {
            start: inner.start,
            end: inner.end,
            outer_start: outer.start,
            outer_end: outer.end,
        });
    }
    Ok(())
}

/// Every intersecting pair `(i, j)` with `i < j`, by slice position.
pub fn overlapping_pairs(intervals: &[Interval]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for i in 0..intervals.len() {
        for j in (i + 1)..intervals.len() {
            if intervals[i].intersects(&intervals[j]) {
                out.push((i, j));
            }
        }
    }
    out
}

pub fn validate_no_overlap(intervals: &[Interval]) -> Result<(), DateRangeError> {
    match overlapping_pairs(intervals).first() {
        Some(&(first, second)) => Err(DateRangeError::OverlappingIntervals { first, second }),
        None => Ok(()),
    }
}

/// Checks intervals in their declared `order`: each must start strictly
/// after the previous one ends.
pub fn validate_chronological(intervals: &[(usize, Interval)]) -> Result<(), DateRangeError> {
    let mut sorted: Vec<&(usize, Interval)> = intervals.iter().collect();
    sorted.sort_by_key(|(order, _)| *order);
    for pair in sorted.windows(2) {
        let (_, prev) = pair[0];
        let (order, cur) = pair[1];
        if cur.start <= prev.end {
            return Err(DateRangeError::OutOfOrder { order: *order });
        }
    }
    Ok(())
}
