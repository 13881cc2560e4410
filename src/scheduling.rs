//! Calendar arithmetic for coach appointments.
//!
//! All ranges are half-open: an appointment occupies `[start, end)`, so one
//! that ends at 11:00 and one that starts at 11:00 do not collide.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::AppError;
use crate::models::utc;

pub const MIN_DURATION_MINUTES: i64 = 5;
pub const MAX_DURATION_MINUTES: i64 = 8 * 60;
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    #[serde(serialize_with = "utc::serialize")]
    pub start: NaiveDateTime,
    #[serde(serialize_with = "utc::serialize")]
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn from_duration(start: NaiveDateTime, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    /// `[a, b)` and `[c, d)` intersect iff `a < d && c < b`.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

pub fn validate_duration(minutes: i64) -> Result<i64, AppError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(AppError::Validation(format!(
            "duration_minutes must be between {} and {}",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )))
    }
}

/// Returns the first busy range that collides with `proposed`.
pub fn first_conflict<'a>(
    busy: impl IntoIterator<Item = &'a TimeRange>,
    proposed: &TimeRange,
) -> Option<&'a TimeRange> {
    busy.into_iter().find(|range| range.overlaps(proposed))
}

/// The bookable window of one day, `[start_hour:00, end_hour:00)`.
pub fn working_window(date: NaiveDate, start_hour: u32, end_hour: u32) -> Result<TimeRange, AppError> {
    let at = |hour: u32| {
        if hour == 24 {
            date.succ_opt().map(|d| d.and_time(NaiveTime::MIN))
        } else {
            NaiveTime::from_hms_opt(hour, 0, 0).map(|t| date.and_time(t))
        }
    };

    match (at(start_hour), at(end_hour)) {
        (Some(start), Some(end)) if start < end => Ok(TimeRange::new(start, end)),
        _ => Err(AppError::Internal(format!(
            "Invalid working window {}..{}",
            start_hour, end_hour
        ))),
    }
}

/// Steps through `window` in `duration` increments and keeps every slot
/// that fits in the window and misses all `busy` ranges.
pub fn available_slots(window: &TimeRange, duration_minutes: i64, busy: &[TimeRange]) -> Vec<TimeRange> {
    let step = Duration::minutes(duration_minutes);
    if duration_minutes <= 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut slot = TimeRange::new(window.start, window.start + step);
    while window.contains(&slot) {
        if first_conflict(busy, &slot).is_none() {
            slots.push(slot);
        }
        slot = TimeRange::new(slot.end, slot.end + step);
    }
    slots
}
