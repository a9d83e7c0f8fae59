// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking time windows and staff double-booking detection.
//!
//! Windows are half-open: `[start, end)`. Two windows conflict only when
//! `a.start < b.end && b.start < a.end`, so a booking ending at 10:00 and
//! another starting at 10:00 can share a staff member.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::TidyError;
use crate::models::ScheduledAssignment;
use crate::types::{BookingId, BookingStatus};

/// Longest booking a store accepts. Conflict lookups rely on it.
pub const MAX_BOOKING_MINUTES: u32 = 24 * 60;

/// Rejects zero-length bookings and bookings longer than [`MAX_BOOKING_MINUTES`].
pub fn validate_duration(booking_id: &BookingId, duration_minutes: u32) -> Result<(), TidyError> {
    if duration_minutes == 0 {
        return Err(TidyError::Validation(format!(
            "booking {booking_id} must last at least one minute"
        )));
    }
    if duration_minutes > MAX_BOOKING_MINUTES {
        return Err(TidyError::Validation(format!(
            "booking {booking_id} lasts {duration_minutes} minutes, the maximum is {MAX_BOOKING_MINUTES}"
        )));
    }
    Ok(())
}

/// The half-open interval a booking occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Window starting at `date` + `time` and lasting `duration_minutes`.
    pub fn new(date: NaiveDate, time: NaiveTime, duration_minutes: u32) -> Self {
        let start = date.and_time(time);
        let end = start + TimeDelta::minutes(i64::from(duration_minutes));
        Self { start, end }
    }

    /// Half-open overlap test.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Inclusive range of booking dates that can hold a window overlapping this one.
    ///
    /// Stored bookings last at most [`MAX_BOOKING_MINUTES`], so anything
    /// starting the day before may still be running at `start`.
    pub fn lookup_dates(&self) -> (NaiveDate, NaiveDate) {
        let first = self.start.date();
        let first = first.checked_sub_days(Days::new(1)).unwrap_or(first);
        (first, self.end.date())
    }
}

/// Finds the first existing assignment whose window overlaps `candidate`.
///
/// Assignments on `booking_id` itself and on cancelled bookings never conflict.
pub fn find_conflict<'a>(
    booking_id: &BookingId,
    candidate: &TimeWindow,
    existing: &'a [ScheduledAssignment],
) -> Option<&'a ScheduledAssignment> {
    existing.iter().find(|scheduled| {
        scheduled.assignment.booking_id != *booking_id
            && scheduled.booking_status != BookingStatus::Cancelled
            && scheduled.window.overlaps(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Assignment;
    use crate::types::{AssignmentRole, StaffId};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn window(h: u32, m: u32, minutes: u32) -> TimeWindow {
        TimeWindow::new(date(), NaiveTime::from_hms_opt(h, m, 0).unwrap(), minutes)
    }

    fn scheduled(booking: &str, status: BookingStatus, w: TimeWindow) -> ScheduledAssignment {
        ScheduledAssignment {
            assignment: Assignment {
                booking_id: BookingId(booking.to_string()),
                staff_id: StaffId("S1".to_string()),
                role: AssignmentRole::Lead,
                assigned_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            },
            window: w,
            booking_status: status,
        }
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let morning = window(8, 0, 120);
        let late_morning = window(10, 0, 60);
        assert!(!morning.overlaps(&late_morning));
        assert!(!late_morning.overlaps(&morning));
    }

    #[test]
    fn partial_overlap_conflicts() {
        let nine_to_eleven = window(9, 0, 120);
        let ten_to_twelve = window(10, 0, 120);
        assert!(nine_to_eleven.overlaps(&ten_to_twelve));
        assert!(ten_to_twelve.overlaps(&nine_to_eleven));
    }

    #[test]
    fn containment_conflicts() {
        let day = window(8, 0, 480);
        let lunch = window(12, 0, 30);
        assert!(day.overlaps(&lunch));
        assert!(lunch.overlaps(&day));
    }

    #[test]
    fn window_spanning_midnight_looks_at_both_days() {
        let late = window(23, 0, 180);
        let (from, to) = late.lookup_dates();
        assert_eq!(from, NaiveDate::from_ymd_opt(2026, 3, 13).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn find_conflict_skips_same_booking_and_cancelled() {
        let candidate = window(10, 0, 60);
        let existing = vec![
            scheduled("B1", BookingStatus::Confirmed, window(10, 0, 60)),
            scheduled("B2", BookingStatus::Cancelled, window(10, 0, 60)),
        ];
        assert!(find_conflict(&BookingId("B1".into()), &candidate, &existing).is_none());
    }

    #[test]
    fn find_conflict_returns_first_overlap() {
        let candidate = window(10, 0, 120);
        let existing = vec![
            scheduled("B2", BookingStatus::Confirmed, window(8, 0, 120)),
            scheduled("B3", BookingStatus::Pending, window(11, 0, 60)),
            scheduled("B4", BookingStatus::Confirmed, window(11, 30, 60)),
        ];
        let hit = find_conflict(&BookingId("B9".into()), &candidate, &existing).unwrap();
        assert_eq!(hit.assignment.booking_id, BookingId("B3".into()));
    }

    #[test]
    fn durations_are_bounded_by_one_day() {
        let id = BookingId("B1".into());
        assert!(validate_duration(&id, 1).is_ok());
        assert!(validate_duration(&id, MAX_BOOKING_MINUTES).is_ok());
        assert!(matches!(validate_duration(&id, 0), Err(TidyError::Validation(_))));
        let err = validate_duration(&id, MAX_BOOKING_MINUTES + 1).unwrap_err();
        assert!(err.to_string().contains("1441"), "{err}");
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a_start in 0u32..1380, a_len in 1u32..600, b_start in 0u32..1380, b_len in 1u32..600) {
            let a = window(a_start / 60, a_start % 60, a_len);
            let b = window(b_start / 60, b_start % 60, b_len);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn back_to_back_never_overlaps(start in 0u32..1200, len in 1u32..240, next_len in 1u32..240) {
            let first = window(start / 60, start % 60, len);
            let second = TimeWindow { start: first.end, end: first.end + TimeDelta::minutes(i64::from(next_len)) };
            prop_assert!(!first.overlaps(&second));
        }
    }
}
