use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::models::{AvailabilityWindow, BlockedInterval, OpenSlot, Reservation};

/// The next occurrence of an availability window, materialised to a
/// concrete date, with its remaining capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub window_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: u32,
    pub booked: u32,
}

impl Occurrence {
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }
}

/// Filter concrete slots down to what a student may actually book:
/// active, strictly in the future, and below capacity. A capacity of
/// zero (or a missing one, decoded as zero) always excludes the slot.
///
/// Output is ordered ascending by start time; the sort is stable, so
/// slots sharing a start time keep their arrival order.
pub fn filter_open_slots(slots: &[OpenSlot], now: DateTime<Utc>) -> Vec<OpenSlot> {
    let mut open: Vec<OpenSlot> = slots
        .iter()
        .filter(|s| s.active && s.start_time > now && s.reservations_count < s.capacity)
        .cloned()
        .collect();
    open.sort_by_key(|s| s.start_time);
    open
}

/// Derive the upcoming occurrence of every active window, dropping those
/// that intersect a blocked interval or are already at capacity.
///
/// The three inputs are fetched independently and may be momentarily
/// inconsistent with each other; a reservation pointing at a window we
/// did not fetch is simply not counted. Pure over its inputs: the same
/// collections always yield the same output.
pub fn derive_occurrences(
    windows: &[AvailabilityWindow],
    blocked: &[BlockedInterval],
    reservations: &[Reservation],
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<Occurrence> {
    let local_now = now.with_timezone(&tz);

    let mut out: Vec<Occurrence> = Vec::new();
    for w in windows {
        if !w.active || w.capacity == 0 {
            continue;
        }

        let date = upcoming_date(local_now.date_naive(), local_now.time(), w.day, w.start_time);

        if blocked
            .iter()
            .any(|b| b.date == date && overlaps(w.start_time, w.end_time, b.start_time, b.end_time))
        {
            continue;
        }

        // Skipped when the wall-clock start does not exist in the target
        // timezone on that date (DST gap).
        let Some(start) = tz.from_local_datetime(&date.and_time(w.start_time)).single() else {
            continue;
        };
        let Some(end) = tz.from_local_datetime(&date.and_time(w.end_time)).single() else {
            continue;
        };

        let booked = reservations
            .iter()
            .filter(|r| {
                r.slot_id() == Some(w.id)
                    && r.status.counts_against_capacity()
                    && r.start().map(|s| s.with_timezone(&tz).date_naive()) == Some(date)
            })
            .count() as u32;

        if booked >= w.capacity {
            continue;
        }

        out.push(Occurrence {
            window_id: w.id,
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
            location: w.location.clone(),
            capacity: w.capacity,
            booked,
        });
    }

    out.sort_by_key(|o| o.start);
    out
}

/// Returns the next occurrence of the given weekday strictly after `from`.
/// If `from` is already that weekday, it returns the *next* week's occurrence.
pub fn next_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_weekday = from.weekday().num_days_from_monday();
    let target_weekday = target.num_days_from_monday();
    let days_ahead = if target_weekday > from_weekday {
        target_weekday - from_weekday
    } else {
        7 - (from_weekday - target_weekday)
    };
    from + Duration::days(days_ahead as i64)
}

/// Date of the next occurrence whose start is strictly in the future:
/// today if the weekday matches and the start time has not passed yet,
/// otherwise next week's instance.
fn upcoming_date(today: NaiveDate, time_now: NaiveTime, day: Weekday, start: NaiveTime) -> NaiveDate {
    if today.weekday() == day && start > time_now {
        today
    } else {
        next_weekday(today, day)
    }
}

/// Half-open interval intersection: [a_start, a_end) ∩ [b_start, b_end) ≠ ∅.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReservationStatus;
    use chrono_tz::Europe::Warsaw;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(id: i64, day: Weekday, start: NaiveTime, end: NaiveTime, capacity: u32) -> AvailabilityWindow {
        AvailabilityWindow {
            id,
            day,
            start_time: start,
            end_time: end,
            capacity,
            location: None,
            active: true,
        }
    }

    fn slot(id: i64, start: DateTime<Utc>, capacity: u32, count: u32, active: bool) -> OpenSlot {
        OpenSlot {
            id,
            start_time: start,
            end_time: start + Duration::minutes(30),
            lecturer: None,
            subject: None,
            location: None,
            capacity,
            reservations_count: count,
            active,
        }
    }

    fn reservation(slot_id: i64, start: DateTime<Utc>, status: ReservationStatus) -> Reservation {
        serde_json::from_value::<Reservation>(serde_json::json!({
            "id": 1,
            "slot": {
                "id": slot_id,
                "start_time": start.to_rfc3339(),
                "end_time": (start + Duration::hours(1)).to_rfc3339(),
            },
            "status": status.as_str(),
        }))
        .unwrap()
    }

    // A Wednesday, 08:00 UTC (09:00 in Warsaw).
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 7, 8, 0, 0).unwrap()
    }

    #[test]
    fn inactive_slots_never_appear() {
        let slots = vec![slot(1, now() + Duration::hours(2), 5, 0, false)];
        assert!(filter_open_slots(&slots, now()).is_empty());
    }

    #[test]
    fn full_slots_are_excluded_and_boundary_included() {
        let slots = vec![
            slot(1, now() + Duration::hours(1), 3, 3, true),
            slot(2, now() + Duration::hours(2), 3, 2, true),
        ];
        let open = filter_open_slots(&slots, now());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, 2);
        assert_eq!(open[0].remaining(), 1);
    }

    #[test]
    fn zero_capacity_is_always_excluded() {
        let slots = vec![slot(1, now() + Duration::hours(1), 0, 0, true)];
        assert!(filter_open_slots(&slots, now()).is_empty());
    }

    #[test]
    fn past_slots_are_excluded() {
        let slots = vec![
            slot(1, now() - Duration::hours(1), 5, 0, true),
            slot(2, now(), 5, 0, true), // starting exactly now is not "in the future"
            slot(3, now() + Duration::minutes(1), 5, 0, true),
        ];
        let open = filter_open_slots(&slots, now());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, 3);
    }

    #[test]
    fn output_sorted_ascending_and_ties_both_present() {
        let start = now() + Duration::hours(3);
        let slots = vec![
            slot(10, start, 2, 0, true),
            slot(11, now() + Duration::hours(1), 2, 0, true),
            slot(12, start, 2, 0, true),
        ];
        let open = filter_open_slots(&slots, now());
        let ids: Vec<i64> = open.iter().map(|s| s.id).collect();
        // Stable sort keeps arrival order for the equal-start pair.
        assert_eq!(ids, vec![11, 10, 12]);
    }

    #[test]
    fn filter_is_idempotent() {
        let slots = vec![
            slot(1, now() + Duration::hours(5), 2, 1, true),
            slot(2, now() + Duration::hours(1), 4, 0, true),
            slot(3, now() - Duration::hours(1), 4, 0, true),
        ];
        let first = filter_open_slots(&slots, now());
        let second = filter_open_slots(&slots, now());
        assert_eq!(first.len(), second.len());
        assert!(first.iter().zip(&second).all(|(a, b)| a.id == b.id));
    }

    #[test]
    fn monday_window_fills_up_across_two_reservations() {
        // Monday 10:00-11:00 Warsaw time, capacity 2. Next Monday after
        // `now()` (Wed Jan 7) is Jan 12; 10:00 Warsaw is 09:00 UTC.
        let windows = vec![window(7, Weekday::Mon, t(10, 0), t(11, 0), 2)];
        let monday_start = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();

        let one = vec![reservation(7, monday_start, ReservationStatus::Accepted)];
        let occs = derive_occurrences(&windows, &[], &one, now(), Warsaw);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start, monday_start);
        assert_eq!(occs[0].remaining(), 1);

        let two = vec![
            reservation(7, monday_start, ReservationStatus::Accepted),
            reservation(7, monday_start, ReservationStatus::Accepted),
        ];
        let occs = derive_occurrences(&windows, &[], &two, now(), Warsaw);
        assert!(occs.is_empty());
    }

    #[test]
    fn cancelled_and_rejected_reservations_free_the_seat() {
        let windows = vec![window(7, Weekday::Mon, t(10, 0), t(11, 0), 1)];
        let monday_start = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
        let reservations = vec![
            reservation(7, monday_start, ReservationStatus::Cancelled),
            reservation(7, monday_start, ReservationStatus::Rejected),
        ];
        let occs = derive_occurrences(&windows, &[], &reservations, now(), Warsaw);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].booked, 0);
    }

    #[test]
    fn blocked_interval_removes_the_occurrence() {
        let windows = vec![window(7, Weekday::Mon, t(10, 0), t(11, 0), 2)];
        let blocked = vec![BlockedInterval {
            id: 1,
            date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            start_time: t(10, 30),
            end_time: t(12, 0),
            reason: Some("conference".into()),
        }];
        assert!(derive_occurrences(&windows, &blocked, &[], now(), Warsaw).is_empty());

        // Same times a week later do not block next Monday's occurrence.
        let other_week = vec![BlockedInterval {
            id: 2,
            date: NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
            start_time: t(10, 30),
            end_time: t(12, 0),
            reason: None,
        }];
        assert_eq!(derive_occurrences(&windows, &other_week, &[], now(), Warsaw).len(), 1);
    }

    #[test]
    fn adjacent_blocked_interval_does_not_block() {
        let windows = vec![window(7, Weekday::Mon, t(10, 0), t(11, 0), 2)];
        let blocked = vec![BlockedInterval {
            id: 1,
            date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            start_time: t(11, 0),
            end_time: t(12, 0),
            reason: None,
        }];
        assert_eq!(derive_occurrences(&windows, &blocked, &[], now(), Warsaw).len(), 1);
    }

    #[test]
    fn inactive_windows_are_never_derived() {
        let mut w = window(7, Weekday::Mon, t(10, 0), t(11, 0), 10);
        w.active = false;
        assert!(derive_occurrences(&[w], &[], &[], now(), Warsaw).is_empty());
    }

    #[test]
    fn same_day_window_later_today_uses_today() {
        // now() is Wednesday 09:00 Warsaw; a Wednesday 10:00 window still
        // falls on today, a Wednesday 08:00 one moves to next week.
        let later = window(1, Weekday::Wed, t(10, 0), t(11, 0), 1);
        let earlier = window(2, Weekday::Wed, t(8, 0), t(9, 0), 1);
        let occs = derive_occurrences(&[later, earlier], &[], &[], now(), Warsaw);
        assert_eq!(occs.len(), 2);
        assert_eq!(occs[0].window_id, 1);
        assert_eq!(occs[0].start.with_timezone(&Warsaw).date_naive(),
                   NaiveDate::from_ymd_opt(2026, 1, 7).unwrap());
        assert_eq!(occs[1].start.with_timezone(&Warsaw).date_naive(),
                   NaiveDate::from_ymd_opt(2026, 1, 14).unwrap());
    }

    #[test]
    fn derivation_is_sorted_by_start() {
        let windows = vec![
            window(1, Weekday::Fri, t(9, 0), t(10, 0), 1),
            window(2, Weekday::Thu, t(9, 0), t(10, 0), 1),
            window(3, Weekday::Thu, t(8, 0), t(9, 0), 1),
        ];
        let occs = derive_occurrences(&windows, &[], &[], now(), Warsaw);
        let ids: Vec<i64> = occs.iter().map(|o| o.window_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_next_weekday_same_day() {
        // If today is Wednesday, next Wednesday should be 7 days later
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let next = next_weekday(wed, Weekday::Wed);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn test_next_weekday_future_day() {
        let mon = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let next = next_weekday(mon, Weekday::Fri);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_next_weekday_past_day() {
        let fri = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let next = next_weekday(fri, Weekday::Mon);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps(t(10, 0), t(11, 0), t(10, 30), t(12, 0)));
        assert!(overlaps(t(10, 0), t(11, 0), t(9, 0), t(10, 1)));
        assert!(!overlaps(t(10, 0), t(11, 0), t(11, 0), t(12, 0)));
        assert!(!overlaps(t(10, 0), t(11, 0), t(9, 0), t(10, 0)));
    }
}
