//! Occurrence date arithmetic for recurring transactions.
//!
//! Weekdays use 0 = Sunday .. 6 = Saturday. A day-of-month that does not
//! exist in the target month (the 31st in April, the 29th of February in a
//! common year) lands on that month's last day. Stepping past
//! [`NaiveDate::MAX`] saturates there.

use chrono::{Datelike, Days, Local, Months, NaiveDate};

use crate::models::Frequency;

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in the month `date` falls in.
fn days_in_month(date: NaiveDate) -> u32 {
    match date.month() {
        2 if is_leap_year(date.year()) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// `date` with its day replaced by `day`, clamped into the month.
fn with_day_clamped(
    date: NaiveDate,
    day: u32,
) -> NaiveDate {
    let day = day.clamp(1, days_in_month(date));
    let current = date.day();
    // Both days lie in the same month, so neither step leaves the calendar.
    if day >= current {
        plus_days(date, u64::from(day - current))
    } else {
        date - Days::new(u64::from(current - day))
    }
}

/// `anchor`'s month and day in `year`, clamped into the month; `None` when
/// `year` is out of range.
fn in_year(
    year: i32,
    anchor: NaiveDate,
) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, anchor.month(), 1)?;
    Some(with_day_clamped(first, anchor.day()))
}

fn plus_days(
    date: NaiveDate,
    days: u64,
) -> NaiveDate {
    date.checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX)
}

fn plus_months(
    date: NaiveDate,
    months: u32,
) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Weekday index with Sunday as 0.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Today's date on the local clock.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// First occurrence of a newly created rule.
///
/// A start date of today or later is used as is. A start date in the past is
/// moved forward to the first matching date on or after `today`:
///
/// * `Daily`: today.
/// * `Weekly`: the next `day_of_week` (default: the start date's weekday),
///   today included.
/// * `Monthly`: `day_of_month` (default 1) of this month, or of next month
///   when that has already passed.
/// * `Yearly`: the start date's month and day this year, or next year when
///   that has already passed.
pub fn initial_next_occurrence(
    frequency: Frequency,
    start_date: NaiveDate,
    day_of_month: Option<u32>,
    day_of_week: Option<u32>,
    today: NaiveDate,
) -> NaiveDate {
    if start_date >= today {
        return start_date;
    }

    match frequency {
        Frequency::Daily => today,
        Frequency::Weekly => {
            let target = day_of_week.unwrap_or_else(|| weekday_index(start_date)) % 7;
            let days_until = (target + 7 - weekday_index(today)) % 7;
            plus_days(today, u64::from(days_until))
        }
        Frequency::Monthly => {
            let day = day_of_month.unwrap_or(1);
            let this_month = with_day_clamped(today, day);
            if this_month < today {
                let first_of_month = with_day_clamped(today, 1);
                with_day_clamped(plus_months(first_of_month, 1), day)
            } else {
                this_month
            }
        }
        Frequency::Yearly => {
            match in_year(today.year(), start_date) {
                Some(this_year) if this_year >= today => this_year,
                _ => in_year(today.year() + 1, start_date).unwrap_or(NaiveDate::MAX),
            }
        }
    }
}

/// [`initial_next_occurrence`] evaluated against the local clock.
pub fn initial_next_occurrence_from_today(
    frequency: Frequency,
    start_date: NaiveDate,
    day_of_month: Option<u32>,
    day_of_week: Option<u32>,
) -> NaiveDate {
    initial_next_occurrence(frequency, start_date, day_of_month, day_of_week, local_today())
}

/// The occurrence following `fired`.
///
/// Steps exactly one period from the date that fired and never looks at the
/// current date, so a rule that has missed several periods catches up one
/// period per firing. Monthly rules with a `day_of_month` anchor are pinned
/// back to that day after stepping. Without an anchor a clamped day sticks:
/// Jan 31 steps to Feb 28 and then to Mar 28.
pub fn next_after_firing(
    frequency: Frequency,
    fired: NaiveDate,
    day_of_month: Option<u32>,
) -> NaiveDate {
    match frequency {
        Frequency::Daily => plus_days(fired, 1),
        Frequency::Weekly => plus_days(fired, 7),
        Frequency::Monthly => {
            let stepped = plus_months(fired, 1);
            match day_of_month {
                Some(day) => with_day_clamped(stepped, day),
                None => stepped,
            }
        }
        Frequency::Yearly => plus_months(fired, 12),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("valid test date")
    }

    // =========================================================================
    // initial_next_occurrence tests
    // =========================================================================

    #[test]
    fn future_start_is_kept_for_every_frequency() {
        let today = date("2025-03-20");
        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ] {
            let next = initial_next_occurrence(frequency, date("2025-04-02"), Some(15), Some(1), today);
            assert_eq!(next, date("2025-04-02"), "{frequency:?}");
        }
    }

    #[test]
    fn start_today_is_kept() {
        let today = date("2025-03-20");

        let next = initial_next_occurrence(Frequency::Monthly, today, Some(1), None, today);

        assert_eq!(next, today);
    }

    #[test]
    fn daily_past_start_fires_today() {
        let next = initial_next_occurrence(
            Frequency::Daily,
            date("2024-01-01"),
            None,
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-03-20"));
    }

    #[test]
    fn weekly_moves_to_next_anchor_weekday() {
        // 2025-03-20 is a Thursday; 1 = Monday.
        let next = initial_next_occurrence(
            Frequency::Weekly,
            date("2025-01-01"),
            None,
            Some(1),
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-03-24"));
    }

    #[test]
    fn weekly_matching_today_fires_today() {
        let next = initial_next_occurrence(
            Frequency::Weekly,
            date("2025-01-01"),
            None,
            Some(4),
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-03-20"));
    }

    #[test]
    fn weekly_defaults_to_start_weekday() {
        // 2025-01-05 is a Sunday.
        let next = initial_next_occurrence(
            Frequency::Weekly,
            date("2025-01-05"),
            None,
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-03-23"));
        assert_eq!(weekday_index(next), 0);
    }

    #[test]
    fn monthly_anchor_already_passed_moves_to_next_month() {
        let next = initial_next_occurrence(
            Frequency::Monthly,
            date("2025-01-15"),
            Some(15),
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-04-15"));
    }

    #[test]
    fn monthly_anchor_later_this_month() {
        let next = initial_next_occurrence(
            Frequency::Monthly,
            date("2025-01-25"),
            Some(25),
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-03-25"));
    }

    #[test]
    fn monthly_defaults_to_first_of_month() {
        let next = initial_next_occurrence(
            Frequency::Monthly,
            date("2025-01-10"),
            None,
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-04-01"));
    }

    #[test]
    fn monthly_anchor_past_month_end_clamps() {
        let next = initial_next_occurrence(
            Frequency::Monthly,
            date("2024-10-31"),
            Some(31),
            None,
            date("2025-02-10"),
        );

        assert_eq!(next, date("2025-02-28"));
    }

    #[test]
    fn monthly_rollover_in_december_reaches_january() {
        let next = initial_next_occurrence(
            Frequency::Monthly,
            date("2025-01-05"),
            Some(5),
            None,
            date("2025-12-20"),
        );

        assert_eq!(next, date("2026-01-05"));
    }

    #[test]
    fn yearly_anniversary_still_ahead_this_year() {
        let next = initial_next_occurrence(
            Frequency::Yearly,
            date("2022-11-01"),
            None,
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2025-11-01"));
    }

    #[test]
    fn yearly_anniversary_passed_moves_to_next_year() {
        let next = initial_next_occurrence(
            Frequency::Yearly,
            date("2022-02-14"),
            None,
            None,
            date("2025-03-20"),
        );

        assert_eq!(next, date("2026-02-14"));
    }

    #[test]
    fn yearly_leap_day_clamps_in_common_year() {
        let next = initial_next_occurrence(
            Frequency::Yearly,
            date("2024-02-29"),
            None,
            None,
            date("2025-01-10"),
        );

        assert_eq!(next, date("2025-02-28"));
    }

    // =========================================================================
    // next_after_firing tests
    // =========================================================================

    #[test]
    fn daily_and_weekly_step_by_days() {
        assert_eq!(
            next_after_firing(Frequency::Daily, date("2025-12-31"), None),
            date("2026-01-01")
        );
        assert_eq!(
            next_after_firing(Frequency::Weekly, date("2025-02-25"), None),
            date("2025-03-04")
        );
    }

    #[test]
    fn monthly_steps_one_calendar_month() {
        assert_eq!(
            next_after_firing(Frequency::Monthly, date("2025-01-15"), Some(15)),
            date("2025-02-15")
        );
    }

    #[test]
    fn monthly_anchor_survives_short_month() {
        let feb = next_after_firing(Frequency::Monthly, date("2025-01-31"), Some(31));
        assert_eq!(feb, date("2025-02-28"));

        let mar = next_after_firing(Frequency::Monthly, feb, Some(31));
        assert_eq!(mar, date("2025-03-31"));
    }

    #[test]
    fn monthly_without_anchor_keeps_clamped_day() {
        let feb = next_after_firing(Frequency::Monthly, date("2025-01-31"), None);
        assert_eq!(feb, date("2025-02-28"));

        let mar = next_after_firing(Frequency::Monthly, feb, None);
        assert_eq!(mar, date("2025-03-28"));
    }

    #[test]
    fn yearly_steps_one_year() {
        assert_eq!(
            next_after_firing(Frequency::Yearly, date("2025-06-01"), None),
            date("2026-06-01")
        );
        assert_eq!(
            next_after_firing(Frequency::Yearly, date("2024-02-29"), None),
            date("2025-02-28")
        );
    }

    #[test]
    fn firing_never_moves_backwards() {
        let mut current = date("2025-01-31");
        for _ in 0..24 {
            let next = next_after_firing(Frequency::Monthly, current, Some(31));
            assert!(next > current);
            current = next;
        }
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(date("2024-02-10")), 29);
        assert_eq!(days_in_month(date("2025-02-10")), 28);
        assert_eq!(days_in_month(date("2000-02-01")), 29);
        assert_eq!(days_in_month(date("2100-02-01")), 28);
        assert_eq!(days_in_month(date("2025-04-30")), 30);
        assert_eq!(days_in_month(date("2025-12-01")), 31);
    }

    #[test]
    fn clamping_moves_within_the_month() {
        assert_eq!(with_day_clamped(date("2025-04-20"), 31), date("2025-04-30"));
        assert_eq!(with_day_clamped(date("2025-04-20"), 3), date("2025-04-03"));
        assert_eq!(with_day_clamped(date("2025-04-20"), 0), date("2025-04-01"));
    }

    #[test]
    fn stepping_past_the_last_date_saturates() {
        assert_eq!(next_after_firing(Frequency::Daily, NaiveDate::MAX, None), NaiveDate::MAX);
        assert_eq!(
            initial_next_occurrence(Frequency::Yearly, date("2024-01-01"), None, None, NaiveDate::MAX),
            NaiveDate::MAX
        );
    }
}
