use chrono::NaiveDate;

/// Weekly periods are anchored on the goal's start date, not the calendar
/// week. A start date in the future counts as period 0.
pub fn period_index(start_date: NaiveDate, today: NaiveDate) -> i32 {
    let days = (today - start_date).num_days();
    if days < 0 {
        0
    } else {
        (days / 7) as i32
    }
}

/// Lazy rollover: a counter written in an earlier period reads as zero.
pub fn settled_completions(stored_period: i32, stored_completions: i32, current_period: i32) -> i32 {
    if stored_period == current_period {
        stored_completions
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn periods_are_anchored_on_start_date() {
        let start = date(2025, 1, 6); // a Monday
        assert_eq!(period_index(start, date(2025, 1, 6)), 0);
        assert_eq!(period_index(start, date(2025, 1, 12)), 0);
        assert_eq!(period_index(start, date(2025, 1, 13)), 1);
        assert_eq!(period_index(start, date(2025, 2, 3)), 4);
    }

    #[test]
    fn future_start_date_clamps_to_zero() {
        assert_eq!(period_index(date(2025, 6, 1), date(2025, 5, 20)), 0);
    }

    #[test]
    fn stale_counter_reads_as_zero() {
        assert_eq!(settled_completions(3, 5, 3), 5);
        assert_eq!(settled_completions(3, 5, 4), 0);
        assert_eq!(settled_completions(3, 5, 10), 0);
    }
}
