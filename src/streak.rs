use chrono::NaiveDate;

use crate::models::StreakRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AlreadyDone,
    Advance(StreakRecord),
}

/// Decides what marking a habit done on `today` does to `record`.
///
/// Total over every input: a last completion in the future (clock or offset
/// anomaly) is treated like any other gap and restarts the streak.
pub fn evaluate(today: NaiveDate, record: &StreakRecord) -> Decision {
    let current_streak = match record.last_completed_date {
        Some(last) if last == today => return Decision::AlreadyDone,
        Some(last) if gap_days(last, today) == 1 => record.current_streak.saturating_add(1),
        _ => 1,
    };

    Decision::Advance(StreakRecord {
        current_streak,
        longest_streak: current_streak.max(record.longest_streak),
        last_completed_date: Some(today),
    })
}

/// Whole calendar days from `from` to `to`; negative when `to` is earlier.
pub fn gap_days(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> StreakRecord {
        StreakRecord {
            current_streak: 5,
            longest_streak: 7,
            last_completed_date: Some(day(2024, 3, 10)),
        }
    }

    #[test]
    fn consecutive_day_extends_streak() {
        assert_eq!(
            evaluate(day(2024, 3, 11), &sample()),
            Decision::Advance(StreakRecord {
                current_streak: 6,
                longest_streak: 7,
                last_completed_date: Some(day(2024, 3, 11)),
            })
        );
    }

    #[test]
    fn gap_restarts_at_one_and_keeps_longest() {
        assert_eq!(
            evaluate(day(2024, 3, 13), &sample()),
            Decision::Advance(StreakRecord {
                current_streak: 1,
                longest_streak: 7,
                last_completed_date: Some(day(2024, 3, 13)),
            })
        );
    }

    #[test]
    fn same_day_is_already_done() {
        assert_eq!(evaluate(day(2024, 3, 10), &sample()), Decision::AlreadyDone);
    }

    #[test]
    fn first_completion_starts_at_one() {
        assert_eq!(
            evaluate(day(2024, 1, 1), &StreakRecord::zero()),
            Decision::Advance(StreakRecord {
                current_streak: 1,
                longest_streak: 1,
                last_completed_date: Some(day(2024, 1, 1)),
            })
        );
    }

    #[test]
    fn future_last_completion_resets_instead_of_failing() {
        let decision = evaluate(day(2024, 3, 8), &sample());
        assert_eq!(
            decision,
            Decision::Advance(StreakRecord {
                current_streak: 1,
                longest_streak: 7,
                last_completed_date: Some(day(2024, 3, 8)),
            })
        );
    }

    #[test]
    fn crossing_month_and_leap_day_counts_as_consecutive() {
        let record = StreakRecord {
            current_streak: 2,
            longest_streak: 2,
            last_completed_date: Some(day(2024, 2, 29)),
        };
        match evaluate(day(2024, 3, 1), &record) {
            Decision::Advance(next) => {
                assert_eq!(next.current_streak, 3);
                assert_eq!(next.longest_streak, 3);
            }
            Decision::AlreadyDone => panic!("expected advance"),
        }
    }

    #[test]
    fn longest_never_drops_below_current_across_a_run() {
        let start = day(2024, 1, 1);
        let offsets = [0, 1, 2, 2, 5, 6, 7, 8, 20, 21, 21, 22];
        let mut record = StreakRecord::zero();
        let mut previous_longest = 0;

        for offset in offsets {
            if let Decision::Advance(next) = evaluate(start + Duration::days(offset), &record) {
                record = next;
            }
            assert!(record.longest_streak >= record.current_streak);
            assert!(record.longest_streak >= previous_longest);
            previous_longest = record.longest_streak;
        }

        assert_eq!(record.current_streak, 3);
        assert_eq!(record.longest_streak, 4);
    }
}
