//! Consecutive-day study streaks
//!
//! Both the profile store and the legacy ledger use the same rule: days are
//! compared as calendar dates, not 24 hour windows.

use chrono::NaiveDate;

/// Result of recording a study session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    /// Streak after the session
    pub streak: u32,
    /// Whether the last study date should be restamped
    pub restamp: bool,
}

/// Apply a study session on `today` to a streak last advanced on `last`
///
/// - same day: unchanged
/// - the day before: +1
/// - anything else, including no previous study: reset to 1
pub fn advance_streak(current: u32, last: Option<NaiveDate>, today: NaiveDate) -> StreakUpdate {
    match last {
        Some(day) if day == today => StreakUpdate { streak: current, restamp: false },
        Some(day) if day.succ_opt() == Some(today) => {
            StreakUpdate { streak: current.saturating_add(1), restamp: true }
        }
        _ => StreakUpdate { streak: 1, restamp: true },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_study_starts_at_one() {
        let update = advance_streak(0, None, day(2024, 3, 1));
        assert_eq!(update, StreakUpdate { streak: 1, restamp: true });
    }

    #[test]
    fn same_day_is_unchanged() {
        let update = advance_streak(4, Some(day(2024, 3, 1)), day(2024, 3, 1));
        assert_eq!(update, StreakUpdate { streak: 4, restamp: false });
    }

    #[test]
    fn next_day_increments() {
        let update = advance_streak(4, Some(day(2024, 2, 29)), day(2024, 3, 1));
        assert_eq!(update.streak, 5);
        assert!(update.restamp);
    }

    #[test]
    fn gap_resets() {
        let update = advance_streak(9, Some(day(2024, 2, 28)), day(2024, 3, 1));
        assert_eq!(update.streak, 1);
    }

    #[test]
    fn date_in_future_resets() {
        // clock moved backwards
        let update = advance_streak(3, Some(day(2024, 3, 5)), day(2024, 3, 1));
        assert_eq!(update.streak, 1);
    }
}
