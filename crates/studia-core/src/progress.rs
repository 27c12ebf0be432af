//! Pure progress arithmetic: streak computation and running means.
//!
//! Kept database-free so the rules are unit-testable and shared between
//! the repository layer and the dashboard handlers.

use chrono::NaiveDate;

/// Compute the study streak from activity dates.
///
/// `dates` must be distinct calendar dates sorted descending. The streak is
/// the run of consecutive days ending today, or ending yesterday when the
/// user has no activity yet today (an open day does not break the streak).
pub fn compute_streak(dates: &[NaiveDate], today: NaiveDate) -> i32 {
    let mut expected = today;
    let mut streak = 0;

    for (i, &date) in dates.iter().enumerate() {
        if i == 0 && date != today {
            // No activity today yet; a streak may still end yesterday.
            let yesterday = today.pred_opt().expect("date underflow");
            if date != yesterday {
                return 0;
            }
            expected = yesterday;
        }
        if date == expected {
            streak += 1;
            expected = expected.pred_opt().expect("date underflow");
        } else {
            break;
        }
    }

    streak
}

/// Fold one new sample into a running mean over `count` prior samples.
///
/// Returns the new mean. With `prior_mean = None` the sample becomes the
/// mean regardless of `count`.
pub fn update_running_mean(prior_mean: Option<f64>, count: i64, sample: f64) -> f64 {
    match prior_mean {
        Some(mean) if count > 0 => mean + (sample - mean) / (count as f64 + 1.0),
        _ => sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_streak_empty() {
        assert_eq!(compute_streak(&[], d("2026-08-25")), 0);
    }

    #[test]
    fn test_streak_today_only() {
        assert_eq!(compute_streak(&[d("2026-08-25")], d("2026-08-25")), 1);
    }

    #[test]
    fn test_streak_consecutive_run() {
        let dates = [d("2026-08-25"), d("2026-08-24"), d("2026-08-23")];
        assert_eq!(compute_streak(&dates, d("2026-08-25")), 3);
    }

    #[test]
    fn test_streak_survives_open_day() {
        // No activity yet today; streak ended yesterday still counts.
        let dates = [d("2026-08-24"), d("2026-08-23")];
        assert_eq!(compute_streak(&dates, d("2026-08-25")), 2);
    }

    #[test]
    fn test_streak_broken_by_gap() {
        let dates = [d("2026-08-25"), d("2026-08-23")];
        assert_eq!(compute_streak(&dates, d("2026-08-25")), 1);
    }

    #[test]
    fn test_streak_stale_activity() {
        let dates = [d("2026-08-20"), d("2026-08-19")];
        assert_eq!(compute_streak(&dates, d("2026-08-25")), 0);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let dates = [d("2026-08-01"), d("2026-07-31"), d("2026-07-30")];
        assert_eq!(compute_streak(&dates, d("2026-08-01")), 3);
    }

    #[test]
    fn test_running_mean_first_sample() {
        assert_eq!(update_running_mean(None, 0, 1200.0), 1200.0);
    }

    #[test]
    fn test_running_mean_accumulates() {
        let m1 = update_running_mean(None, 0, 1000.0);
        let m2 = update_running_mean(Some(m1), 1, 2000.0);
        assert!((m2 - 1500.0).abs() < f64::EPSILON);
        let m3 = update_running_mean(Some(m2), 2, 3000.0);
        assert!((m3 - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_running_mean_zero_count_with_prior() {
        // Defensive: a prior mean with zero count is replaced by the sample.
        assert_eq!(update_running_mean(Some(5.0), 0, 10.0), 10.0);
    }
}
