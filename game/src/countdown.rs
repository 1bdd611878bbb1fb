//! Fold countdown arithmetic.
//!
//! The backend folds a seat automatically once its fold deadline passes.
//! The time left is shown as a bar that starts full when the seat's turn
//! begins and empties at the deadline.

use chrono::{DateTime, Duration, Utc};

/// Seconds a seat has to act before the backend folds it.
pub const AUTO_FOLD_DELAY_SECS: i64 = 25;

/// Percentage of the countdown still left at `now`.
///
/// 100 when `now` is a whole `delay` before `deadline`, 0 at the deadline.
/// The value is not clamped: it goes negative once the deadline has passed,
/// and exceeds 100 if the deadline is further out than `delay`.
pub fn fold_progress(deadline: DateTime<Utc>, now: DateTime<Utc>, delay: Duration) -> f64 {
    let total = delay.num_milliseconds();
    if total == 0 {
        return 0.0;
    }
    let left = (deadline - now).num_milliseconds();
    left as f64 * 100.0 / total as f64
}

/// `progress` bounded to what a bar can show.
pub fn bar_fill(progress: f64) -> f64 {
    progress.clamp(0.0, 100.0)
}
