//! Consecutive-day streak over the stats ledger.

use crate::ledger::StatsLedger;
use chrono::NaiveDate;

/// Number of consecutive days, ending today or yesterday, with at least one
/// completed focus session.
///
/// Anchors on `today` when it already has a session, otherwise on yesterday,
/// so a streak survives until a whole day is skipped.
pub fn current_streak(ledger: &StatsLedger, today: NaiveDate) -> u32 {
    let qualifies = |date: NaiveDate| ledger.pomodoros_on(date) > 0;

    let anchor = if qualifies(today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if qualifies(yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(date) = cursor.filter(|&d| qualifies(d)) {
        streak += 1;
        cursor = date.pred_opt();
    }
    streak
}
