//! Study milestones unlocked from the stats ledger.

use crate::ledger::StatsLedger;
use crate::streak;
use chrono::NaiveDate;

/// What an achievement counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Focus sessions completed over all recorded days.
    TotalPomodoros,
    /// The current streak of days with at least one session.
    Streak,
}

#[derive(Debug, PartialEq, Eq)]
pub struct AchievementDefinition {
    pub title: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub target: u64,
}

pub const ACHIEVEMENTS: &[AchievementDefinition] = &[
    AchievementDefinition {
        title: "Deep Work Master",
        description: "Complete 10 focus sessions",
        metric: Metric::TotalPomodoros,
        target: 10,
    },
    AchievementDefinition {
        title: "Consistently Focused",
        description: "Maintain a 7-day streak",
        metric: Metric::Streak,
        target: 7,
    },
];

/// One achievement with the user's current value for its metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub definition: &'static AchievementDefinition,
    pub current: u64,
}

impl Achievement {
    pub fn is_unlocked(&self) -> bool {
        self.current >= self.definition.target
    }

    /// Progress towards the target, capped at 100.
    pub fn progress_percent(&self) -> f64 {
        let ratio = self.current as f64 / self.definition.target.max(1) as f64;
        (ratio * 100.0).min(100.0)
    }
}

/// Evaluates every achievement against `ledger` as of `today`.
pub fn evaluate(ledger: &StatsLedger, today: NaiveDate) -> Vec<Achievement> {
    let total_pomodoros = ledger.totals().pomodoros;
    let streak = u64::from(streak::current_streak(ledger, today));

    ACHIEVEMENTS
        .iter()
        .map(|definition| Achievement {
            definition,
            current: match definition.metric {
                Metric::TotalPomodoros => total_pomodoros,
                Metric::Streak => streak,
            },
        })
        .collect()
}
