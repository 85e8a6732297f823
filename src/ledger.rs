//! Per-day study time and completed-session counts.

use crate::models::DailyStat;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Totals over a range of days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsTotals {
    /// Focus seconds.
    pub study_time: u64,
    pub pomodoros: u64,
    /// Days in the range that have a record.
    pub active_days: u32,
}

/// Daily statistics keyed by local calendar date.
///
/// Stored as a JSON array of [`DailyStat`] sorted by date. Loading data that
/// repeats a date merges the duplicates so each date has one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DailyStat>", into = "Vec<DailyStat>")]
pub struct StatsLedger {
    days: BTreeMap<NaiveDate, DailyStat>,
}

impl StatsLedger {
    /// Adds one second of study time to `date`, creating its record if needed.
    pub fn record_second(&mut self, date: NaiveDate) -> &DailyStat {
        let stat = self.entry(date);
        stat.study_time = stat.study_time.saturating_add(1);
        stat
    }

    /// Counts one completed focus session on `date`, creating its record if needed.
    pub fn record_pomodoro(&mut self, date: NaiveDate) -> &DailyStat {
        let stat = self.entry(date);
        stat.pomodoros = stat.pomodoros.saturating_add(1);
        stat
    }

    fn entry(&mut self, date: NaiveDate) -> &mut DailyStat {
        self.days
            .entry(date)
            .or_insert_with(|| DailyStat::new(date))
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyStat> {
        self.days.get(&date)
    }

    /// Pomodoros completed on `date`, zero when there is no record.
    pub fn pomodoros_on(&self, date: NaiveDate) -> u32 {
        self.get(date).map_or(0, |stat| stat.pomodoros)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// All records in date order.
    pub fn records(&self) -> impl Iterator<Item = &DailyStat> {
        self.days.values()
    }

    /// Sums every record whose date lies in `range`.
    pub fn aggregate(&self, range: RangeInclusive<NaiveDate>) -> StatsTotals {
        if range.start() > range.end() {
            return StatsTotals::default();
        }
        sum(self.days.range(range).map(|(_, stat)| stat))
    }

    /// Sums every record.
    pub fn totals(&self) -> StatsTotals {
        sum(self.days.values())
    }

    /// One entry per day for the `n` days ending on `today`, oldest first.
    /// Days without a record are reported as zero.
    pub fn last_days(&self, today: NaiveDate, n: u32) -> Vec<DailyStat> {
        (0..n)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
            .map(|date| self.get(date).copied().unwrap_or_else(|| DailyStat::new(date)))
            .collect()
    }

    /// Mean study seconds over the days that have a record.
    pub fn average_study_time(&self) -> f64 {
        let totals = self.totals();
        totals.study_time as f64 / self.days.len().max(1) as f64
    }
}

fn sum<'a>(stats: impl Iterator<Item = &'a DailyStat>) -> StatsTotals {
    stats.fold(StatsTotals::default(), |mut acc, stat| {
        acc.study_time += u64::from(stat.study_time);
        acc.pomodoros += u64::from(stat.pomodoros);
        acc.active_days += 1;
        acc
    })
}

impl From<Vec<DailyStat>> for StatsLedger {
    fn from(records: Vec<DailyStat>) -> Self {
        let mut ledger = Self::default();
        for record in records {
            let stat = ledger.entry(record.date);
            stat.study_time = stat.study_time.saturating_add(record.study_time);
            stat.pomodoros = stat.pomodoros.saturating_add(record.pomodoros);
        }
        ledger
    }
}

impl From<StatsLedger> for Vec<DailyStat> {
    fn from(ledger: StatsLedger) -> Self {
        ledger.days.into_values().collect()
    }
}
