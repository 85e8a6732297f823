//! Date sources for day-keying statistics.

use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex, PoisonError};

/// Supplies the current local calendar date.
pub trait Clock: Send {
    fn today(&self) -> NaiveDate;
}

/// Reads the system clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to. Clones share the same date.
#[derive(Debug, Clone)]
pub struct ManualClock {
    date: Arc<Mutex<NaiveDate>>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Arc::new(Mutex::new(date)),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap_or_else(PoisonError::into_inner) = date;
    }

    /// Moves the date forward by one day.
    pub fn advance_day(&self) {
        let mut date = self.date.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = date.succ_opt() {
            *date = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
