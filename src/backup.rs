//! JSON export of everything the app has persisted.

use crate::ledger::StatsLedger;
use crate::models::Settings;
use crate::notes::Notebook;
use crate::persistence::{self, keys, Store};
use crate::tasks::Planner;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub settings: Settings,
    pub daily_goal: u32,
    pub stats: StatsLedger,
    pub notes: Notebook,
    pub tasks: Planner,
}

impl Backup {
    /// Reads the current contents of `store`, substituting defaults for
    /// anything missing, malformed or invalid, the same way the engine does
    /// on startup.
    pub fn collect(store: &dyn Store) -> Self {
        Self {
            settings: persistence::load_settings(store),
            daily_goal: persistence::load_daily_goal(store),
            stats: persistence::load_or(store, keys::STATS, StatsLedger::default),
            notes: Notebook::load(store),
            tasks: Planner::load(store),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Conventional file name for a backup taken on `date`.
pub fn file_name(date: NaiveDate) -> String {
    format!("focusflow-backup-{}.json", date.format("%Y-%m-%d"))
}
