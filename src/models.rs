//! Data models for the FocusFlow engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Focus sessions per day the user aims for when no goal has been set.
pub const DEFAULT_DAILY_GOAL: u32 = 4;

/// Which countdown is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Focus => "Focus Session",
            Self::ShortBreak => "Short Break",
            Self::LongBreak => "Long Break",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Orange,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be greater than zero seconds")]
    NonPositiveDuration { field: &'static str },
    #[error("sessions until long break must be at least 1, got {0}")]
    InvalidCadence(u32),
    #[error("volume must be between 0 and 1, got {0}")]
    VolumeOutOfRange(f32),
    #[error("daily goal must be at least 1, got {0}")]
    InvalidDailyGoal(u32),
}

/// User-configurable settings. All durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub focus_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    /// Number of focus sessions between long breaks.
    pub sessions_until_long_break: u32,
    /// Cue volume in `[0, 1]`.
    pub volume: f32,
    pub sound_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            focus_duration: 25 * 60,
            short_break_duration: 5 * 60,
            long_break_duration: 15 * 60,
            sessions_until_long_break: 4,
            volume: 0.5,
            sound_enabled: true,
        }
    }
}

impl Settings {
    /// Returns the configured countdown length for `mode`.
    pub fn duration_for(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Focus => self.focus_duration,
            Mode::ShortBreak => self.short_break_duration,
            Mode::LongBreak => self.long_break_duration,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let durations = [
            ("focus duration", self.focus_duration),
            ("short break duration", self.short_break_duration),
            ("long break duration", self.long_break_duration),
        ];
        for (field, secs) in durations {
            if secs == 0 {
                return Err(SettingsError::NonPositiveDuration { field });
            }
        }
        if self.sessions_until_long_break == 0 {
            return Err(SettingsError::InvalidCadence(self.sessions_until_long_break));
        }
        // NaN fails the range check too.
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(SettingsError::VolumeOutOfRange(self.volume));
        }
        Ok(())
    }

    /// Returns a copy with `patch` applied, or the first validation error.
    /// `self` is never modified.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        let next = Settings {
            theme: patch.theme.unwrap_or(self.theme),
            focus_duration: patch.focus_duration.unwrap_or(self.focus_duration),
            short_break_duration: patch
                .short_break_duration
                .unwrap_or(self.short_break_duration),
            long_break_duration: patch
                .long_break_duration
                .unwrap_or(self.long_break_duration),
            sessions_until_long_break: patch
                .sessions_until_long_break
                .unwrap_or(self.sessions_until_long_break),
            volume: patch.volume.unwrap_or(self.volume),
            sound_enabled: patch.sound_enabled.unwrap_or(self.sound_enabled),
        };
        next.validate()?;
        Ok(next)
    }
}

/// Partial settings update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub focus_duration: Option<u32>,
    pub short_break_duration: Option<u32>,
    pub long_break_duration: Option<u32>,
    pub sessions_until_long_break: Option<u32>,
    pub volume: Option<f32>,
    pub sound_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Live countdown state. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mode: Mode,
    /// Seconds remaining, always within `[0, duration_for(mode)]`.
    pub time_left: u32,
    pub is_running: bool,
}

impl SessionState {
    /// A paused countdown at the start of `mode`.
    pub fn fresh(mode: Mode, settings: &Settings) -> Self {
        Self {
            mode,
            time_left: settings.duration_for(mode),
            is_running: false,
        }
    }

    /// Returns the progress (0.0 to 1.0) through a countdown of `total_secs`.
    pub fn progress_percent(&self, total_secs: u32) -> f32 {
        if total_secs == 0 {
            return 1.0;
        }
        1.0 - (self.time_left as f32 / total_secs as f32)
    }
}

/// Study totals for one calendar day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    /// Focus seconds logged on this date.
    pub study_time: u32,
    /// Focus sessions completed on this date.
    pub pomodoros: u32,
}

impl DailyStat {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            study_time: 0,
            pomodoros: 0,
        }
    }
}
