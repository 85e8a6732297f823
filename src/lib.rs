//! FocusFlow - a local-first Pomodoro timer.
//!
//! The [`engine::Engine`] owns the countdown and session accounting, the
//! [`ledger`] and [`streak`] modules derive daily statistics, and
//! [`timer::Timer`] drives the engine with a cancellable one-second tick.
//! Everything is persisted through the [`persistence::Store`] trait.

pub mod achievements;
pub mod audio;
pub mod backup;
pub mod clock;
pub mod engine;
pub mod event;
pub mod ledger;
pub mod models;
pub mod notes;
pub mod persistence;
pub mod streak;
pub mod tasks;
pub mod timer;

pub use engine::{Engine, TickOutcome};
pub use event::{CompletionEvent, EngineEvent, SessionSnapshot};
pub use models::{DailyStat, Mode, SessionState, Settings, SettingsPatch, Theme};
pub use persistence::{Database, Store};
pub use timer::{SharedEngine, Timer};
