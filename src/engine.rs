//! The timer/session engine.
//!
//! Owns the countdown, drives focus → break → focus transitions, and keeps
//! the session counter and daily statistics in the store up to date.
//!
//! The engine has no thread of its own. Something must call [`Engine::tick`]
//! once per second while it is running; [`crate::timer::Timer`] does that
//! with a cancellable background task.
//!
//! ```text
//! Focus ──complete──> ShortBreak | LongBreak ──complete──> Focus
//! ```

use crate::achievements::{self, Achievement};
use crate::audio::CuePlayer;
use crate::clock::Clock;
use crate::event::{CompletionEvent, EngineEvent, EventBus, SessionSnapshot};
use crate::ledger::StatsLedger;
use crate::models::{
    DailyStat, Mode, SessionState, Settings, SettingsError, SettingsPatch, DEFAULT_DAILY_GOAL,
};
use crate::persistence::{self, keys, Store};
use crate::streak;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a single heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer was not counting down; nothing changed.
    Idle,
    /// The tick belonged to an earlier run of the countdown and was ignored.
    Stale,
    Ticked { time_left: u32 },
    Completed(CompletionEvent),
}

impl TickOutcome {
    /// True when another tick should follow.
    pub fn keeps_running(&self) -> bool {
        matches!(self, Self::Ticked { .. })
    }
}

/// Today's completed sessions against the daily goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalProgress {
    pub completed: u32,
    pub goal: u32,
}

impl GoalProgress {
    pub fn is_met(&self) -> bool {
        self.completed >= self.goal
    }
}

pub struct Engine {
    state: SessionState,
    settings: Settings,
    sessions_completed: u32,
    daily_goal: u32,
    ledger: StatsLedger,
    /// Changes whenever a countdown starts or stops.
    epoch: u64,
    store: Arc<dyn Store>,
    clock: Box<dyn Clock>,
    cue: Box<dyn CuePlayer>,
    events: EventBus,
}

impl Engine {
    /// Loads persisted settings, counters and stats from `store`.
    ///
    /// Missing or malformed values fall back to their defaults. The countdown
    /// itself always starts paused at the beginning of a focus session.
    pub fn new(store: Arc<dyn Store>, clock: Box<dyn Clock>, cue: Box<dyn CuePlayer>) -> Self {
        let settings = persistence::load_settings(&*store);
        let sessions_completed = persistence::load_or(&*store, keys::SESSIONS_COMPLETED, || 0);
        let daily_goal = persistence::load_daily_goal(&*store);
        let ledger = persistence::load_or(&*store, keys::STATS, StatsLedger::default);

        Self {
            state: SessionState::fresh(Mode::Focus, &settings),
            settings,
            sessions_completed,
            daily_goal,
            ledger,
            epoch: 0,
            store,
            clock,
            cue,
            events: EventBus::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            total_secs: self.settings.duration_for(self.state.mode),
            sessions_completed: self.sessions_completed,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions_completed(&self) -> u32 {
        self.sessions_completed
    }

    pub fn daily_goal(&self) -> u32 {
        self.daily_goal
    }

    pub fn ledger(&self) -> &StatsLedger {
        &self.ledger
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Today's record, or an empty one if nothing was logged yet.
    pub fn today_stat(&self) -> DailyStat {
        let today = self.today();
        self.ledger
            .get(today)
            .copied()
            .unwrap_or_else(|| DailyStat::new(today))
    }

    pub fn streak(&self) -> u32 {
        streak::current_streak(&self.ledger, self.today())
    }

    pub fn goal_progress(&self) -> GoalProgress {
        GoalProgress {
            completed: self.today_stat().pomodoros,
            goal: self.daily_goal,
        }
    }

    pub fn achievements(&self) -> Vec<Achievement> {
        achievements::evaluate(&self.ledger, self.today())
    }

    /// Registers a new observer of engine events.
    ///
    /// Each subscriber gets an unbounded channel and receives one event per
    /// tick while the countdown runs. Drop the receiver when it is no longer
    /// read; the engine only prunes subscribers whose receiver is gone.
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Starts the countdown. Returns false if it was already running or has
    /// nothing left to count.
    pub fn start(&mut self) -> bool {
        if self.state.is_running || self.state.time_left == 0 {
            return false;
        }
        self.state.is_running = true;
        self.epoch = self.epoch.wrapping_add(1);
        debug!(mode = ?self.state.mode, time_left = self.state.time_left, "timer started");
        self.publish_state();
        true
    }

    /// Pauses the countdown. Returns false if it was not running.
    pub fn pause(&mut self) -> bool {
        if !self.state.is_running {
            return false;
        }
        self.stop();
        debug!(time_left = self.state.time_left, "timer paused");
        self.publish_state();
        true
    }

    /// Starts when paused, pauses when running. Returns the new running state.
    pub fn toggle(&mut self) -> bool {
        if self.state.is_running {
            self.pause();
        } else {
            self.start();
        }
        self.state.is_running
    }

    /// Stops and rewinds the current mode. Counters and stats are untouched.
    pub fn reset(&mut self) {
        self.stop();
        self.state.time_left = self.settings.duration_for(self.state.mode);
        debug!(mode = ?self.state.mode, "timer reset");
        self.publish_state();
    }

    /// Ends the current countdown now, running the usual completion
    /// transition. Does nothing when there is no time left to skip.
    pub fn skip(&mut self) -> Option<CompletionEvent> {
        if self.state.time_left == 0 {
            return None;
        }
        debug!(mode = ?self.state.mode, time_left = self.state.time_left, "timer skipped");
        Some(self.complete())
    }

    /// Switches to `mode`, paused, with its full configured duration.
    pub fn set_mode(&mut self, mode: Mode) {
        self.stop();
        self.state.mode = mode;
        self.state.time_left = self.settings.duration_for(mode);
        debug!(?mode, "mode changed");
        self.publish_state();
    }

    /// Advances the countdown by one second.
    ///
    /// Focus seconds are credited to today's stats. Reaching zero runs the
    /// completion transition within the same call.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_running || self.state.time_left == 0 {
            return TickOutcome::Idle;
        }

        self.state.time_left -= 1;

        if self.state.mode == Mode::Focus {
            let today = self.clock.today();
            self.ledger.record_second(today);
            self.persist(keys::STATS, &self.ledger);
        }

        if self.state.time_left == 0 {
            return TickOutcome::Completed(self.complete());
        }

        self.publish_state();
        TickOutcome::Ticked {
            time_left: self.state.time_left,
        }
    }

    /// Like [`Engine::tick`], but ignored unless `epoch` is still current.
    pub fn tick_at(&mut self, epoch: u64) -> TickOutcome {
        if epoch != self.epoch {
            return TickOutcome::Stale;
        }
        self.tick()
    }

    fn complete(&mut self) -> CompletionEvent {
        let finished = self.state.mode;
        self.state.time_left = 0;
        self.stop();

        if self.settings.sound_enabled {
            self.cue.play_cue(self.settings.volume);
        }

        let event = match finished {
            Mode::Focus => {
                self.sessions_completed = self.sessions_completed.saturating_add(1);
                self.persist(keys::SESSIONS_COMPLETED, &self.sessions_completed);

                let today = self.clock.today();
                let today_count = self.ledger.record_pomodoro(today).pomodoros;
                self.persist(keys::STATS, &self.ledger);

                // Evaluated against the cadence configured right now.
                let next = if self.sessions_completed % self.settings.sessions_until_long_break == 0 {
                    Mode::LongBreak
                } else {
                    Mode::ShortBreak
                };
                info!(
                    sessions_completed = self.sessions_completed,
                    today = today_count,
                    ?next,
                    "focus session complete"
                );
                self.set_mode(next);

                CompletionEvent::FocusComplete {
                    sessions_completed: self.sessions_completed,
                    today: today_count,
                    next,
                }
            }
            Mode::ShortBreak | Mode::LongBreak => {
                info!(?finished, "break complete");
                self.set_mode(Mode::Focus);
                CompletionEvent::BreakComplete { finished }
            }
        };

        self.events.publish(EngineEvent::Completed(event));
        event
    }

    /// Merges `patch` into the settings and persists them.
    ///
    /// Invalid values are rejected and the previous settings kept. New
    /// durations otherwise apply from the next `set_mode` or `reset`, with one
    /// exception: if the remaining time now exceeds the current mode's
    /// duration it is cut down to it right away, running or paused, so that
    /// `time_left` never exceeds the configured duration.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<&Settings, SettingsError> {
        let next = self.settings.merged(patch)?;
        self.settings = next;

        let limit = self.settings.duration_for(self.state.mode);
        if self.state.time_left > limit {
            self.state.time_left = limit;
            self.publish_state();
        }

        self.persist(keys::SETTINGS, &self.settings);
        self.events
            .publish(EngineEvent::SettingsChanged(self.settings.clone()));
        Ok(&self.settings)
    }

    pub fn set_daily_goal(&mut self, goal: u32) -> Result<(), SettingsError> {
        if goal == 0 {
            return Err(SettingsError::InvalidDailyGoal(goal));
        }
        self.daily_goal = goal;
        self.persist(keys::DAILY_GOAL, &self.daily_goal);
        self.events.publish(EngineEvent::DailyGoalChanged(goal));
        Ok(())
    }

    /// Wipes the store and returns every value to its default.
    pub fn reset_all_data(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear store");
        }
        self.stop();
        self.settings = Settings::default();
        self.sessions_completed = 0;
        self.daily_goal = DEFAULT_DAILY_GOAL;
        self.ledger = StatsLedger::default();
        self.state = SessionState::fresh(Mode::Focus, &self.settings);
        info!("all data reset");

        self.events.publish(EngineEvent::DataReset);
        self.publish_state();
    }

    fn stop(&mut self) {
        self.state.is_running = false;
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = persistence::save(&*self.store, key, value) {
            warn!(key, error = %e, "failed to persist");
        }
    }

    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        self.events.publish(EngineEvent::StateChanged(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Theme;
    use crate::persistence::Database;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingCue(Arc<Mutex<Vec<f32>>>);

    impl RecordingCue {
        fn played(&self) -> Vec<f32> {
            self.0.lock().unwrap().clone()
        }
    }

    impl CuePlayer for RecordingCue {
        fn play_cue(&self, volume: f32) {
            self.0.lock().unwrap().push(volume);
        }
    }

    struct Harness {
        engine: Engine,
        db: Arc<Database>,
        clock: ManualClock,
        cue: RecordingCue,
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
    }

    fn short_settings() -> Settings {
        Settings {
            focus_duration: 3,
            short_break_duration: 2,
            long_break_duration: 4,
            ..Settings::default()
        }
    }

    fn harness_with(db: Arc<Database>) -> Harness {
        let clock = ManualClock::new(date());
        let cue = RecordingCue::default();
        let engine = Engine::new(db.clone(), Box::new(clock.clone()), Box::new(cue.clone()));
        Harness {
            engine,
            db,
            clock,
            cue,
        }
    }

    fn harness(settings: Settings) -> Harness {
        let db = Arc::new(Database::new_in_memory().unwrap());
        persistence::save(&*db, keys::SETTINGS, &settings).unwrap();
        harness_with(db)
    }

    fn run_to_completion(engine: &mut Engine) -> CompletionEvent {
        engine.start();
        loop {
            match engine.tick() {
                TickOutcome::Completed(event) => return event,
                TickOutcome::Ticked { .. } => {}
                other => panic!("countdown stopped early: {:?}", other),
            }
        }
    }

    #[test]
    fn test_initial_state() {
        let h = harness(Settings::default());
        let state = h.engine.state();
        assert_eq!(state.mode, Mode::Focus);
        assert_eq!(state.time_left, 1500);
        assert!(!state.is_running);
        assert_eq!(h.engine.sessions_completed(), 0);
        assert_eq!(h.engine.daily_goal(), DEFAULT_DAILY_GOAL);
        assert!(h.engine.ledger().is_empty());
    }

    #[test]
    fn test_restores_counter_but_not_countdown() {
        let h = harness(short_settings());
        persistence::save(&*h.db, keys::SESSIONS_COMPLETED, &7u32).unwrap();
        persistence::save(&*h.db, keys::DAILY_GOAL, &6u32).unwrap();

        let restored = harness_with(h.db.clone()).engine;
        assert_eq!(restored.sessions_completed(), 7);
        assert_eq!(restored.daily_goal(), 6);
        assert_eq!(restored.state(), SessionState::fresh(Mode::Focus, &short_settings()));
    }

    #[test]
    fn test_invalid_stored_settings_fall_back_to_defaults() {
        let db = Arc::new(Database::new_in_memory().unwrap());
        db.set_raw(
            keys::SETTINGS,
            r#"{"theme":"dark","focusDuration":0,"shortBreakDuration":300,"longBreakDuration":900,"sessionsUntilLongBreak":4,"volume":0.5,"soundEnabled":true}"#,
        )
        .unwrap();
        db.set_raw(keys::STATS, "not json at all").unwrap();

        let h = harness_with(db);
        assert_eq!(h.engine.settings(), &Settings::default());
        assert!(h.engine.ledger().is_empty());
    }

    #[test]
    fn test_start_and_pause() {
        let mut h = harness(short_settings());

        assert!(h.engine.start());
        assert!(!h.engine.start());
        assert!(h.engine.state().is_running);

        assert!(h.engine.pause());
        assert!(!h.engine.pause());
        assert!(!h.engine.state().is_running);

        assert!(h.engine.toggle());
        assert!(!h.engine.toggle());
    }

    #[test]
    fn test_tick_is_noop_when_paused() {
        let mut h = harness(short_settings());

        assert_eq!(h.engine.tick(), TickOutcome::Idle);
        assert_eq!(h.engine.state().time_left, 3);
        assert!(h.engine.ledger().is_empty());
    }

    #[test]
    fn test_focus_tick_records_study_time() {
        let mut h = harness(Settings::default());
        h.engine.start();

        assert_eq!(h.engine.tick(), TickOutcome::Ticked { time_left: 1499 });
        h.engine.tick();

        assert_eq!(h.engine.today_stat().study_time, 2);
        assert_eq!(h.engine.today_stat().pomodoros, 0);

        let stored: StatsLedger = persistence::load_or(&*h.db, keys::STATS, StatsLedger::default);
        assert_eq!(stored.get(date()).unwrap().study_time, 2);
    }

    #[test]
    fn test_break_tick_records_nothing() {
        let mut h = harness(short_settings());
        h.engine.set_mode(Mode::ShortBreak);
        h.engine.start();
        h.engine.tick();

        assert_eq!(h.engine.state().time_left, 1);
        assert!(h.engine.ledger().is_empty());
    }

    #[test]
    fn test_ninety_focus_seconds() {
        let mut h = harness(Settings::default());
        h.engine.start();
        for _ in 0..90 {
            h.engine.tick();
        }

        assert_eq!(h.engine.today_stat().study_time, 90);
        assert_eq!(h.engine.ledger().len(), 1);
        assert_eq!(h.engine.state().time_left, 1410);
    }

    #[test]
    fn test_focus_completion_goes_to_short_break() {
        let mut h = harness(short_settings());

        let event = run_to_completion(&mut h.engine);

        assert_eq!(
            event,
            CompletionEvent::FocusComplete {
                sessions_completed: 1,
                today: 1,
                next: Mode::ShortBreak,
            }
        );
        assert_eq!(h.engine.state(), SessionState::fresh(Mode::ShortBreak, &short_settings()));
        assert_eq!(h.engine.sessions_completed(), 1);
        assert_eq!(
            h.engine.today_stat(),
            DailyStat {
                date: date(),
                study_time: 3,
                pomodoros: 1,
            }
        );

        let stored: u32 = persistence::load_or(&*h.db, keys::SESSIONS_COMPLETED, || 0);
        assert_eq!(stored, 1);
    }

    #[test]
    fn test_break_completion_returns_to_focus_without_counting() {
        let mut h = harness(short_settings());
        h.engine.set_mode(Mode::LongBreak);

        let event = run_to_completion(&mut h.engine);

        assert_eq!(
            event,
            CompletionEvent::BreakComplete {
                finished: Mode::LongBreak
            }
        );
        assert_eq!(h.engine.state().mode, Mode::Focus);
        assert_eq!(h.engine.state().time_left, 3);
        assert_eq!(h.engine.sessions_completed(), 0);
        assert!(h.engine.ledger().is_empty());
    }

    #[test]
    fn test_long_break_cadence() {
        for k in 1..=5u32 {
            let mut h = harness(Settings {
                sessions_until_long_break: k,
                ..short_settings()
            });

            for n in 1..=12u32 {
                h.engine.set_mode(Mode::Focus);
                let event = run_to_completion(&mut h.engine);
                let expected = if n % k == 0 {
                    Mode::LongBreak
                } else {
                    Mode::ShortBreak
                };
                assert_eq!(event.next_mode(), expected, "k={} n={}", k, n);
                assert_eq!(h.engine.state().mode, expected);
            }
            assert_eq!(h.engine.sessions_completed(), 12);
        }
    }

    #[test]
    fn test_fourth_session_earns_long_break_then_focus() {
        let h = harness(short_settings());
        persistence::save(&*h.db, keys::SESSIONS_COMPLETED, &3u32).unwrap();
        let mut engine = harness_with(h.db.clone()).engine;

        run_to_completion(&mut engine);
        assert_eq!(engine.sessions_completed(), 4);
        assert_eq!(engine.state().mode, Mode::LongBreak);

        run_to_completion(&mut engine);
        assert_eq!(engine.state().mode, Mode::Focus);
        assert_eq!(engine.sessions_completed(), 4);
    }

    #[test]
    fn test_cadence_change_applies_at_next_completion() {
        let mut h = harness(short_settings());
        run_to_completion(&mut h.engine);
        h.engine.set_mode(Mode::Focus);
        run_to_completion(&mut h.engine);
        assert_eq!(h.engine.sessions_completed(), 2);

        // 2 % 2 == 0 already, but nothing is recomputed until a completion.
        h.engine
            .update_settings(&SettingsPatch {
                sessions_until_long_break: Some(2),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(h.engine.state().mode, Mode::ShortBreak);

        h.engine
            .update_settings(&SettingsPatch {
                sessions_until_long_break: Some(3),
                ..SettingsPatch::default()
            })
            .unwrap();
        h.engine.set_mode(Mode::Focus);
        let event = run_to_completion(&mut h.engine);
        assert_eq!(event.next_mode(), Mode::LongBreak);
    }

    #[test]
    fn test_reset_keeps_counters_and_stats() {
        let mut h = harness(short_settings());
        run_to_completion(&mut h.engine);
        h.engine.set_mode(Mode::Focus);
        h.engine.start();
        h.engine.tick();

        let stats_before = h.engine.ledger().clone();
        h.engine.reset();

        assert_eq!(h.engine.state(), SessionState::fresh(Mode::Focus, &short_settings()));
        assert_eq!(h.engine.sessions_completed(), 1);
        assert_eq!(h.engine.ledger(), &stats_before);
    }

    #[test]
    fn test_set_mode_pauses_and_rewinds() {
        let mut h = harness(short_settings());
        h.engine.start();
        h.engine.tick();

        h.engine.set_mode(Mode::LongBreak);

        assert_eq!(h.engine.state(), SessionState::fresh(Mode::LongBreak, &short_settings()));
    }

    #[test]
    fn test_skip_focus_counts_once() {
        let mut h = harness(short_settings());
        h.engine.start();

        let event = h.engine.skip();

        assert!(matches!(
            event,
            Some(CompletionEvent::FocusComplete {
                sessions_completed: 1,
                ..
            })
        ));
        assert_eq!(h.engine.sessions_completed(), 1);
        assert_eq!(h.engine.today_stat().pomodoros, 1);
        assert_eq!(h.engine.state(), SessionState::fresh(Mode::ShortBreak, &short_settings()));
        assert_eq!(h.engine.tick(), TickOutcome::Idle);
        assert_eq!(h.engine.sessions_completed(), 1);
    }

    #[test]
    fn test_skip_break_forfeits_remaining_time() {
        let mut h = harness(short_settings());
        h.engine.set_mode(Mode::ShortBreak);

        let event = h.engine.skip();

        assert_eq!(
            event,
            Some(CompletionEvent::BreakComplete {
                finished: Mode::ShortBreak
            })
        );
        assert_eq!(h.engine.state().mode, Mode::Focus);
        assert_eq!(h.engine.sessions_completed(), 0);
    }

    #[test]
    fn test_stale_epoch_tick_is_ignored() {
        let mut h = harness(short_settings());
        h.engine.start();
        let scheduled = h.engine.epoch();

        h.engine.reset();
        h.engine.start();

        assert_eq!(h.engine.tick_at(scheduled), TickOutcome::Stale);
        assert_eq!(h.engine.state().time_left, 3);

        let current = h.engine.epoch();
        assert_eq!(h.engine.tick_at(current), TickOutcome::Ticked { time_left: 2 });
    }

    #[test]
    fn test_every_stop_changes_epoch() {
        let mut h = harness(short_settings());
        let mut last = h.engine.epoch();
        let mut assert_moved = |engine: &Engine| {
            assert_ne!(engine.epoch(), last);
            last = engine.epoch();
        };

        h.engine.start();
        assert_moved(&h.engine);
        h.engine.pause();
        assert_moved(&h.engine);
        h.engine.reset();
        assert_moved(&h.engine);
        h.engine.set_mode(Mode::ShortBreak);
        assert_moved(&h.engine);
        h.engine.skip();
        assert_moved(&h.engine);
    }

    #[test]
    fn test_cue_follows_sound_setting() {
        let mut h = harness(Settings {
            volume: 0.8,
            ..short_settings()
        });
        run_to_completion(&mut h.engine);
        assert_eq!(h.cue.played(), vec![0.8]);

        h.engine
            .update_settings(&SettingsPatch {
                sound_enabled: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();
        run_to_completion(&mut h.engine);
        assert_eq!(h.cue.played(), vec![0.8]);
    }

    #[test]
    fn test_duration_change_does_not_rewind() {
        let mut h = harness(Settings::default());
        h.engine.start();
        h.engine.tick();
        h.engine.pause();

        h.engine
            .update_settings(&SettingsPatch {
                focus_duration: Some(3000),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(h.engine.state().time_left, 1499);

        h.engine.reset();
        assert_eq!(h.engine.state().time_left, 3000);
    }

    #[test]
    fn test_shorter_duration_clamps_remaining_time() {
        let mut h = harness(Settings::default());

        h.engine
            .update_settings(&SettingsPatch {
                focus_duration: Some(600),
                ..SettingsPatch::default()
            })
            .unwrap();

        assert_eq!(h.engine.state().time_left, 600);
    }

    #[test]
    fn test_longer_duration_waits_for_next_mode_change() {
        let mut h = harness(Settings::default());

        h.engine
            .update_settings(&SettingsPatch {
                focus_duration: Some(3000),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(h.engine.state().time_left, 1500);

        h.engine.reset();
        assert_eq!(h.engine.state().time_left, 3000);
    }

    #[test]
    fn test_invalid_update_keeps_previous_settings() {
        let mut h = harness(short_settings());

        let result = h.engine.update_settings(&SettingsPatch {
            theme: Some(Theme::Dark),
            long_break_duration: Some(0),
            ..SettingsPatch::default()
        });

        assert!(result.is_err());
        assert_eq!(h.engine.settings(), &short_settings());
        let stored: Settings = persistence::load_or(&*h.db, keys::SETTINGS, Settings::default);
        assert_eq!(stored, short_settings());
    }

    #[test]
    fn test_update_settings_persists() {
        let mut h = harness(short_settings());

        h.engine
            .update_settings(&SettingsPatch {
                theme: Some(Theme::Orange),
                volume: Some(0.1),
                ..SettingsPatch::default()
            })
            .unwrap();

        let restored = harness_with(h.db.clone()).engine;
        assert_eq!(restored.settings().theme, Theme::Orange);
        assert_eq!(restored.settings().volume, 0.1);
    }

    #[test]
    fn test_study_time_follows_the_clock_across_midnight() {
        let mut h = harness(Settings::default());
        h.engine.start();
        h.engine.tick();
        h.clock.advance_day();
        h.engine.tick();
        h.engine.tick();

        let tomorrow = date().succ_opt().unwrap();
        assert_eq!(h.engine.ledger().get(date()).unwrap().study_time, 1);
        assert_eq!(h.engine.ledger().get(tomorrow).unwrap().study_time, 2);
    }

    #[test]
    fn test_session_spanning_midnight_credits_pomodoro_to_completion_day() {
        let mut h = harness(short_settings());
        h.engine.start();
        h.engine.tick();
        h.clock.advance_day();

        let event = loop {
            match h.engine.tick() {
                TickOutcome::Completed(event) => break event,
                TickOutcome::Ticked { .. } => {}
                other => panic!("countdown stopped early: {:?}", other),
            }
        };

        let tomorrow = date().succ_opt().unwrap();
        assert!(matches!(event, CompletionEvent::FocusComplete { today: 1, .. }));
        assert_eq!(h.engine.ledger().get(date()).unwrap().study_time, 1);
        assert_eq!(h.engine.ledger().get(date()).unwrap().pomodoros, 0);
        assert_eq!(h.engine.ledger().get(tomorrow).unwrap().study_time, 2);
        assert_eq!(h.engine.ledger().get(tomorrow).unwrap().pomodoros, 1);
        assert_eq!(h.engine.today_stat().pomodoros, 1);

        let reloaded = harness_with(h.db.clone()).engine;
        assert_eq!(reloaded.ledger().pomodoros_on(date()), 0);
        assert_eq!(reloaded.ledger().pomodoros_on(tomorrow), 1);
    }

    #[test]
    fn test_achievements_track_ledger() {
        let mut h = harness(short_settings());
        assert!(h.engine.achievements().iter().all(|a| a.current == 0));

        run_to_completion(&mut h.engine);
        let total = h
            .engine
            .achievements()
            .into_iter()
            .find(|a| a.definition.metric == achievements::Metric::TotalPomodoros)
            .unwrap();
        assert_eq!(total.current, 1);
    }

    #[test]
    fn test_streak_and_goal_progress() {
        let mut h = harness(short_settings());
        h.clock.set(date().pred_opt().unwrap());
        run_to_completion(&mut h.engine);

        h.clock.set(date());
        assert_eq!(h.engine.streak(), 1);
        assert_eq!(
            h.engine.goal_progress(),
            GoalProgress {
                completed: 0,
                goal: 4
            }
        );

        h.engine.set_mode(Mode::Focus);
        run_to_completion(&mut h.engine);
        assert_eq!(h.engine.streak(), 2);

        h.engine.set_daily_goal(1).unwrap();
        assert!(h.engine.goal_progress().is_met());
        assert_eq!(
            h.engine.set_daily_goal(0),
            Err(SettingsError::InvalidDailyGoal(0))
        );
        assert_eq!(h.engine.daily_goal(), 1);
    }

    #[test]
    fn test_reset_all_data() {
        let mut h = harness(short_settings());
        run_to_completion(&mut h.engine);
        h.engine.set_daily_goal(8).unwrap();

        h.engine.reset_all_data();

        assert_eq!(h.engine.settings(), &Settings::default());
        assert_eq!(h.engine.sessions_completed(), 0);
        assert_eq!(h.engine.daily_goal(), DEFAULT_DAILY_GOAL);
        assert!(h.engine.ledger().is_empty());
        assert_eq!(h.engine.state(), SessionState::fresh(Mode::Focus, &Settings::default()));
        assert_eq!(h.db.get(keys::STATS).unwrap(), None);
    }

    #[test]
    fn test_subscribers_see_state_and_completion() {
        let mut h = harness(short_settings());
        let events = h.engine.subscribe();

        run_to_completion(&mut h.engine);

        let received: Vec<EngineEvent> = events.try_iter().collect();
        assert!(matches!(
            received.first(),
            Some(EngineEvent::StateChanged(SessionSnapshot {
                state: SessionState {
                    is_running: true,
                    time_left: 3,
                    ..
                },
                ..
            }))
        ));
        assert!(matches!(
            received.last(),
            Some(EngineEvent::Completed(CompletionEvent::FocusComplete { .. }))
        ));

        let ticks = received
            .iter()
            .filter(|e| matches!(e, EngineEvent::StateChanged(s) if s.state.is_running))
            .count();
        assert_eq!(ticks, 3);
    }
}
