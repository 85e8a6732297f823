//! Engine notifications delivered to subscribers.

use crate::models::{Mode, SessionState, Settings};
use std::sync::mpsc::{self, Receiver, Sender};

/// Emitted when a countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEvent {
    FocusComplete {
        /// Lifetime focus sessions after this one.
        sessions_completed: u32,
        /// Pomodoros completed today after this one.
        today: u32,
        next: Mode,
    },
    BreakComplete {
        finished: Mode,
    },
}

impl CompletionEvent {
    /// The mode the engine switched to.
    pub fn next_mode(&self) -> Mode {
        match self {
            Self::FocusComplete { next, .. } => *next,
            Self::BreakComplete { .. } => Mode::Focus,
        }
    }
}

/// Everything a view needs to render the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Configured length of the current mode in seconds.
    pub total_secs: u32,
    pub sessions_completed: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Countdown state changed (tick, start, pause, reset, mode change).
    StateChanged(SessionSnapshot),
    Completed(CompletionEvent),
    SettingsChanged(Settings),
    DailyGoalChanged(u32),
    /// All persisted data was wiped and defaults restored.
    DataReset,
}

/// Fan-out of engine events to any number of channel subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Sends `event` to every live subscriber, dropping those whose
    /// receiver has gone away.
    pub fn publish(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
