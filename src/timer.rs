//! Periodic tick task driving a shared [`Engine`].

use crate::engine::{Engine, TickOutcome};
use crate::event::{CompletionEvent, SessionSnapshot};
use crate::models::Mode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

pub type SharedEngine = Arc<Mutex<Engine>>;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Locks the engine, recovering it if a previous holder panicked.
pub fn lock(engine: &SharedEngine) -> MutexGuard<'_, Engine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owned handle to a running tick thread.
///
/// The thread ticks the engine once per period for a single epoch. Dropping
/// or cancelling the handle stops it before returning.
pub struct TickHandle {
    cancel: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl TickHandle {
    pub fn spawn(engine: SharedEngine, epoch: u64, period: Duration) -> Self {
        let (cancel, cancelled) = mpsc::channel();
        let thread = thread::spawn(move || run_ticks(engine, epoch, period, cancelled));
        Self {
            cancel,
            thread: Some(thread),
        }
    }

    /// True once the thread has stopped on its own or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.cancel.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("tick thread panicked");
            }
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_ticks(engine: SharedEngine, epoch: u64, period: Duration, cancelled: Receiver<()>) {
    loop {
        match cancelled.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            // Cancelled, or the handle is gone.
            _ => break,
        }

        let outcome = lock(&engine).tick_at(epoch);
        trace!(epoch, ?outcome, "tick");
        if !outcome.keeps_running() {
            break;
        }
    }
    debug!(epoch, "tick thread stopped");
}

/// Controls a shared engine and keeps exactly one tick thread alive while
/// it is running.
///
/// Every operation that stops the countdown also cancels the tick thread,
/// so no tick can land after a pause, reset, skip or mode change.
pub struct Timer {
    engine: SharedEngine,
    period: Duration,
    ticker: Option<TickHandle>,
}

impl Timer {
    pub fn new(engine: SharedEngine) -> Self {
        Self::with_period(engine, TICK_PERIOD)
    }

    pub fn with_period(engine: SharedEngine, period: Duration) -> Self {
        Self {
            engine,
            period,
            ticker: None,
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// True while a tick thread is alive.
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn start(&mut self) -> bool {
        let epoch = {
            let mut engine = lock(&self.engine);
            if !engine.start() {
                return false;
            }
            engine.epoch()
        };
        self.cancel_ticker();
        self.ticker = Some(TickHandle::spawn(
            Arc::clone(&self.engine),
            epoch,
            self.period,
        ));
        true
    }

    pub fn pause(&mut self) -> bool {
        let paused = lock(&self.engine).pause();
        self.cancel_ticker();
        paused
    }

    /// Returns the new running state.
    pub fn toggle(&mut self) -> bool {
        let running = lock(&self.engine).state().is_running;
        if running {
            self.pause();
            false
        } else {
            self.start()
        }
    }

    pub fn reset(&mut self) {
        lock(&self.engine).reset();
        self.cancel_ticker();
    }

    pub fn skip(&mut self) -> Option<CompletionEvent> {
        let event = lock(&self.engine).skip();
        self.cancel_ticker();
        event
    }

    pub fn set_mode(&mut self, mode: Mode) {
        lock(&self.engine).set_mode(mode);
        self.cancel_ticker();
    }

    /// Pauses the engine and stops ticking.
    pub fn shutdown(&mut self) {
        self.pause();
    }

    // Must not be called with the engine locked: the tick thread may be
    // waiting for the same lock.
    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

/// Formats a one-line status for a terminal.
pub fn format_status_line(snapshot: &SessionSnapshot) -> String {
    let state = &snapshot.state;
    let icon = match (state.mode, state.is_running) {
        (_, false) => "⏸",
        (Mode::Focus, true) => "🍅",
        (Mode::ShortBreak, true) => "☕",
        (Mode::LongBreak, true) => "🌙",
    };
    format!(
        "{} {} {} ({:.0}%)",
        icon,
        state.mode.label(),
        format_time(state.time_left),
        state.progress_percent(snapshot.total_secs) * 100.0
    )
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
