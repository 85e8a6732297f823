//! Desktop notifications for completed countdowns.

use focusflow::{CompletionEvent, Mode};
use notify_rust::Notification;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Shows a notification for `event` on a background thread.
pub fn notify_completion(event: CompletionEvent, next_mins: u32) -> JoinHandle<()> {
    let (summary, body) = completion_message(event, next_mins);
    thread::spawn(move || {
        if let Err(e) = Notification::new()
            .summary(&summary)
            .body(&body)
            .sound_name("default")
            .show()
        {
            warn!(error = %e, "failed to show notification");
        }
    })
}

/// Title and body for a completion notification.
pub fn completion_message(event: CompletionEvent, next_mins: u32) -> (String, String) {
    match event {
        CompletionEvent::FocusComplete {
            today,
            next: Mode::LongBreak,
            ..
        } => (
            "Long Break Time! 🎉".to_string(),
            format!(
                "{} pomodoros today. You've earned a {} minute break.",
                today, next_mins
            ),
        ),
        CompletionEvent::FocusComplete { today, .. } => {
            let done = if today == 1 {
                "You've completed 1 pomodoro today.".to_string()
            } else {
                format!("You've completed {} pomodoros today.", today)
            };
            (
                "Pomodoro Complete! 🍅".to_string(),
                format!("Great work! {}\nTake a {} minute break.", done, next_mins),
            )
        }
        CompletionEvent::BreakComplete { .. } => (
            "Break Over! ☕".to_string(),
            "Ready to start another focus session?".to_string(),
        ),
    }
}
