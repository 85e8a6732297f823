//! Audio cue played when a countdown completes.

use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
    #[error("Failed to start audio thread: {0}")]
    Thread(#[from] std::io::Error),
    #[error("Audio thread exited during startup")]
    Disconnected,
}

/// Plays the completion cue. Best effort: implementations never fail loudly.
pub trait CuePlayer: Send {
    fn play_cue(&self, volume: f32);
}

/// A cue player that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl CuePlayer for Silent {
    fn play_cue(&self, _volume: f32) {}
}

/// Plays a generated chime on the default output device.
///
/// The rodio output stream cannot leave the thread that opened it, so it
/// lives on a dedicated audio thread and cues are requested over a channel.
/// Dropping the player waits for queued cues to finish.
pub struct AudioPlayer {
    requests: Option<Sender<f32>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioPlayer {
    /// Opens the default output device on a new audio thread.
    pub fn spawn() -> Result<Self, AudioError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (requests, pending) = mpsc::channel::<f32>();

        let thread = thread::Builder::new()
            .name("focusflow-audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for volume in pending {
                    if let Err(e) = play_chime(&handle, volume) {
                        warn!(error = %e, "failed to play chime");
                    }
                }
                debug!("audio thread stopping");
            })?;

        ready_rx.recv().map_err(|_| AudioError::Disconnected)??;
        Ok(Self {
            requests: Some(requests),
            thread: Some(thread),
        })
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        // Closing the channel ends the audio thread's loop.
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("audio thread panicked");
            }
        }
    }
}

impl CuePlayer for AudioPlayer {
    fn play_cue(&self, volume: f32) {
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(volume.clamp(0.0, 1.0)).is_ok());
        if !sent {
            warn!("audio thread is gone, dropping cue");
        }
    }
}

/// Plays a two-tone chime at `volume` and blocks until it has finished.
fn play_chime(handle: &OutputStreamHandle, volume: f32) -> Result<(), AudioError> {
    let sink = Sink::try_new(handle)?;
    sink.set_volume(volume);

    // A5 then C6 with a short gap.
    let tone1 = SineWave::new(880.0)
        .take_duration(Duration::from_millis(150))
        .amplify(0.3);

    let silence = rodio::source::Zero::<f32>::new(1, 44100).take_duration(Duration::from_millis(50));

    let tone2 = SineWave::new(1046.5)
        .take_duration(Duration::from_millis(200))
        .amplify(0.3);

    sink.append(tone1);
    sink.append(silence);
    sink.append(tone2);
    sink.sleep_until_end();

    Ok(())
}
