//! Sequential playback of streamed speech fragments.
//!
//! Speech responses arrive as a chunked binary stream whose fragments each
//! decode independently. Fragments land at unpredictable times relative to
//! playback completion, so [`AudioPlaybackQueue`] serializes them: a FIFO
//! holds arrivals, exactly one fragment is ever in its decode+play cycle,
//! and a failed decode is dropped so the queue keeps moving.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::PlaybackError;

/// One binary block received from a single stream read.
pub type AudioChunk = Vec<u8>;

/// Decode-and-play backend for one fragment at a time.
///
/// `play` blocks until the fragment has finished sounding (or failed); the
/// queue runs it on a blocking worker. Implementations other than the real
/// output device exist for tests.
pub trait AudioSink: Send + 'static {
    fn play(&mut self, chunk: &[u8]) -> Result<(), PlaybackError>;
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<AudioChunk>,
    playing: bool,
    played: u64,
    skipped: u64,
}

/// FIFO playback scheduler: at most one fragment plays at a time, playback
/// order equals enqueue order, and per-fragment failures are skipped.
#[derive(Clone)]
pub struct AudioPlaybackQueue {
    state: Arc<Mutex<QueueState>>,
    sink: Arc<Mutex<Box<dyn AudioSink>>>,
    idle: Arc<Notify>,
}

impl AudioPlaybackQueue {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            sink: Arc::new(Mutex::new(sink)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Append a fragment and start playback if the player is idle. Never
    /// blocks and never interrupts the active fragment.
    pub fn enqueue(&self, chunk: AudioChunk) {
        if chunk.is_empty() {
            // Invalid fragments are dropped here rather than handed to the
            // decoder; same non-fatal contract as a decode failure.
            let mut state = self.state.lock().expect("playback queue lock poisoned");
            state.skipped += 1;
            warn!(skipped = state.skipped, "ignoring empty audio fragment");
            return;
        }
        {
            let mut state = self.state.lock().expect("playback queue lock poisoned");
            state.queue.push_back(chunk);
            debug!(queued = state.queue.len(), "audio fragment enqueued");
        }
        self.advance();
    }

    /// Start the drain task if the player is idle and fragments are
    /// waiting. A no-op on an empty idle queue or while playback runs.
    pub fn advance(&self) {
        {
            let mut state = self.state.lock().expect("playback queue lock poisoned");
            if state.playing || state.queue.is_empty() {
                return;
            }
            state.playing = true;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            queue.drain().await;
        });
    }

    /// Pop and play fragments until the FIFO empties, then return to idle.
    async fn drain(&self) {
        loop {
            let chunk = {
                let mut state = self.state.lock().expect("playback queue lock poisoned");
                match state.queue.pop_front() {
                    Some(chunk) => chunk,
                    None => {
                        state.playing = false;
                        drop(state);
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };

            let sink = Arc::clone(&self.sink);
            let result = tokio::task::spawn_blocking(move || {
                sink.lock()
                    .expect("audio sink lock poisoned")
                    .play(&chunk)
            })
            .await;

            let mut state = self.state.lock().expect("playback queue lock poisoned");
            match result {
                Ok(Ok(())) => state.played += 1,
                Ok(Err(e)) => {
                    state.skipped += 1;
                    warn!(error = %e, skipped = state.skipped, "audio fragment skipped");
                }
                Err(e) => {
                    state.skipped += 1;
                    warn!(error = %e, "audio playback task failed");
                }
            }
        }
    }

    /// Await the queue going idle with nothing buffered.
    pub async fn wait_idle(&self) {
        let notified = self.idle.notified();
        tokio::pin!(notified);
        loop {
            // Register before checking state so a notification landing
            // between the check and the await is not lost.
            notified.as_mut().enable();
            {
                let state = self.state.lock().expect("playback queue lock poisoned");
                if !state.playing && state.queue.is_empty() {
                    return;
                }
            }
            notified.as_mut().await;
            notified.set(self.idle.notified());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state
            .lock()
            .expect("playback queue lock poisoned")
            .playing
    }

    /// Fragments played to completion.
    pub fn played(&self) -> u64 {
        self.state
            .lock()
            .expect("playback queue lock poisoned")
            .played
    }

    /// Fragments dropped (empty input or decode/play failure).
    pub fn skipped(&self) -> u64 {
        self.state
            .lock()
            .expect("playback queue lock poisoned")
            .skipped
    }
}

/// Real audio output: decode each fragment with rodio and play it on the
/// default output device.
#[cfg(feature = "playback")]
pub struct RodioSink {
    // The stream handle must outlive the sink or the device closes.
    _stream: rodio::OutputStream,
    sink: rodio::Sink,
}

#[cfg(feature = "playback")]
impl RodioSink {
    pub fn open_default() -> Result<Self, PlaybackError> {
        let stream = rodio::OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        let sink = rodio::Sink::connect_new(stream.mixer());
        Ok(Self {
            _stream: stream,
            sink,
        })
    }
}

#[cfg(feature = "playback")]
impl AudioSink for RodioSink {
    fn play(&mut self, chunk: &[u8]) -> Result<(), PlaybackError> {
        if chunk.is_empty() {
            return Err(PlaybackError::Empty);
        }
        let cursor = std::io::Cursor::new(chunk.to_vec());
        let source =
            rodio::Decoder::new(cursor).map_err(|e| PlaybackError::Decode(e.to_string()))?;
        self.sink.append(source);
        self.sink.sleep_until_end();
        Ok(())
    }
}
