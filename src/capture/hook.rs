use crossbeam_channel::{Receiver, bounded};
use rdev::EventType;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::error;

use super::aggregator::{KeyDirection, KeyEvent};

/// Global key-hook adapter.
///
/// Registers an rdev listener on a background thread and forwards key
/// events, stamped with their arrival time, into a channel. The aggregator
/// consumes that channel single-threadedly, so event ordering is preserved
/// without the aggregator itself running on the hook's callback thread.
pub struct KeyHook {
    pub rx: Receiver<KeyEvent>,
    recording: Arc<AtomicBool>,
}

impl KeyHook {
    /// Spawn the listener thread. Events are only forwarded while the hook
    /// is started.
    ///
    /// The channel is bounded large enough to absorb typing bursts; the OS
    /// callback must never block, so a full channel drops the event instead.
    pub fn spawn() -> Self {
        let (tx, rx) = bounded(4096);
        let recording = Arc::new(AtomicBool::new(false));
        let recording_flag = recording.clone();

        thread::spawn(move || {
            if let Err(err) = rdev::listen(move |event| {
                if !recording_flag.load(Ordering::Relaxed) {
                    return;
                }
                let (key, direction) = match event.event_type {
                    EventType::KeyPress(key) => (key, KeyDirection::Down),
                    EventType::KeyRelease(key) => (key, KeyDirection::Up),
                    _ => return,
                };
                let _ = tx.try_send(KeyEvent {
                    key,
                    direction,
                    at: Instant::now(),
                });
            }) {
                error!(target: "replaykit::capture", ?err, "key listener failed");
            }
        });

        Self { rx, recording }
    }

    pub fn start(&self) {
        self.recording.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.recording.store(false, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }
}
