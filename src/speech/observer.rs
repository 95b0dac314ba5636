//! Notifications from the synthesis worker to the host

use super::request::IndexMarker;
use log::info;

/// Receives progress notifications, called on the worker thread
///
/// Implementations must return quickly; the next request waits for them.
pub trait SpeechObserver: Send + Sync {
    /// The audio for everything before `marker` has been queued for playback.
    /// Not called for cancelled requests.
    fn on_index_reached(&self, _marker: IndexMarker) {}

    /// A dequeued request has finished, whether it completed, failed or was
    /// cancelled. Called exactly once per request.
    fn on_done_speaking(&self) {}
}

/// Observer that logs notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SpeechObserver for LogObserver {
    fn on_index_reached(&self, marker: IndexMarker) {
        info!("Index reached: {}", marker);
    }

    fn on_done_speaking(&self) {
        info!("Done speaking");
    }
}
