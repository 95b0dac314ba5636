//! Request queue and cancellation signal
//!
//! The driver pushes requests from the host's thread; the synthesis worker
//! is the only consumer. Cancellation bypasses the queue: it raises a flag
//! the worker polls between chunks, and drops everything not yet dequeued.

use super::request::SpeechRequest;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation flag for the request being processed
#[derive(Debug, Default)]
struct CancellationSignal(AtomicBool);

impl CancellationSignal {
    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// FIFO of pending utterances with a timed pop
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<VecDeque<SpeechRequest>>,
    available: Condvar,
    cancel: CancellationSignal,
    /// A request has been popped and not yet finished. Raised under the
    /// queue lock so it is never observed as idle in between.
    in_flight: AtomicBool,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request; never blocks beyond a brief lock
    pub fn push(&self, request: SpeechRequest) {
        self.pending.lock().push_back(request);
        self.available.notify_one();
    }

    /// Wait up to `timeout` for the next request
    ///
    /// A dequeued request always starts uncancelled. The flag is cleared
    /// while the queue lock is held, and [`RequestQueue::cancel`] raises it
    /// under the same lock, so a cancel racing with this pop is never lost:
    /// either the request is drained first or the flag is seen afterwards.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<SpeechRequest> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();

        while pending.is_empty() {
            if self.available.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        let request = pending.pop_front()?;
        self.cancel.clear();
        self.in_flight.store(true, Ordering::SeqCst);
        Some(request)
    }

    /// Mark the last popped request as finished
    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// True while requests are pending or one is being processed
    pub fn has_work(&self) -> bool {
        let pending = self.pending.lock();
        !pending.is_empty() || self.in_flight.load(Ordering::SeqCst)
    }

    /// Raise the cancellation flag and drop all pending requests
    ///
    /// Returns the number of requests dropped.
    pub fn cancel(&self) -> usize {
        let mut pending = self.pending.lock();
        self.cancel.set();
        let dropped = pending.len();
        pending.clear();
        if dropped > 0 {
            debug!("Dropped {} pending speech requests", dropped);
        }
        dropped
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Wake any thread blocked in [`RequestQueue::pop_timeout`]
    pub fn wake(&self) {
        self.available.notify_all();
    }
}
