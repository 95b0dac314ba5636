//! Test doubles shared by the integration tests
//!
//! Each integration test binary uses a different subset of these.
#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamsynth::speech::{
    AudioSink, IndexMarker, InferenceGateway, InferenceMeta, Language, PcmBuffer, SpeechObserver,
    StyleHandle, Waveform,
};
use streamsynth::{Result, SynthError};

pub const WAIT: Duration = Duration::from_secs(5);

/// Wait on `cv` until `done` holds or [`WAIT`] passes
fn wait_for<T>(lock: &Mutex<T>, cv: &Condvar, mut done: impl FnMut(&T) -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    let mut guard = lock.lock();
    while !done(&*guard) {
        if cv.wait_until(&mut guard, deadline).timed_out() {
            return done(&*guard);
        }
    }
    true
}

/// One call seen by [`MockGateway`]
#[derive(Debug, Clone)]
pub struct InferCall {
    pub text: String,
    pub language: Language,
    pub style: PathBuf,
    pub quality: u8,
    pub speed: f32,
}

/// How a call to [`MockGateway`] should behave
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Gateway returning one sample of 0.25 per input character
///
/// Calls can be made to fail or panic by number (1-based), and can be held
/// until [`MockGateway::release`] is called.
#[derive(Default)]
pub struct MockGateway {
    calls: Mutex<Vec<InferCall>>,
    call_made: Condvar,
    behaviors: Mutex<Vec<(usize, Behavior)>>,
    held: Mutex<bool>,
    released: Condvar,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make call number `call` behave as given
    pub fn on_call(&self, call: usize, behavior: Behavior) {
        self.behaviors.lock().push((call, behavior));
    }

    /// Block every call until released
    pub fn hold(&self) {
        *self.held.lock() = true;
    }

    pub fn release(&self) {
        *self.held.lock() = false;
        self.released.notify_all();
    }

    pub fn calls(&self) -> Vec<InferCall> {
        self.calls.lock().clone()
    }

    pub fn wait_for_calls(&self, count: usize) -> bool {
        wait_for(&self.calls, &self.call_made, |calls| calls.len() >= count)
    }
}

impl InferenceGateway for MockGateway {
    fn infer(
        &self,
        texts: &[String],
        languages: &[Language],
        style: &StyleHandle,
        quality_steps: u8,
        speed: f32,
    ) -> Result<(Waveform, InferenceMeta)> {
        assert_eq!(texts.len(), 1, "the worker sends one chunk at a time");
        assert_eq!(languages.len(), 1);

        let number = {
            let mut calls = self.calls.lock();
            calls.push(InferCall {
                text: texts[0].clone(),
                language: languages[0],
                style: style.path().to_path_buf(),
                quality: quality_steps,
                speed,
            });
            calls.len()
        };
        self.call_made.notify_all();

        {
            let mut held = self.held.lock();
            while *held {
                self.released.wait(&mut held);
            }
        }

        let behavior = self
            .behaviors
            .lock()
            .iter()
            .find(|(call, _)| *call == number)
            .map(|(_, behavior)| *behavior)
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => {
                let samples = vec![0.25; texts[0].chars().count()];
                let duration = samples.len() as f32 / 44_100.0;
                Ok((
                    Waveform::new(samples, 44_100),
                    InferenceMeta {
                        durations: vec![duration],
                    },
                ))
            }
            Behavior::Fail => Err(SynthError::Inference(format!("call {} failed", number))),
            Behavior::Panic => panic!("engine crashed on call {}", number),
        }
    }
}

/// Sink that records everything fed to it
///
/// Feeds can be made to fail by number (1-based).
#[derive(Default)]
pub struct RecordingSink {
    fed: Mutex<Vec<Vec<u8>>>,
    fed_changed: Condvar,
    feed_calls: Mutex<usize>,
    failing_feeds: Mutex<Vec<usize>>,
    stops: Mutex<usize>,
    closed: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make feed call number `call` fail
    pub fn fail_feed(&self, call: usize) {
        self.failing_feeds.lock().push(call);
    }

    pub fn fed(&self) -> Vec<Vec<u8>> {
        self.fed.lock().clone()
    }

    /// Feed calls made, including failed ones
    pub fn feed_calls(&self) -> usize {
        *self.feed_calls.lock()
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub fn wait_for_feeds(&self, count: usize) -> bool {
        wait_for(&self.fed, &self.fed_changed, |fed| fed.len() >= count)
    }
}

impl AudioSink for RecordingSink {
    fn feed(&self, pcm: PcmBuffer) -> Result<()> {
        if self.is_closed() {
            return Err(SynthError::Sink("closed".to_string()));
        }
        let number = {
            let mut calls = self.feed_calls.lock();
            *calls += 1;
            *calls
        };
        if self.failing_feeds.lock().contains(&number) {
            return Err(SynthError::Sink(format!("feed {} failed", number)));
        }
        self.fed.lock().push(pcm.into_bytes());
        self.fed_changed.notify_all();
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        *self.stops.lock() += 1;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

/// Notification seen by [`RecordingObserver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Index(IndexMarker),
    Done,
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
    changed: Condvar,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn done_count(&self) -> usize {
        self.events.lock().iter().filter(|e| **e == Event::Done).count()
    }

    /// Wait until `count` requests have finished
    pub fn wait_for_done(&self, count: usize) -> bool {
        wait_for(&self.events, &self.changed, |events| {
            events.iter().filter(|e| **e == Event::Done).count() >= count
        })
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
        self.changed.notify_all();
    }
}

impl SpeechObserver for RecordingObserver {
    fn on_index_reached(&self, marker: IndexMarker) {
        self.record(Event::Index(marker));
    }

    fn on_done_speaking(&self) {
        self.record(Event::Done);
    }
}

/// A style handle not backed by any file
pub fn test_style(name: &str) -> StyleHandle {
    StyleHandle::new(format!("{}.json", name), serde_json::json!({ "name": name }))
}
