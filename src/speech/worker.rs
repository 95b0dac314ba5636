//! Synthesis worker
//!
//! A single long-lived thread that drains the request queue. For each
//! request it cuts the text into chunks and, chunk by chunk, runs inference,
//! post-processes the waveform and feeds the result to the audio sink.
//!
//! ```text
//! Idle -> Dequeuing -> ChunkingText -> { Inferring -> PostProcessing -> Feeding }*
//!      -> ReportingIndex -> Idle                      (Stopped on shutdown)
//! ```
//!
//! Cancellation is cooperative. The flag is checked before every chunk,
//! right after inference returns, and again just before feeding, so audio
//! for a cancelled request never reaches the sink. A chunk is atomic: it is
//! either fed whole or dropped.

use super::chunker::{TextChunker, DEFAULT_MAX_CHUNK_LEN};
use super::gateway::InferenceGateway;
use super::observer::SpeechObserver;
use super::postprocess::{self, DEFAULT_GAIN};
use super::queue::RequestQueue;
use super::request::{PcmBuffer, SpeechRequest};
use super::settings::LiveSettings;
use super::sink::AudioSink;
use crate::{Result, SynthError};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default bound on how long the worker waits for a request before
/// re-checking for shutdown
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where the worker currently is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Dequeuing = 1,
    ChunkingText = 2,
    Inferring = 3,
    PostProcessing = 4,
    Feeding = 5,
    ReportingIndex = 6,
    Stopped = 7,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Dequeuing,
            2 => WorkerState::ChunkingText,
            3 => WorkerState::Inferring,
            4 => WorkerState::PostProcessing,
            5 => WorkerState::Feeding,
            6 => WorkerState::ReportingIndex,
            _ => WorkerState::Stopped,
        }
    }
}

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Every chunk was attempted; some may have produced no audio
    Completed,
    /// Abandoned because the cancellation flag was raised
    Cancelled,
    /// Could not be synthesized at all
    Failed,
}

/// Tuning knobs for the worker loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerOptions {
    /// Maximum chunk length in characters
    pub max_chunk_len: usize,
    /// Amplification applied on top of the volume percentage
    pub gain: f32,
    /// Bounded wait on the queue between shutdown checks
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            gain: DEFAULT_GAIN,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Engine and sink, filled in by the driver's initialization thread
///
/// Either may be absent: before initialization finishes, after it failed,
/// or after shutdown released them.
#[derive(Default)]
pub struct Resources {
    engine: RwLock<Option<Arc<dyn InferenceGateway>>>,
    sink: RwLock<Option<Arc<dyn AudioSink>>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> Option<Arc<dyn InferenceGateway>> {
        self.engine.read().clone()
    }

    pub fn set_engine(&self, engine: Arc<dyn InferenceGateway>) {
        *self.engine.write() = Some(engine);
    }

    pub fn has_engine(&self) -> bool {
        self.engine.read().is_some()
    }

    pub fn sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.sink.read().clone()
    }

    pub fn set_sink(&self, sink: Arc<dyn AudioSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Stop playback if a sink is open
    pub fn stop_sink(&self) {
        if let Some(sink) = self.sink() {
            if let Err(e) = sink.stop() {
                warn!("Failed to stop audio: {}", e);
            }
        }
    }

    /// Close the sink and drop the engine
    pub fn release(&self) {
        if let Some(sink) = self.sink.write().take() {
            if let Err(e) = sink.close() {
                warn!("Failed to close audio sink: {}", e);
            }
        }
        self.engine.write().take();
    }
}

/// Everything the worker thread needs
pub struct WorkerContext {
    pub queue: Arc<RequestQueue>,
    pub settings: Arc<LiveSettings>,
    pub resources: Arc<Resources>,
    pub observer: Arc<dyn SpeechObserver>,
    pub options: WorkerOptions,
}

struct SynthesisWorker {
    ctx: WorkerContext,
    shutdown: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl SynthesisWorker {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn cancelled(&self) -> bool {
        self.ctx.queue.is_cancelled()
    }

    fn run(self) {
        info!("Synthesis worker started");

        while !self.shutdown.load(Ordering::SeqCst) {
            self.set_state(WorkerState::Dequeuing);
            let Some(request) = self.ctx.queue.pop_timeout(self.ctx.options.poll_interval) else {
                self.set_state(WorkerState::Idle);
                continue;
            };

            self.handle_request(request);
            self.set_state(WorkerState::Idle);
            self.ctx.queue.finish();
        }

        self.ctx.resources.release();
        self.set_state(WorkerState::Stopped);
        info!("Synthesis worker stopped");
    }

    /// Process one request; never unwinds out
    fn handle_request(&self, request: SpeechRequest) {
        debug!(
            "Dequeued request: {} chars, language {}, index {:?}",
            request.text.len(),
            request.language,
            request.index
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let outcome = self.speak(&request);
            self.report_index(&request, outcome);
            outcome
        }));

        match result {
            Ok(outcome) => debug!("Request finished: {:?}", outcome),
            Err(_) => error!("Synthesis of request panicked; skipping it"),
        }

        if panic::catch_unwind(AssertUnwindSafe(|| self.ctx.observer.on_done_speaking())).is_err() {
            error!("Done-speaking observer panicked");
        }
    }

    fn speak(&self, request: &SpeechRequest) -> RequestOutcome {
        self.set_state(WorkerState::ChunkingText);

        if self.cancelled() {
            return RequestOutcome::Cancelled;
        }
        if request.is_blank() {
            return RequestOutcome::Completed;
        }

        let Some(engine) = self.ctx.resources.engine() else {
            warn!("Synthesis engine not loaded; skipping speech");
            return RequestOutcome::Completed;
        };
        let Some(style) = request.style.as_ref() else {
            error!("No voice style loaded; cannot synthesize");
            return RequestOutcome::Failed;
        };

        let options = &self.ctx.options;
        let languages = [request.language];

        for chunk in TextChunker::new(&request.text, options.max_chunk_len) {
            if self.cancelled() {
                debug!("Cancelled before chunk {}", chunk.ordinal);
                return RequestOutcome::Cancelled;
            }

            self.set_state(WorkerState::Inferring);
            let quality = self.ctx.settings.quality();
            let texts = [chunk.text];
            let waveform = match engine.infer(&texts, &languages, style, quality, request.speed) {
                Ok((waveform, _meta)) => waveform,
                Err(e) => {
                    warn!("Chunk {} produced no audio: {}", chunk.ordinal, e);
                    continue;
                }
            };

            if self.cancelled() {
                debug!("Cancelled during inference of chunk {}", chunk.ordinal);
                return RequestOutcome::Cancelled;
            }
            if waveform.is_empty() {
                debug!("Chunk {} synthesized to silence", chunk.ordinal);
                continue;
            }

            self.set_state(WorkerState::PostProcessing);
            let volume = self.ctx.settings.volume();
            let pcm = postprocess::process_waveform(&waveform, volume, options.gain);

            self.set_state(WorkerState::Feeding);
            if self.cancelled() {
                debug!("Discarding audio for chunk {} after cancel", chunk.ordinal);
                return RequestOutcome::Cancelled;
            }
            self.feed(pcm, chunk.ordinal);
        }

        RequestOutcome::Completed
    }

    fn feed(&self, pcm: PcmBuffer, ordinal: usize) {
        let Some(sink) = self.ctx.resources.sink() else {
            debug!("No audio sink open; dropping chunk {}", ordinal);
            return;
        };

        let len = pcm.len();
        match sink.feed(pcm) {
            Ok(()) => debug!("Fed chunk {} ({} bytes)", ordinal, len),
            Err(e) => warn!("Audio sink rejected chunk {}: {}", ordinal, e),
        }
    }

    fn report_index(&self, request: &SpeechRequest, outcome: RequestOutcome) {
        self.set_state(WorkerState::ReportingIndex);
        let Some(marker) = request.index else {
            return;
        };
        if outcome == RequestOutcome::Completed && !self.cancelled() {
            self.ctx.observer.on_index_reached(marker);
        }
    }
}

/// Owner's handle on the worker thread
pub struct WorkerHandle {
    queue: Arc<RequestQueue>,
    shutdown: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Start the worker thread
    pub fn spawn(ctx: WorkerContext) -> Result<Self> {
        let queue = Arc::clone(&ctx.queue);
        let shutdown = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));

        let worker = SynthesisWorker {
            ctx,
            shutdown: Arc::clone(&shutdown),
            state: Arc::clone(&state),
        };

        let thread = thread::Builder::new()
            .name("synth-worker".to_string())
            .spawn(move || worker.run())
            .map_err(|e| SynthError::Other(format!("Failed to start synthesis worker: {}", e)))?;

        Ok(Self {
            queue,
            shutdown,
            state,
            thread: Some(thread),
        })
    }

    /// Queue a request behind any already pending
    pub fn enqueue(&self, request: SpeechRequest) {
        self.queue.push(request);
    }

    /// Abandon the current request and drop pending ones
    ///
    /// Returns the number of pending requests dropped.
    pub fn request_cancel(&self) -> usize {
        self.queue.cancel()
    }

    /// Ask the worker to exit after abandoning the current request
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.cancel();
        self.queue.wake();
    }

    /// Shut down and wait for the thread to release its resources
    pub fn join(&mut self) {
        self.request_shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Synthesis worker thread panicked");
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True while a request is being processed
    pub fn is_busy(&self) -> bool {
        !matches!(
            self.state(),
            WorkerState::Idle | WorkerState::Dequeuing | WorkerState::Stopped
        )
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.state() != WorkerState::Stopped
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.join();
    }
}
