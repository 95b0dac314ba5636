//! Driver façade
//!
//! The host-facing entry point. Construction returns at once; a background
//! initialization thread verifies the model files, loads the engine and the
//! style of the selected voice, and opens the audio sink. Until that
//! finishes (or if it fails) `speak` does nothing.
//!
//! Nothing here blocks on synthesis. `speak` pushes a request for the
//! worker thread, `cancel` raises the cancellation signal and silences the
//! sink.

use super::assets::AssetLayout;
use super::gateway::{EngineLoader, DEFAULT_QUALITY, QUALITY_RANGE};
use super::observer::SpeechObserver;
use super::queue::RequestQueue;
use super::request::{SpeechItem, SpeechRequest};
use super::settings::{LiveSettings, DEFAULT_VOLUME};
use super::sink::{SinkFormat, SinkOpener};
use super::style::StyleLoader;
use super::voices::{Language, Voice};
use super::worker::{Resources, WorkerContext, WorkerHandle, WorkerOptions, WorkerState};
use crate::{Result, SynthError};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::ops::RangeInclusive;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default speech speed factor
pub const DEFAULT_SPEED: f32 = 1.05;

/// Everything the driver needs to know up front
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Root of the model files (`onnx/` and `voice_styles/`)
    pub model_dir: PathBuf,
    pub voice: Voice,
    pub language: Language,
    pub volume: u8,
    pub quality: u8,
    pub speed: f32,
    pub worker: WorkerOptions,
    pub sink_format: SinkFormat,
}

impl DriverConfig {
    /// Defaults for a model directory
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            voice: Voice::default(),
            language: Language::default(),
            volume: DEFAULT_VOLUME,
            quality: DEFAULT_QUALITY,
            speed: DEFAULT_SPEED,
            worker: WorkerOptions::default(),
            sink_format: SinkFormat::default(),
        }
    }
}

/// External pieces the driver is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn EngineLoader>,
    pub styles: Arc<dyn StyleLoader>,
    pub sink: Arc<dyn SinkOpener>,
    pub observer: Arc<dyn SpeechObserver>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitStatus {
    Pending,
    Ready,
    Failed,
}

/// State shared with the initialization thread
struct Shared {
    layout: AssetLayout,
    settings: Arc<LiveSettings>,
    resources: Arc<Resources>,
    styles: Arc<dyn StyleLoader>,
    status: Mutex<InitStatus>,
    status_changed: Condvar,
    /// Voice whose style is loaded; held while a style is being loaded
    loaded_voice: Mutex<Option<Voice>>,
    terminated: AtomicBool,
}

impl Shared {
    fn set_status(&self, status: InitStatus) {
        *self.status.lock() = status;
        self.status_changed.notify_all();
    }

    fn status(&self) -> InitStatus {
        *self.status.lock()
    }

    fn load_style(&self, voice: Voice) -> Result<()> {
        let path = self.layout.style_path(voice);
        debug!("Loading style for {} from {}", voice, path.display());
        let style = self.styles.load_style(&path)?;
        self.settings.set_style(style);
        Ok(())
    }

    fn initialize(&self, engines: &dyn EngineLoader, sinks: &dyn SinkOpener, format: &SinkFormat) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_initialize(engines, sinks, format)
        }))
        .unwrap_or_else(|_| Err(SynthError::Other("initialization panicked".to_string())));

        match result {
            Ok(true) => {
                info!("Speech driver ready");
                self.set_status(InitStatus::Ready);
            }
            Ok(false) => {
                debug!("Driver terminated during initialization");
                self.set_status(InitStatus::Failed);
            }
            Err(e) => {
                error!("Speech driver initialization failed: {}", e);
                self.set_status(InitStatus::Failed);
            }
        }
    }

    /// Returns false if the driver was terminated before resources could be
    /// handed to the worker
    fn try_initialize(
        &self,
        engines: &dyn EngineLoader,
        sinks: &dyn SinkOpener,
        format: &SinkFormat,
    ) -> Result<bool> {
        info!("Loading speech model from {}", self.layout.root().display());
        if !self.layout.verify() {
            return Err(SynthError::Asset(format!(
                "Engine configuration not found: {}",
                self.layout.engine_config().display()
            )));
        }

        let engine_config = self.layout.read_engine_config()?;
        if let Some(rate) = engine_config.sample_rate() {
            if rate != format.sample_rate {
                warn!(
                    "Model produces {} Hz audio but the sink plays {} Hz",
                    rate, format.sample_rate
                );
            }
        }

        let engine = engines.load_engine(&self.layout.onnx_dir())?;
        let sink = sinks.open(format)?;

        // Voice changes wait here, so the style matches the voice selected
        // when the engine becomes visible
        let mut loaded = self.loaded_voice.lock();
        if self.terminated.load(Ordering::SeqCst) {
            let _ = sink.close();
            return Ok(false);
        }

        let voice = self.settings.voice();
        if let Err(e) = self.load_style(voice) {
            let _ = sink.close();
            return Err(e);
        }
        *loaded = Some(voice);

        self.resources.set_sink(sink);
        self.resources.set_engine(engine);
        Ok(true)
    }
}

/// Streaming speech synthesizer driver
pub struct SynthDriver {
    shared: Arc<Shared>,
    queue: Arc<RequestQueue>,
    speed: f32,
    worker: WorkerHandle,
    init_thread: Option<JoinHandle<()>>,
}

impl SynthDriver {
    /// Start the worker and the background initialization
    ///
    /// Fails only for invalid settings or if a thread cannot be started.
    pub fn new(config: DriverConfig, collaborators: Collaborators) -> Result<Self> {
        info!(
            "Creating speech driver: voice {}, language {}, model {}",
            config.voice,
            config.language,
            config.model_dir.display()
        );

        let settings = Arc::new(LiveSettings::new(
            config.voice,
            config.language,
            config.volume,
            config.quality,
        )?);
        let resources = Arc::new(Resources::new());
        let queue = Arc::new(RequestQueue::new());

        let worker = WorkerHandle::spawn(WorkerContext {
            queue: Arc::clone(&queue),
            settings: Arc::clone(&settings),
            resources: Arc::clone(&resources),
            observer: Arc::clone(&collaborators.observer),
            options: config.worker,
        })?;

        let shared = Arc::new(Shared {
            layout: AssetLayout::new(config.model_dir),
            settings,
            resources,
            styles: collaborators.styles,
            status: Mutex::new(InitStatus::Pending),
            status_changed: Condvar::new(),
            loaded_voice: Mutex::new(None),
            terminated: AtomicBool::new(false),
        });

        let init_shared = Arc::clone(&shared);
        let engines = collaborators.engine;
        let sinks = collaborators.sink;
        let format = config.sink_format;
        let init_thread = thread::Builder::new()
            .name("synth-init".to_string())
            .spawn(move || init_shared.initialize(engines.as_ref(), sinks.as_ref(), &format))
            .map_err(|e| SynthError::Other(format!("Failed to start initialization: {}", e)))?;

        Ok(Self {
            shared,
            queue,
            speed: config.speed,
            worker,
            init_thread: Some(init_thread),
        })
    }

    /// True once the engine, style and sink are all loaded
    pub fn is_ready(&self) -> bool {
        self.shared.status() == InitStatus::Ready
    }

    /// Wait until initialization has finished
    ///
    /// Returns whether the driver is ready; false on failure or timeout.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        while *status == InitStatus::Pending {
            if self
                .shared
                .status_changed
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                break;
            }
        }
        *status == InitStatus::Ready
    }

    /// Queue a speech sequence behind anything already pending
    ///
    /// Does nothing until the driver is ready.
    pub fn speak(&self, items: &[SpeechItem]) {
        if !self.is_ready() || self.shared.terminated.load(Ordering::SeqCst) {
            debug!("Speech driver not ready; ignoring speak");
            return;
        }

        let settings = &self.shared.settings;
        match SpeechRequest::from_items(items, settings.language(), settings.style(), self.speed) {
            Some(request) => self.worker.enqueue(request),
            None => debug!("Nothing to speak"),
        }
    }

    /// Stop speaking and drop everything queued
    pub fn cancel(&self) {
        let dropped = self.worker.request_cancel();
        debug!("Cancelled speech, dropped {} pending requests", dropped);
        self.shared.resources.stop_sink();
    }

    /// Stop the worker and release the engine and sink
    ///
    /// Waits for both background threads. Calling it again does nothing.
    pub fn terminate(&mut self) {
        if self.shared.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Terminating speech driver");

        self.worker.join();
        if let Some(thread) = self.init_thread.take() {
            if thread.join().is_err() {
                error!("Initialization thread panicked");
            }
        }
        self.shared.resources.release();
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Number of requests waiting behind the current one
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True while a request is queued or being synthesized
    pub fn is_speaking(&self) -> bool {
        self.queue.has_work()
    }

    pub fn voice(&self) -> Voice {
        self.shared.settings.voice()
    }

    /// Select a voice
    ///
    /// Once the engine is loaded this reloads the style at once; if that
    /// fails the previous voice and style stay in effect.
    pub fn set_voice(&self, voice: Voice) -> Result<()> {
        let shared = &self.shared;
        let mut loaded = shared.loaded_voice.lock();
        let previous = shared.settings.voice();
        shared.settings.set_voice(voice);

        if !shared.resources.has_engine() || *loaded == Some(voice) {
            return Ok(());
        }

        match shared.load_style(voice) {
            Ok(()) => {
                info!("Voice changed to {}", voice);
                *loaded = Some(voice);
                Ok(())
            }
            Err(e) => {
                warn!("Keeping voice {}: {}", previous, e);
                shared.settings.set_voice(previous);
                Err(e)
            }
        }
    }

    pub fn language(&self) -> Language {
        self.shared.settings.language()
    }

    /// Select the language for requests queued from now on
    pub fn set_language(&self, language: Language) {
        self.shared.settings.set_language(language);
    }

    pub fn volume(&self) -> u8 {
        self.shared.settings.volume()
    }

    /// Set the volume (0-100); applies from the next chunk
    pub fn set_volume(&self, volume: u8) -> Result<()> {
        self.shared.settings.set_volume(volume)
    }

    pub fn quality(&self) -> u8 {
        self.shared.settings.quality()
    }

    /// Set the quality steps; applies from the next chunk
    pub fn set_quality(&self, quality: u8) -> Result<()> {
        self.shared.settings.set_quality(quality)
    }

    pub fn available_voices(&self) -> &'static [Voice] {
        &Voice::ALL
    }

    pub fn available_languages(&self) -> &'static [Language] {
        &Language::ALL
    }

    pub fn quality_range(&self) -> RangeInclusive<u8> {
        QUALITY_RANGE
    }
}

impl Drop for SynthDriver {
    fn drop(&mut self) {
        self.terminate();
    }
}
