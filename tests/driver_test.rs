//! Driver façade tests
//!
//! Run the full driver against a temporary model directory with a mock
//! engine and sink.

mod common;

use common::{Event, MockGateway, RecordingObserver, RecordingSink, WAIT};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use streamsynth::speech::worker::WorkerOptions;
use streamsynth::speech::{
    AudioSink, Collaborators, DriverConfig, InferenceGateway, JsonStyleLoader, Language,
    SinkFormat, SpeechItem, SynthDriver, Voice, WorkerState,
};
use streamsynth::{Result, SynthError};
use tempfile::TempDir;

/// Model directory with the engine config and the F1 and M2 styles
fn model_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("onnx")).unwrap();
    fs::create_dir_all(dir.path().join("voice_styles")).unwrap();
    fs::write(dir.path().join("onnx/tts.json"), "{}").unwrap();
    for voice in ["F1", "M2"] {
        fs::write(
            dir.path().join("voice_styles").join(format!("{}.json", voice)),
            format!(r#"{{"voice": "{}"}}"#, voice),
        )
        .unwrap();
    }
    dir
}

fn config(dir: &Path) -> DriverConfig {
    DriverConfig {
        worker: WorkerOptions {
            poll_interval: Duration::from_millis(10),
            ..WorkerOptions::default()
        },
        ..DriverConfig::new(dir)
    }
}

struct Mocks {
    gateway: Arc<MockGateway>,
    sink: Arc<RecordingSink>,
    observer: Arc<RecordingObserver>,
}

impl Mocks {
    fn new() -> Self {
        Self {
            gateway: MockGateway::new(),
            sink: RecordingSink::new(),
            observer: RecordingObserver::new(),
        }
    }

    fn collaborators(&self) -> Collaborators {
        let gateway = self.gateway.clone();
        let sink = self.sink.clone();
        Collaborators {
            engine: Arc::new(move |_: &Path| -> Result<Arc<dyn InferenceGateway>> {
                Ok(gateway.clone())
            }),
            styles: Arc::new(JsonStyleLoader),
            sink: Arc::new(move |_: &SinkFormat| -> Result<Arc<dyn AudioSink>> {
                Ok(sink.clone())
            }),
            observer: self.observer.clone(),
        }
    }

    /// Collaborators whose engine load waits for a message on the returned
    /// channel
    fn gated_collaborators(&self) -> (Collaborators, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel::<()>();
        let gate = Mutex::new(rx);
        let gateway = self.gateway.clone();
        let mut collaborators = self.collaborators();
        collaborators.engine = Arc::new(move |_: &Path| -> Result<Arc<dyn InferenceGateway>> {
            gate.lock()
                .recv_timeout(WAIT)
                .map_err(|_| SynthError::Asset("engine never released".to_string()))?;
            Ok(gateway.clone())
        });
        (collaborators, tx)
    }

    fn style_paths(&self) -> Vec<PathBuf> {
        self.gateway.calls().into_iter().map(|c| c.style).collect()
    }
}

fn ready_driver(dir: &TempDir, mocks: &Mocks) -> SynthDriver {
    let driver = SynthDriver::new(config(dir.path()), mocks.collaborators()).unwrap();
    assert!(driver.wait_ready(WAIT), "driver should initialize");
    driver
}

#[test]
fn test_speaks_once_ready() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);
    assert!(driver.is_ready());

    driver.speak(&["Hello there.".into(), SpeechItem::Index(3)]);

    assert!(mocks.observer.wait_for_done(1));
    assert_eq!(mocks.observer.events(), vec![Event::Index(3), Event::Done]);
    assert_eq!(mocks.sink.fed().len(), 1);

    let calls = mocks.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].style.ends_with("voice_styles/F1.json"));
    assert_eq!(calls[0].speed, 1.05);
    assert_eq!(calls[0].quality, 5);
}

#[test]
fn test_items_are_joined_and_last_index_wins() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    driver.speak(&[
        "First part, ".into(),
        SpeechItem::Index(1),
        "second part.".into(),
        SpeechItem::Index(2),
    ]);

    assert!(mocks.observer.wait_for_done(1));
    assert_eq!(mocks.observer.events(), vec![Event::Index(2), Event::Done]);
    assert_eq!(mocks.gateway.calls()[0].text, "First part, second part.");
}

#[test]
fn test_missing_engine_config_leaves_driver_inactive() {
    let dir = model_dir();
    fs::remove_file(dir.path().join("onnx/tts.json")).unwrap();
    let mocks = Mocks::new();

    let driver = SynthDriver::new(config(dir.path()), mocks.collaborators()).unwrap();
    assert!(!driver.wait_ready(WAIT));
    assert!(!driver.is_ready());

    driver.speak(&["Anyone there?".into(), SpeechItem::Index(1)]);
    thread::sleep(Duration::from_millis(100));
    assert!(mocks.observer.events().is_empty());
    assert!(mocks.gateway.calls().is_empty());
}

#[test]
fn test_sink_failure_leaves_driver_inactive() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let mut collaborators = mocks.collaborators();
    collaborators.sink = Arc::new(|_: &SinkFormat| -> Result<Arc<dyn AudioSink>> {
        Err(SynthError::Sink("no device".to_string()))
    });

    let driver = SynthDriver::new(config(dir.path()), collaborators).unwrap();
    assert!(!driver.wait_ready(WAIT));
}

#[test]
fn test_speak_before_ready_is_ignored() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let (collaborators, release) = mocks.gated_collaborators();

    let driver = SynthDriver::new(config(dir.path()), collaborators).unwrap();
    assert!(!driver.is_ready());
    assert!(!driver.wait_ready(Duration::from_millis(20)));
    driver.speak(&["Too early.".into(), SpeechItem::Index(1)]);

    release.send(()).unwrap();
    assert!(driver.wait_ready(WAIT));
    thread::sleep(Duration::from_millis(50));
    assert!(mocks.observer.events().is_empty());

    driver.speak(&["Now.".into(), SpeechItem::Index(2)]);
    assert!(mocks.observer.wait_for_done(1));
    assert_eq!(mocks.observer.events(), vec![Event::Index(2), Event::Done]);
}

#[test]
fn test_voice_change_reloads_style() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    driver.set_voice(Voice::M2).unwrap();
    assert_eq!(driver.voice(), Voice::M2);

    driver.speak(&["New voice.".into()]);
    assert!(mocks.observer.wait_for_done(1));
    assert!(mocks.style_paths()[0].ends_with("voice_styles/M2.json"));
}

#[test]
fn test_failed_voice_change_keeps_previous_style() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    // No style file for M3
    assert!(driver.set_voice(Voice::M3).is_err());
    assert_eq!(driver.voice(), Voice::F1);

    driver.speak(&["Same voice.".into()]);
    assert!(mocks.observer.wait_for_done(1));
    assert!(mocks.style_paths()[0].ends_with("voice_styles/F1.json"));
}

#[test]
fn test_voice_selected_during_initialization() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let (collaborators, release) = mocks.gated_collaborators();

    let driver = SynthDriver::new(config(dir.path()), collaborators).unwrap();
    // Engine not loaded yet, so nothing is read from disk here
    driver.set_voice(Voice::M2).unwrap();
    release.send(()).unwrap();
    assert!(driver.wait_ready(WAIT));

    driver.speak(&["Chosen early.".into()]);
    assert!(mocks.observer.wait_for_done(1));
    assert!(mocks.style_paths()[0].ends_with("voice_styles/M2.json"));
}

#[test]
fn test_language_is_captured_per_request() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    driver.set_language(Language::French);
    assert_eq!(driver.language(), Language::French);
    driver.speak(&["Bonjour.".into()]);
    assert!(mocks.observer.wait_for_done(1));
    assert_eq!(mocks.gateway.calls()[0].language, Language::French);
}

#[test]
fn test_setting_validation() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    assert!(driver.set_volume(75).is_ok());
    assert_eq!(driver.volume(), 75);
    assert!(matches!(driver.set_volume(101), Err(SynthError::InvalidSetting(_))));
    assert_eq!(driver.volume(), 75);

    assert!(driver.set_quality(15).is_ok());
    assert!(driver.set_quality(0).is_err());
    assert!(driver.set_quality(16).is_err());
    assert_eq!(driver.quality(), 15);

    let bad = DriverConfig {
        volume: 120,
        ..config(dir.path())
    };
    assert!(SynthDriver::new(bad, mocks.collaborators()).is_err());
}

#[test]
fn test_cancel_stops_sink_and_discards_audio() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    mocks.gateway.hold();
    driver.speak(&["Long text being read.".into(), SpeechItem::Index(1)]);
    assert!(mocks.gateway.wait_for_calls(1));
    assert!(driver.is_speaking());
    driver.speak(&["Waiting behind it.".into()]);
    assert_eq!(driver.pending(), 1);

    driver.cancel();
    assert_eq!(driver.pending(), 0);
    assert_eq!(mocks.sink.stops(), 1);
    mocks.gateway.release();

    assert!(mocks.observer.wait_for_done(1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(mocks.observer.events(), vec![Event::Done]);
    assert!(mocks.sink.fed().is_empty());
    assert!(!driver.is_speaking());
}

#[test]
fn test_is_speaking_until_last_request_done() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    for round in 1..=20u32 {
        driver.speak(&["Short.".into()]);
        let deadline = std::time::Instant::now() + WAIT;
        while driver.is_speaking() {
            assert!(std::time::Instant::now() < deadline, "still speaking in round {}", round);
            thread::yield_now();
        }
        // Idle is only reported once the request has finished
        assert_eq!(mocks.observer.done_count(), round as usize);
    }
}

#[test]
fn test_blank_speak_enqueues_nothing() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    driver.speak(&["   ".into()]);
    driver.speak(&[]);
    thread::sleep(Duration::from_millis(50));
    assert!(mocks.observer.events().is_empty());

    driver.speak(&[SpeechItem::Index(6)]);
    assert!(mocks.observer.wait_for_done(1));
    assert_eq!(mocks.observer.events(), vec![Event::Index(6), Event::Done]);
    assert!(mocks.sink.fed().is_empty());
}

#[test]
fn test_terminate_is_idempotent() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let mut driver = ready_driver(&dir, &mocks);

    driver.terminate();
    assert_eq!(driver.worker_state(), WorkerState::Stopped);
    assert!(mocks.sink.is_closed());

    driver.terminate();
    driver.speak(&["After the end.".into()]);
    thread::sleep(Duration::from_millis(50));
    assert!(mocks.gateway.calls().is_empty());
}

#[test]
fn test_terminate_during_initialization() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let (collaborators, release) = mocks.gated_collaborators();

    let mut driver = SynthDriver::new(config(dir.path()), collaborators).unwrap();
    let terminating = thread::spawn(move || {
        driver.terminate();
        driver
    });
    thread::sleep(Duration::from_millis(50));
    release.send(()).unwrap();
    let driver = terminating.join().unwrap();

    // The sink opened after terminate began is closed again, never used
    assert!(!driver.is_ready());
    assert!(mocks.sink.is_closed());
    assert!(mocks.gateway.calls().is_empty());
}

#[test]
fn test_capabilities() {
    let dir = model_dir();
    let mocks = Mocks::new();
    let driver = ready_driver(&dir, &mocks);

    let voices: Vec<&str> = driver.available_voices().iter().map(|v| v.id()).collect();
    assert_eq!(voices.len(), 10);
    assert!(voices.contains(&"M1") && voices.contains(&"F5"));

    let languages: Vec<&str> = driver.available_languages().iter().map(|l| l.code()).collect();
    assert_eq!(languages, vec!["en", "ko", "es", "pt", "fr"]);

    assert_eq!(driver.quality_range(), 1..=15);
}
