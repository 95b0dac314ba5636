//! Streaming speech synthesis
//!
//! Text goes in through [`SynthDriver`], is cut into chunks by the worker
//! thread, synthesized by an [`InferenceGateway`] and played through an
//! [`AudioSink`].

pub mod assets;
pub mod backends;
pub mod chunker;
pub mod driver;
pub mod gateway;
pub mod observer;
pub mod postprocess;
pub mod queue;
pub mod request;
pub mod settings;
pub mod sink;
pub mod style;
pub mod voices;
pub mod worker;

pub use driver::{Collaborators, DriverConfig, SynthDriver, DEFAULT_SPEED};
pub use gateway::{EngineLoader, InferenceGateway, InferenceMeta};
pub use observer::{LogObserver, SpeechObserver};
pub use request::{IndexMarker, PcmBuffer, SpeechItem, SpeechRequest, Waveform};
pub use sink::{AudioSink, SinkFormat, SinkOpener};
pub use style::{JsonStyleLoader, StyleHandle, StyleLoader};
pub use voices::{Language, Voice};
pub use worker::{WorkerOptions, WorkerState};
