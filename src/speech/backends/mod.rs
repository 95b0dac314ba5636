//! Concrete engine and audio backends

// External program as the inference engine
pub mod command;

// pacat playback for PulseAudio, PipeWire and WSLg
pub mod pulseaudio;

// WAV file recording via hound
pub mod wav;

pub use command::{CommandEngineLoader, CommandGateway, CommandSpec, RawSampleFormat};
pub use pulseaudio::{PulseAudioOpener, PulseAudioSink};
pub use wav::{WavFileOpener, WavFileSink};
