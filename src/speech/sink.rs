//! Audio output boundary

use super::request::PcmBuffer;
use crate::Result;
use std::sync::Arc;

/// What the audio is for; lets backends pick a suitable stream role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPurpose {
    Speech,
}

/// PCM stream format requested when opening a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub purpose: AudioPurpose,
}

impl SinkFormat {
    /// Mono 16-bit speech at the given rate
    pub fn speech(sample_rate: u32) -> Self {
        Self {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            purpose: AudioPurpose::Speech,
        }
    }

    /// Bytes per second of audio in this format
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * u32::from(self.bits_per_sample) / 8
    }
}

impl Default for SinkFormat {
    fn default() -> Self {
        Self::speech(44_100)
    }
}

/// Playback device
///
/// Buffers are played in the order they are fed. `stop` may be called from
/// any thread while another thread is feeding.
pub trait AudioSink: Send + Sync {
    /// Queue a buffer for playback and return without waiting for it to play
    fn feed(&self, pcm: PcmBuffer) -> Result<()>;

    /// Halt playback immediately and discard anything queued
    fn stop(&self) -> Result<()>;

    /// Release the device; further feeds fail. Calling twice is harmless.
    fn close(&self) -> Result<()>;
}

/// Opens the audio sink on the driver's initialization thread
pub trait SinkOpener: Send + Sync {
    fn open(&self, format: &SinkFormat) -> Result<Arc<dyn AudioSink>>;
}

impl<F> SinkOpener for F
where
    F: Fn(&SinkFormat) -> Result<Arc<dyn AudioSink>> + Send + Sync,
{
    fn open(&self, format: &SinkFormat) -> Result<Arc<dyn AudioSink>> {
        self(format)
    }
}
