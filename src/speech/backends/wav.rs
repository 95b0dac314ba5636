//! Sink that records speech to a WAV file
//!
//! Useful on machines without a sound server and for checking engine
//! output offline. `stop` only flushes; nothing already written is removed.

use crate::speech::request::PcmBuffer;
use crate::speech::sink::{AudioSink, SinkFormat, SinkOpener};
use crate::{Result, SynthError};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, warn};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct WavFileSink {
    path: PathBuf,
    writer: Mutex<Option<WavWriter<BufWriter<File>>>>,
}

impl WavFileSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>, format: &SinkFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: SampleFormat::Int,
        };
        debug!("Recording speech to {}", path.display());
        let writer = WavWriter::create(&path, spec)?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSink for WavFileSink {
    fn feed(&self, pcm: PcmBuffer) -> Result<()> {
        let mut writer = self.writer.lock();
        let writer = writer
            .as_mut()
            .ok_or_else(|| SynthError::Sink(format!("{} is closed", self.path.display())))?;

        for sample in pcm.samples() {
            writer.write_sample(sample)?;
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl Drop for WavFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to finalize {}: {}", self.path.display(), e);
        }
    }
}

/// Opens a [`WavFileSink`] at a fixed path
#[derive(Debug, Clone)]
pub struct WavFileOpener {
    path: PathBuf,
}

impl WavFileOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SinkOpener for WavFileOpener {
    fn open(&self, format: &SinkFormat) -> Result<Arc<dyn AudioSink>> {
        Ok(Arc::new(WavFileSink::create(&self.path, format)?))
    }
}
