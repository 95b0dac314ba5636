//! Settings shared between the driver and the synthesis worker
//!
//! The driver is the only writer. Volume and quality are atomics the worker
//! reads again for every chunk, so changes apply mid-utterance. Voice,
//! language and style are copied into each request when it is queued.

use super::gateway::{DEFAULT_QUALITY, QUALITY_RANGE};
use super::style::StyleHandle;
use super::voices::{Language, Voice};
use crate::{Result, SynthError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Default volume percentage
pub const DEFAULT_VOLUME: u8 = 50;

#[derive(Debug)]
pub struct LiveSettings {
    volume: AtomicU8,
    quality: AtomicU8,
    voice: RwLock<Voice>,
    language: RwLock<Language>,
    style: RwLock<Option<StyleHandle>>,
}

impl LiveSettings {
    /// Create settings, validating the numeric values
    pub fn new(voice: Voice, language: Language, volume: u8, quality: u8) -> Result<Self> {
        let settings = Self::default();
        *settings.voice.write() = voice;
        *settings.language.write() = language;
        settings.set_volume(volume)?;
        settings.set_quality(quality)?;
        Ok(settings)
    }

    /// Volume percentage (0-100)
    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: u8) -> Result<()> {
        if volume > 100 {
            return Err(SynthError::InvalidSetting(format!(
                "Volume must be 0-100, got {}",
                volume
            )));
        }
        self.volume.store(volume, Ordering::Relaxed);
        Ok(())
    }

    /// Quality steps forwarded to the engine (1-15)
    pub fn quality(&self) -> u8 {
        self.quality.load(Ordering::Relaxed)
    }

    pub fn set_quality(&self, quality: u8) -> Result<()> {
        if !QUALITY_RANGE.contains(&quality) {
            return Err(SynthError::InvalidSetting(format!(
                "Quality must be {}-{}, got {}",
                QUALITY_RANGE.start(),
                QUALITY_RANGE.end(),
                quality
            )));
        }
        self.quality.store(quality, Ordering::Relaxed);
        Ok(())
    }

    pub fn voice(&self) -> Voice {
        *self.voice.read()
    }

    pub fn set_voice(&self, voice: Voice) {
        *self.voice.write() = voice;
    }

    pub fn language(&self) -> Language {
        *self.language.read()
    }

    pub fn set_language(&self, language: Language) {
        *self.language.write() = language;
    }

    /// Currently loaded style, if any
    pub fn style(&self) -> Option<StyleHandle> {
        self.style.read().clone()
    }

    pub fn set_style(&self, style: StyleHandle) {
        *self.style.write() = Some(style);
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            volume: AtomicU8::new(DEFAULT_VOLUME),
            quality: AtomicU8::new(DEFAULT_QUALITY),
            voice: RwLock::new(Voice::default()),
            language: RwLock::new(Language::default()),
            style: RwLock::new(None),
        }
    }
}
