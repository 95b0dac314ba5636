//! Data carried through the synthesis pipeline

use super::style::StyleHandle;
use super::voices::Language;

/// Opaque navigation token echoed back once its audio has played
pub type IndexMarker = u32;

/// One element of a speech sequence handed to the driver by the host
///
/// Text items are concatenated into a single utterance; the last index
/// marker in the sequence is the one reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechItem {
    /// Text to speak
    Text(String),
    /// Marker to report once everything before it has been spoken
    Index(IndexMarker),
}

impl From<&str> for SpeechItem {
    fn from(text: &str) -> Self {
        SpeechItem::Text(text.to_string())
    }
}

impl From<String> for SpeechItem {
    fn from(text: String) -> Self {
        SpeechItem::Text(text)
    }
}

/// A single utterance waiting for (or undergoing) synthesis
///
/// Style, language and speed are captured when the request is built so a
/// voice change while an older request is playing cannot affect it.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub language: Language,
    /// `None` when no style has been loaded yet
    pub style: Option<StyleHandle>,
    pub speed: f32,
    pub index: Option<IndexMarker>,
}

impl SpeechRequest {
    /// Build a request from a host speech sequence
    ///
    /// Returns `None` when the sequence has neither speakable text nor an
    /// index marker, since such a request would do nothing at all.
    pub fn from_items(
        items: &[SpeechItem],
        language: Language,
        style: Option<StyleHandle>,
        speed: f32,
    ) -> Option<Self> {
        let mut text = String::new();
        let mut index = None;

        for item in items {
            match item {
                SpeechItem::Text(part) => text.push_str(part),
                SpeechItem::Index(marker) => index = Some(*marker),
            }
        }

        if text.trim().is_empty() && index.is_none() {
            return None;
        }

        Some(Self {
            text,
            language,
            style,
            speed,
            index,
        })
    }

    /// True if there is nothing to synthesize
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An ordered slice of a request's text, played as an atomic unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Playback position within the request, starting at 0
    pub ordinal: usize,
}

/// Floating point audio produced by the inference engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Quantized little-endian 16-bit PCM ready for an audio sink
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcmBuffer {
    bytes: Vec<u8>,
}

impl PcmBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode back into samples (two bytes each)
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}
