//! Inference engine boundary
//!
//! The neural engine itself lives outside this crate. The worker only needs
//! something that turns text into a waveform, blocking until it is done.

use super::request::Waveform;
use super::style::StyleHandle;
use super::voices::Language;
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Valid range for the quality (denoising steps) control
pub const QUALITY_RANGE: std::ops::RangeInclusive<u8> = 1..=15;

/// Default quality
pub const DEFAULT_QUALITY: u8 = 5;

/// Extra information returned alongside a waveform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceMeta {
    /// Duration in seconds of the audio produced for each input text
    pub durations: Vec<f32>,
}

/// Text-to-waveform engine
///
/// The API is batch shaped, but the synthesis worker always passes exactly
/// one text and one language per call to keep time-to-first-sound low.
pub trait InferenceGateway: Send + Sync {
    fn infer(
        &self,
        texts: &[String],
        languages: &[Language],
        style: &StyleHandle,
        quality_steps: u8,
        speed: f32,
    ) -> Result<(Waveform, InferenceMeta)>;
}

/// Loads an engine from the model's `onnx/` directory
///
/// Called once on the driver's initialization thread.
pub trait EngineLoader: Send + Sync {
    fn load_engine(&self, onnx_dir: &Path) -> Result<Arc<dyn InferenceGateway>>;
}

impl<F> EngineLoader for F
where
    F: Fn(&Path) -> Result<Arc<dyn InferenceGateway>> + Send + Sync,
{
    fn load_engine(&self, onnx_dir: &Path) -> Result<Arc<dyn InferenceGateway>> {
        self(onnx_dir)
    }
}
