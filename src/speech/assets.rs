//! On-disk model layout
//!
//! ```text
//! <root>/onnx/tts.json
//! <root>/onnx/unicode_indexer.json
//! <root>/onnx/*.onnx
//! <root>/voice_styles/<VOICE>.json
//! ```

use super::voices::Voice;
use crate::{Result, SynthError};
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine files expected under `onnx/`
pub const ENGINE_FILES: &[&str] = &[
    "tts.json",
    "unicode_indexer.json",
    "duration_predictor.onnx",
    "text_encoder.onnx",
    "vector_estimator.onnx",
    "vocoder.onnx",
];

/// Engine configuration file; without it the driver cannot start
pub const ENGINE_CONFIG: &str = "tts.json";

/// The parts of `tts.json` this crate looks at; everything else is left to
/// the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ae: Option<AutoencoderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AutoencoderConfig {
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl EngineConfig {
    /// Output sample rate of the model, if it declares one
    pub fn sample_rate(&self) -> Option<u32> {
        self.ae.as_ref().and_then(|ae| ae.sample_rate)
    }
}

/// Paths into a model directory
#[derive(Debug, Clone)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn onnx_dir(&self) -> PathBuf {
        self.root.join("onnx")
    }

    pub fn engine_config(&self) -> PathBuf {
        self.onnx_dir().join(ENGINE_CONFIG)
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.root.join("voice_styles")
    }

    pub fn style_path(&self, voice: Voice) -> PathBuf {
        self.styles_dir().join(voice.style_file_name())
    }

    /// True if the engine configuration file is present
    pub fn has_engine_config(&self) -> bool {
        self.engine_config().exists()
    }

    /// List every expected file that is missing
    pub fn missing_files(&self) -> Vec<PathBuf> {
        let onnx = self.onnx_dir();
        let engine = ENGINE_FILES.iter().map(|name| onnx.join(name));
        let styles = Voice::ALL.iter().map(|&voice| self.style_path(voice));

        engine.chain(styles).filter(|path| !path.exists()).collect()
    }

    /// Parse the engine configuration
    pub fn read_engine_config(&self) -> Result<EngineConfig> {
        let path = self.engine_config();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| SynthError::Asset(format!("Cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| SynthError::Asset(format!("Invalid {}: {}", path.display(), e)))
    }

    /// Log missing optional files; returns false if the engine config is absent
    pub fn verify(&self) -> bool {
        for path in self.missing_files() {
            warn!("Model file missing: {}", path.display());
        }
        self.has_engine_config()
    }
}
