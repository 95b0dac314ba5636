//! Inference through an external program
//!
//! The neural engine is not part of this crate. This gateway runs a
//! configured command once per chunk, writes the chunk text to its stdin and
//! reads raw mono samples back from its stdout.
//!
//! Arguments may contain placeholders that are filled in per call:
//! - `{model_dir}`: model root directory
//! - `{lang}`: language tag (`en`, `ko`, ...)
//! - `{style}`: path of the voice style file
//! - `{steps}`: quality steps (1-15)
//! - `{speed}`: speech speed factor

use crate::speech::gateway::{EngineLoader, InferenceGateway, InferenceMeta};
use crate::speech::request::Waveform;
use crate::speech::style::StyleHandle;
use crate::speech::voices::Language;
use crate::{Result, SynthError};
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::Arc;

/// Sample encoding of the program's stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSampleFormat {
    /// 32-bit float, little-endian
    F32Le,
    /// 16-bit signed integer, little-endian
    S16Le,
}

impl RawSampleFormat {
    fn bytes_per_sample(self) -> usize {
        match self {
            RawSampleFormat::F32Le => 4,
            RawSampleFormat::S16Le => 2,
        }
    }
}

impl FromStr for RawSampleFormat {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f32le" | "f32" | "float" => Ok(RawSampleFormat::F32Le),
            "s16le" | "s16" | "int16" => Ok(RawSampleFormat::S16Le),
            other => Err(SynthError::Config(format!(
                "Unknown sample format: {}",
                other
            ))),
        }
    }
}

/// Decode raw little-endian samples into normalized floats
pub fn decode_samples(bytes: &[u8], format: RawSampleFormat) -> Result<Vec<f32>> {
    let width = format.bytes_per_sample();
    if bytes.len() % width != 0 {
        return Err(SynthError::Inference(format!(
            "Engine output is {} bytes, not a multiple of {}",
            bytes.len(),
            width
        )));
    }

    let samples = match format {
        RawSampleFormat::F32Le => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        RawSampleFormat::S16Le => bytes
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .collect(),
    };
    Ok(samples)
}

/// Command line and output format of the external engine
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Sample rate of the audio the program writes
    pub sample_rate: u32,
    pub format: RawSampleFormat,
}

/// Gateway that spawns the engine program per inference call
#[derive(Debug, Clone)]
pub struct CommandGateway {
    spec: CommandSpec,
    model_dir: PathBuf,
}

impl CommandGateway {
    pub fn new(spec: CommandSpec, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            model_dir: model_dir.into(),
        }
    }

    /// Fill argument placeholders for one call
    fn expand_args(&self, language: Language, style: &Path, steps: u8, speed: f32) -> Vec<String> {
        let model_dir = self.model_dir.to_string_lossy();
        let style = style.to_string_lossy();
        let steps = steps.to_string();
        let speed = speed.to_string();

        self.spec
            .args
            .iter()
            .map(|arg| {
                arg.replace("{model_dir}", &model_dir)
                    .replace("{lang}", language.code())
                    .replace("{style}", &style)
                    .replace("{steps}", &steps)
                    .replace("{speed}", &speed)
            })
            .collect()
    }

    fn run_once(
        &self,
        text: &str,
        language: Language,
        style: &StyleHandle,
        steps: u8,
        speed: f32,
    ) -> Result<Vec<f32>> {
        let args = self.expand_args(language, style.path(), steps, speed);
        debug!("Running engine: {} {:?}", self.spec.program, args);

        let mut child = Command::new(&self.spec.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SynthError::Inference(format!("Failed to start {}: {}", self.spec.program, e))
            })?;

        // Chunks are short, so writing everything before reading can't fill the pipe
        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading closes the pipe early;
            // its exit status below says what went wrong
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                debug!("Engine did not take its input: {}", e);
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            SynthError::Inference(format!("Failed to read from {}: {}", self.spec.program, e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynthError::Inference(format!(
                "{} exited with {}: {}",
                self.spec.program,
                output.status,
                stderr.trim()
            )));
        }

        decode_samples(&output.stdout, self.spec.format)
    }
}

impl InferenceGateway for CommandGateway {
    fn infer(
        &self,
        texts: &[String],
        languages: &[Language],
        style: &StyleHandle,
        quality_steps: u8,
        speed: f32,
    ) -> Result<(Waveform, InferenceMeta)> {
        if texts.len() != languages.len() {
            return Err(SynthError::Inference(format!(
                "Got {} texts but {} languages",
                texts.len(),
                languages.len()
            )));
        }

        let mut samples = Vec::new();
        let mut durations = Vec::with_capacity(texts.len());
        for (text, &language) in texts.iter().zip(languages) {
            let part = self.run_once(text, language, style, quality_steps, speed)?;
            durations.push(part.len() as f32 / self.spec.sample_rate as f32);
            samples.extend(part);
        }

        Ok((
            Waveform::new(samples, self.spec.sample_rate),
            InferenceMeta { durations },
        ))
    }
}

/// Find a program on PATH, or accept an explicit path
fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return path.exists().then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.exists())
}

/// Creates a [`CommandGateway`] for a model directory
#[derive(Debug, Clone)]
pub struct CommandEngineLoader {
    spec: CommandSpec,
}

impl CommandEngineLoader {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl EngineLoader for CommandEngineLoader {
    fn load_engine(&self, onnx_dir: &Path) -> Result<Arc<dyn InferenceGateway>> {
        let program = find_program(&self.spec.program).ok_or_else(|| {
            SynthError::Asset(format!("Engine program not found: {}", self.spec.program))
        })?;
        info!("Using engine program {}", program.display());

        let model_dir = onnx_dir.parent().unwrap_or(onnx_dir);
        Ok(Arc::new(CommandGateway::new(self.spec.clone(), model_dir)))
    }
}
