//! Configuration management

use crate::speech::backends::{CommandSpec, RawSampleFormat};
use crate::speech::chunker::DEFAULT_MAX_CHUNK_LEN;
use crate::speech::driver::{DriverConfig, DEFAULT_SPEED};
use crate::speech::gateway::{DEFAULT_QUALITY, QUALITY_RANGE};
use crate::speech::postprocess::DEFAULT_GAIN;
use crate::speech::settings::DEFAULT_VOLUME;
use crate::speech::sink::SinkFormat;
use crate::speech::voices::{Language, Voice};
use crate::speech::worker::{WorkerOptions, DEFAULT_POLL_INTERVAL};
use crate::{Result, SynthError, APP_NAME};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default engine program, looked up on PATH
pub const DEFAULT_ENGINE_COMMAND: &str = "streamsynth-engine";

/// Default engine arguments
pub const DEFAULT_ENGINE_ARGS: &str =
    "--model {model_dir} --style {style} --lang {lang} --steps {steps} --speed {speed}";

/// Default sample rate for engine output and playback
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Where synthesized audio goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    PulseAudio,
    Wav,
}

impl FromStr for SinkKind {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pulseaudio" | "pulse" | "pacat" => Ok(SinkKind::PulseAudio),
            "wav" | "file" => Ok(SinkKind::Wav),
            other => Err(SynthError::Config(format!("Unknown audio sink: {}", other))),
        }
    }
}

/// Settings persisted in ~/.streamsynth.cfg
///
/// Sections:
/// - `[speech]` voice, language and synthesis parameters
/// - `[engine]` model location and the engine command line
/// - `[audio]` output sink and stream format
pub struct Config {
    ini: Ini,
    path: PathBuf,
}

impl Config {
    /// Load ~/.streamsynth.cfg, creating it with defaults if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load a config file, creating it with defaults if missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| SynthError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| SynthError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| SynthError::Config(format!("Failed to save config: {}", e)))
    }

    fn config_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(format!(".{}.cfg", APP_NAME))
    }

    fn default_model_dir() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("models")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("voice", Voice::default().id())
            .set("language", Language::default().code())
            .set("volume", DEFAULT_VOLUME.to_string())
            .set("quality", DEFAULT_QUALITY.to_string())
            .set("speed", DEFAULT_SPEED.to_string())
            .set("gain", DEFAULT_GAIN.to_string())
            .set("max_chunk_len", DEFAULT_MAX_CHUNK_LEN.to_string())
            .set("save_settings", "true");

        ini.with_section(Some("engine"))
            .set("model_dir", Self::default_model_dir().to_string_lossy())
            .set("command", DEFAULT_ENGINE_COMMAND)
            .set("args", DEFAULT_ENGINE_ARGS)
            .set("sample_format", "f32le");

        ini.with_section(Some("audio"))
            .set("sink", "pulseaudio")
            .set("wav_path", format!("{}.wav", APP_NAME))
            .set("sample_rate", DEFAULT_SAMPLE_RATE.to_string())
            .set("poll_interval_ms", DEFAULT_POLL_INTERVAL.as_millis().to_string());

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .filter(|v: &f32| v.is_finite())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Integer setting that must fall in `range`; anything else is replaced
    /// by the default
    fn get_ranged<T>(&self, section: &str, key: &str, default: T, range: std::ops::RangeInclusive<T>) -> T
    where
        T: Copy + PartialOrd + TryFrom<i64> + Into<i64>,
    {
        let value = self.get_int(section, key, default.into());
        match T::try_from(value) {
            Ok(v) if range.contains(&v) => v,
            _ => {
                warn!("Ignoring out of range {}.{} = {}", section, key, value);
                default
            }
        }
    }

    // [speech]

    pub fn voice(&self) -> Result<Voice> {
        self.get_string("speech", "voice", Voice::default().id()).parse()
    }

    pub fn language(&self) -> Result<Language> {
        self.get_string("speech", "language", Language::default().code()).parse()
    }

    /// Volume percentage (0-100)
    pub fn volume(&self) -> u8 {
        self.get_ranged("speech", "volume", DEFAULT_VOLUME, 0..=100)
    }

    /// Quality steps (1-15)
    pub fn quality(&self) -> u8 {
        self.get_ranged("speech", "quality", DEFAULT_QUALITY, QUALITY_RANGE)
    }

    /// Whether changes made while running are written back to the file
    pub fn save_settings(&self) -> bool {
        self.get_bool("speech", "save_settings", true)
    }

    /// Record a `[speech]` value changed while running
    pub fn remember(&mut self, key: &str, value: &str) -> Result<()> {
        self.set("speech", key, value);
        if self.save_settings() {
            self.save()?;
        }
        Ok(())
    }

    pub fn speed(&self) -> f32 {
        self.get_float("speech", "speed", DEFAULT_SPEED)
    }

    pub fn gain(&self) -> f32 {
        self.get_float("speech", "gain", DEFAULT_GAIN)
    }

    pub fn max_chunk_len(&self) -> usize {
        let len = self.get_ranged("speech", "max_chunk_len", DEFAULT_MAX_CHUNK_LEN as u32, 1..=u32::MAX);
        len as usize
    }

    // [engine]

    /// Model root; a leading `~/` is expanded
    pub fn model_dir(&self) -> PathBuf {
        let raw = self.get_string("engine", "model_dir", "");
        if raw.trim().is_empty() {
            return Self::default_model_dir();
        }
        expand_home(raw.trim())
    }

    pub fn command(&self) -> String {
        self.get_string("engine", "command", DEFAULT_ENGINE_COMMAND)
    }

    /// Engine arguments, split on whitespace
    pub fn args(&self) -> Vec<String> {
        self.get_string("engine", "args", DEFAULT_ENGINE_ARGS)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    pub fn sample_format(&self) -> Result<RawSampleFormat> {
        self.get_string("engine", "sample_format", "f32le").parse()
    }

    pub fn command_spec(&self) -> Result<CommandSpec> {
        Ok(CommandSpec {
            program: self.command(),
            args: self.args(),
            sample_rate: self.sample_rate(),
            format: self.sample_format()?,
        })
    }

    // [audio]

    pub fn sink(&self) -> Result<SinkKind> {
        self.get_string("audio", "sink", "pulseaudio").parse()
    }

    pub fn wav_path(&self) -> PathBuf {
        expand_home(&self.get_string("audio", "wav_path", &format!("{}.wav", APP_NAME)))
    }

    pub fn sample_rate(&self) -> u32 {
        self.get_ranged("audio", "sample_rate", DEFAULT_SAMPLE_RATE, 8_000..=192_000)
    }

    pub fn poll_interval(&self) -> Duration {
        let default = DEFAULT_POLL_INTERVAL.as_millis() as u32;
        Duration::from_millis(self.get_ranged("audio", "poll_interval_ms", default, 1..=10_000).into())
    }

    /// Build the driver settings from this config
    pub fn driver_config(&self) -> Result<DriverConfig> {
        Ok(DriverConfig {
            model_dir: self.model_dir(),
            voice: self.voice()?,
            language: self.language()?,
            volume: self.volume(),
            quality: self.quality(),
            speed: self.speed(),
            worker: WorkerOptions {
                max_chunk_len: self.max_chunk_len(),
                gain: self.gain(),
                poll_interval: self.poll_interval(),
            },
            sink_format: SinkFormat::speech(self.sample_rate()),
        })
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
