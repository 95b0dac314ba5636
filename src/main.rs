//! streamsynth main entry point
//!
//! Reads lines from stdin and speaks them. Every plain line interrupts
//! whatever is being said, the way a screen reader does. Lines starting
//! with `:` are commands:
//!
//! ```text
//! :voice ID      select a voice (M1-M5, F1-F5)
//! :lang CODE     select a language (en, ko, es, pt, fr)
//! :volume N      volume 0-100
//! :quality N     quality steps 1-15
//! :stop          stop speaking
//! :queue TEXT    speak after the current utterance
//! :mark N TEXT   speak TEXT, then report index N
//! :voices        list voices and languages
//! :quit          exit
//! ```
//!
//! Voice, language, volume and quality changes are saved to the config
//! file unless `save_settings = false`.

use anyhow::{anyhow, bail, Context};
use log::{debug, error, info, warn};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use streamsynth::speech::backends::{CommandEngineLoader, PulseAudioOpener, WavFileOpener};
use streamsynth::speech::{
    Collaborators, JsonStyleLoader, Language, LogObserver, SinkOpener, SpeechItem, SynthDriver,
    Voice,
};
use streamsynth::state::{Config, SinkKind};

/// Global flag set by the SIGINT/SIGTERM handler
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// How long to wait for the model to load before accepting input
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the input loop checks for a signal
const INPUT_POLL: Duration = Duration::from_millis(100);

#[cfg(unix)]
extern "C" fn handle_shutdown(_: nix::libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

fn main() {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    // Initialize logger
    if debug_mode {
        // Debug mode: write to streamsynth.log
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("streamsynth.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open streamsynth.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "streamsynth version {} starting (debug mode, logging to streamsynth.log)",
            streamsynth::VERSION
        );
    } else {
        // Normal mode: RUST_LOG if set, warnings otherwise
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if let Err(e) = run(&args) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" | "-d" => {}
            "--config" | "-c" => {
                let path = iter.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                return Ok(Some(PathBuf::from(path)));
            }
            other => bail!("Unknown argument: {}\nUsage: streamsynth [--debug] [--config PATH]", other),
        }
    }
    Ok(None)
}

#[cfg(unix)]
fn install_signal_handlers() -> anyhow::Result<()> {
    use nix::sys::signal::{self, SigHandler, Signal};

    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe { signal::signal(sig, SigHandler::Handler(handle_shutdown)) }
            .with_context(|| format!("Failed to set {:?} handler", sig))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers() -> anyhow::Result<()> {
    Ok(())
}

fn collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    let spec = config.command_spec().context("Invalid [engine] settings")?;
    let sink: Arc<dyn SinkOpener> = match config.sink().context("Invalid [audio] settings")? {
        SinkKind::PulseAudio => Arc::new(PulseAudioOpener),
        SinkKind::Wav => Arc::new(WavFileOpener::new(config.wav_path())),
    };

    Ok(Collaborators {
        engine: Arc::new(CommandEngineLoader::new(spec)),
        styles: Arc::new(JsonStyleLoader),
        sink,
        observer: Arc::new(LogObserver),
    })
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let mut config = match config_path(args)? {
        Some(path) => Config::load_from(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    info!("Configuration loaded from {:?}", config.path());

    let driver_config = config.driver_config().context("Invalid [speech] settings")?;
    let mut driver = SynthDriver::new(driver_config, collaborators(&config)?)
        .context("Failed to start speech driver")?;

    install_signal_handlers()?;

    if !driver.wait_ready(READY_TIMEOUT) {
        warn!("Speech driver is not ready; input will be ignored until it is");
        eprintln!("Warning: speech model not loaded (see log)");
    }

    // stdin blocks, so it is read on its own thread and polled here
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("stdin error: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to start stdin reader")?;

    let mut input_closed = false;
    while !SHUTDOWN.load(Ordering::Relaxed) {
        let line = match rx.recv_timeout(INPUT_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed");
                input_closed = true;
                break;
            }
        };

        match parse_line(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = execute(&driver, &mut config, command) {
                    eprintln!("Error: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    if input_closed {
        // Piped input: finish what was asked for before exiting
        while driver.is_speaking() && !SHUTDOWN.load(Ordering::Relaxed) {
            thread::sleep(INPUT_POLL);
        }
    }
    if !input_closed || SHUTDOWN.load(Ordering::Relaxed) {
        driver.cancel();
    }

    info!("Shutting down");
    driver.terminate();
    Ok(())
}

/// One line of input
#[derive(Debug, Clone, PartialEq)]
enum Command {
    /// Interrupt and speak
    Say(String),
    /// Speak after whatever is queued
    Queue(String),
    /// Speak, then report the marker
    Mark(u32, String),
    Stop,
    Voice(Voice),
    Language(Language),
    Volume(u8),
    Quality(u8),
    ListVoices,
    Quit,
}

fn parse_line(line: &str) -> anyhow::Result<Option<Command>> {
    let Some(rest) = line.trim_start().strip_prefix(':') else {
        if line.trim().is_empty() {
            return Ok(None);
        }
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest.trim(), ""),
    };

    let command = match name {
        "voice" => Command::Voice(arg.parse()?),
        "lang" => Command::Language(arg.parse()?),
        "volume" => Command::Volume(arg.parse().with_context(|| format!("Bad volume: {}", arg))?),
        "quality" => Command::Quality(arg.parse().with_context(|| format!("Bad quality: {}", arg))?),
        "stop" => Command::Stop,
        "queue" => Command::Queue(arg.to_string()),
        "mark" => {
            let (marker, text) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
            let marker = marker
                .parse()
                .with_context(|| format!("Bad index marker: {}", marker))?;
            Command::Mark(marker, text.trim().to_string())
        }
        "voices" => Command::ListVoices,
        "quit" | "q" => Command::Quit,
        other => bail!("Unknown command: :{}", other),
    };
    Ok(Some(command))
}

/// Run one command; setting changes are also written to `config`
fn execute(driver: &SynthDriver, config: &mut Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Say(text) => {
            driver.cancel();
            driver.speak(&[SpeechItem::Text(text)]);
        }
        Command::Queue(text) => driver.speak(&[SpeechItem::Text(text)]),
        Command::Mark(marker, text) => {
            driver.speak(&[SpeechItem::Text(text), SpeechItem::Index(marker)]);
        }
        Command::Stop => driver.cancel(),
        Command::Voice(voice) => {
            driver.set_voice(voice)?;
            config.remember("voice", voice.id())?;
        }
        Command::Language(language) => {
            driver.set_language(language);
            config.remember("language", language.code())?;
        }
        Command::Volume(volume) => {
            driver.set_volume(volume)?;
            config.remember("volume", &volume.to_string())?;
        }
        Command::Quality(quality) => {
            driver.set_quality(quality)?;
            config.remember("quality", &quality.to_string())?;
        }
        Command::ListVoices => {
            for voice in driver.available_voices() {
                let current = if *voice == driver.voice() { " *" } else { "" };
                println!("{}  {}{}", voice.id(), voice.display_name(), current);
            }
            for language in driver.available_languages() {
                let current = if *language == driver.language() { " *" } else { "" };
                println!("{}  {}{}", language.code(), language.display_name(), current);
            }
        }
        Command::Quit => {}
    }
    Ok(())
}
