//! PulseAudio sink using pacat
//!
//! PCM is streamed into a `pacat` child process. A writer thread owns the
//! pipe so `feed` never waits on playback. `stop` kills the child, which
//! silences the device at once; the next feed starts a fresh one.
//!
//! Dependencies:
//! - pacat (install with: sudo apt install pulseaudio-utils)
//! - a PulseAudio or PipeWire-pulse server (WSLg provides one)

use crate::platform::pulse_server;
use crate::speech::request::PcmBuffer;
use crate::speech::sink::{AudioPurpose, AudioSink, SinkFormat, SinkOpener};
use crate::{Result, SynthError};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Audio queued for the writer thread, tagged with the stop generation it
/// was fed in
struct Pending {
    generation: u64,
    bytes: Vec<u8>,
}

/// Sink playing through a `pacat` subprocess
pub struct PulseAudioSink {
    sender: Mutex<Option<Sender<Pending>>>,
    /// Bumped by every stop; audio from older generations is dropped
    generation: Arc<AtomicU64>,
    child: Arc<Mutex<Option<Child>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl PulseAudioSink {
    /// Open a sink for the given format
    ///
    /// Fails if pacat is not installed.
    pub fn new(format: &SinkFormat) -> Result<Self> {
        debug!("Creating PulseAudio sink");
        Self::find_pacat()?;

        let args = Self::pacat_args(format, pulse_server().as_deref());
        let generation = Arc::new(AtomicU64::new(0));
        let child = Arc::new(Mutex::new(None));
        let (sender, receiver) = mpsc::channel();

        let writer = PacatWriter {
            args,
            generation: Arc::clone(&generation),
            child: Arc::clone(&child),
            stdin: None,
        };
        let handle = thread::Builder::new()
            .name("pacat-writer".to_string())
            .spawn(move || writer.run(receiver))
            .map_err(|e| SynthError::Sink(format!("Failed to start audio writer: {}", e)))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            generation,
            child,
            writer: Mutex::new(Some(handle)),
        })
    }

    fn find_pacat() -> Result<()> {
        let found = Command::new("pacat")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if found {
            Ok(())
        } else {
            Err(SynthError::Sink(
                "pacat not found. Install with: sudo apt install pulseaudio-utils".to_string(),
            ))
        }
    }

    /// Command line for a raw playback stream in `format`
    fn pacat_args(format: &SinkFormat, server: Option<&str>) -> Vec<String> {
        let role = match format.purpose {
            AudioPurpose::Speech => "a11y",
        };

        let mut args = vec![
            "--playback".to_string(),
            "--raw".to_string(),
            format!("--format=s{}le", format.bits_per_sample),
            format!("--rate={}", format.sample_rate),
            format!("--channels={}", format.channels),
            "--latency-msec=50".to_string(),
            format!("--property=media.role={}", role),
        ];
        if let Some(server) = server {
            args.push(format!("--server={}", server));
        }
        args
    }

    fn kill_child(child: &Mutex<Option<Child>>) {
        if let Some(child) = child.lock().take() {
            Self::reap(child);
        }
    }

    fn reap(mut child: Child) {
        debug!("Killing pacat process");
        match child.kill() {
            Ok(_) => {
                let _ = child.wait(); // Clean up zombie
            }
            Err(e) => debug!("Failed to kill pacat process: {}", e),
        }
    }
}

impl AudioSink for PulseAudioSink {
    fn feed(&self, pcm: PcmBuffer) -> Result<()> {
        let sender = self.sender.lock();
        let sender = sender
            .as_ref()
            .ok_or_else(|| SynthError::Sink("Audio sink is closed".to_string()))?;

        sender
            .send(Pending {
                generation: self.generation.load(Ordering::SeqCst),
                bytes: pcm.into_bytes(),
            })
            .map_err(|_| SynthError::Sink("Audio writer has exited".to_string()))
    }

    fn stop(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        Self::kill_child(&self.child);
        Ok(())
    }

    /// Let pacat play what it was already given, then wait for it to exit
    fn close(&self) -> Result<()> {
        // Dropping the sender ends the writer loop once the channel drains
        self.sender.lock().take();

        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                error!("Audio writer thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for PulseAudioSink {
    fn drop(&mut self) {
        debug!("Shutting down PulseAudio sink");
        let _ = self.stop();
        let _ = self.close();
    }
}

/// Opens a [`PulseAudioSink`]
#[derive(Debug, Default, Clone, Copy)]
pub struct PulseAudioOpener;

impl SinkOpener for PulseAudioOpener {
    fn open(&self, format: &SinkFormat) -> Result<Arc<dyn AudioSink>> {
        Ok(Arc::new(PulseAudioSink::new(format)?))
    }
}

/// State owned by the writer thread
struct PacatWriter {
    args: Vec<String>,
    generation: Arc<AtomicU64>,
    child: Arc<Mutex<Option<Child>>>,
    /// Pipe into the current child and the generation it was started for
    stdin: Option<(u64, ChildStdin)>,
}

impl PacatWriter {
    fn run(mut self, receiver: Receiver<Pending>) {
        while let Ok(pending) = receiver.recv() {
            if pending.generation != self.generation.load(Ordering::SeqCst) {
                continue;
            }
            if let Err(e) = self.write(pending) {
                warn!("Audio write failed: {}", e);
                self.stdin = None;
            }
        }
        // EOF on stdin makes pacat drain its buffer and exit
        self.stdin = None;
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            debug!("Waiting for pacat to finish");
            let _ = child.wait();
        }
    }

    fn write(&mut self, pending: Pending) -> Result<()> {
        let stale = !matches!(self.stdin, Some((generation, _)) if generation == pending.generation);
        if stale {
            self.stdin = None;
            match self.spawn(pending.generation)? {
                Some(stdin) => self.stdin = Some((pending.generation, stdin)),
                None => {
                    debug!("Stopped while starting pacat; dropping {} bytes", pending.bytes.len());
                    return Ok(());
                }
            }
        }

        if let Some((_, stdin)) = self.stdin.as_mut() {
            stdin.write_all(&pending.bytes)?;
        }
        Ok(())
    }

    /// Start a child for `generation`
    ///
    /// Returns `None` if a stop happened in the meantime. `stop` bumps the
    /// generation before taking the child lock, so checking it under that
    /// lock means a child is either installed before the stop kills it or
    /// never installed at all.
    fn spawn(&self, generation: u64) -> Result<Option<ChildStdin>> {
        debug!("Starting pacat {:?}", self.args);
        let mut child = Command::new("pacat")
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SynthError::Sink(format!("Failed to start pacat: {}", e)))?;

        let Some(stdin) = child.stdin.take() else {
            PulseAudioSink::reap(child);
            return Err(SynthError::Sink("pacat has no stdin".to_string()));
        };

        let mut current = self.child.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            drop(current);
            PulseAudioSink::reap(child);
            return Ok(None);
        }
        // Replace any child left over from an earlier generation
        if let Some(old) = current.replace(child) {
            PulseAudioSink::reap(old);
        }
        Ok(Some(stdin))
    }
}
