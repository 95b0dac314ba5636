//! Platform detection utilities

use log::debug;
use std::fs;
use std::path::Path;

/// PulseAudio socket exported by WSLg
pub const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// Checks for WSL-specific indicators in /proc/version and environment variables.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}

/// Locate the PulseAudio server the audio sink should talk to
///
/// Returns `None` when the default socket should be used. `PULSE_SERVER`
/// always wins; on WSL the WSLg socket is used if present.
pub fn pulse_server() -> Option<String> {
    if let Ok(server) = std::env::var("PULSE_SERVER") {
        debug!("PULSE_SERVER set via environment: {}", server);
        return Some(server);
    }

    if is_wsl() && Path::new(WSLG_PULSE_PATH).exists() {
        debug!("Using WSLg PulseAudio server at {}", WSLG_PULSE_PATH);
        return Some(WSLG_PULSE_PATH.to_string());
    }

    None
}
