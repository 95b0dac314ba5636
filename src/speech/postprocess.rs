//! Audio post-processing: gain, clipping and 16-bit quantization
//!
//! Runs once per chunk on the synthesis thread, so it does a single pass
//! over the samples and at most one allocation.

use super::request::{PcmBuffer, Waveform};

/// Default amplification applied on top of the volume setting
pub const DEFAULT_GAIN: f32 = 2.0;

/// Scale factor for full-scale 16-bit output
const FULL_SCALE: f32 = i16::MAX as f32;

/// Combined multiplier for a volume percentage and gain constant
pub fn gain_factor(volume_percent: u8, gain: f32) -> f32 {
    (f32::from(volume_percent) / 100.0) * gain
}

/// Convert one float sample to a 16-bit value
///
/// NaN maps to silence. The result is always within `-32767..=32767`.
#[inline]
pub fn quantize(sample: f32, factor: f32) -> i16 {
    let scaled = sample * factor;
    if scaled.is_nan() {
        return 0;
    }
    (scaled.clamp(-1.0, 1.0) * FULL_SCALE).round() as i16
}

/// Apply gain, clip and quantize into `out`, replacing its contents
pub fn process_into(samples: &[f32], volume_percent: u8, gain: f32, out: &mut Vec<u8>) {
    let factor = gain_factor(volume_percent, gain);
    out.clear();
    out.reserve(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&quantize(sample, factor).to_le_bytes());
    }
}

/// Apply gain, clip and quantize a slice of samples
pub fn process(samples: &[f32], volume_percent: u8, gain: f32) -> PcmBuffer {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    process_into(samples, volume_percent, gain, &mut bytes);
    PcmBuffer::from_bytes(bytes)
}

/// Post-process a whole waveform
pub fn process_waveform(waveform: &Waveform, volume_percent: u8, gain: f32) -> PcmBuffer {
    process(&waveform.samples, volume_percent, gain)
}
