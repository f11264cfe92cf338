//! Source sequence handling.
//!
//! The synthesis engine decodes the sequence itself; this module only reads
//! enough of it up front to reject unusable sources and to estimate how long
//! the render will be.

mod probe;

pub use probe::{probe_sequence, SequenceInfo};

#[cfg(test)]
pub(crate) use probe::testing;

/// Tempo assumed until the first tempo event: 500,000 µs per beat (120 BPM).
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// Converts ticks to seconds at a fixed tempo.
///
/// # Arguments
///
/// * `ticks` - Number of ticks
/// * `ticks_per_beat` - Resolution of the sequence
/// * `tempo_us` - Tempo in microseconds per beat
///
/// # Returns
///
/// Duration in seconds
pub fn ticks_to_seconds(ticks: u64, ticks_per_beat: u64, tempo_us: u32) -> f64 {
    let beats = ticks as f64 / ticks_per_beat as f64;
    beats * tempo_us as f64 / 1_000_000.0
}
