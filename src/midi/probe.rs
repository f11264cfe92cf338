//! Pre-flight inspection of the source sequence.
//!
//! Parses the Standard MIDI File with midly before the engine is created,
//! so a missing or corrupt source is reported without touching the engine
//! or the output path.

use super::{ticks_to_seconds, DEFAULT_TEMPO_US};
use crate::error::{RenderError, Result};
use midly::{Format, MetaMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

/// Summary of a source sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceInfo {
    /// SMF format (single track, parallel or sequential).
    pub format: Format,
    /// Number of tracks in the file.
    pub tracks: usize,
    /// Time base of the delta times.
    pub timing: Timing,
    /// Estimated playback length in seconds, following tempo changes.
    pub length_seconds: f64,
}

/// Reads and parses the sequence at `path`.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the file cannot be read or is not
/// a Standard MIDI File.
pub fn probe_sequence<P: AsRef<Path>>(path: P) -> Result<SequenceInfo> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| RenderError::resource(path, e.to_string()))?;
    let smf = Smf::parse(&data)
        .map_err(|e| RenderError::resource(path, format!("not a MIDI sequence: {}", e)))?;

    let length_seconds = match smf.header.format {
        // Sequential tracks are independent songs played back to back.
        Format::Sequential => smf
            .tracks
            .iter()
            .map(|track| sequence_length(smf.header.timing, std::slice::from_ref(track)))
            .sum(),
        Format::SingleTrack | Format::Parallel => sequence_length(smf.header.timing, &smf.tracks),
    };

    Ok(SequenceInfo {
        format: smf.header.format,
        tracks: smf.tracks.len(),
        timing: smf.header.timing,
        length_seconds,
    })
}

/// Length in seconds of `tracks` played in parallel.
fn sequence_length(timing: Timing, tracks: &[Vec<TrackEvent<'_>>]) -> f64 {
    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut end_tick = 0u64;

    for track in tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                tempo_changes.push((tick, tempo.as_int()));
            }
        }
        end_tick = end_tick.max(tick);
    }

    match timing {
        Timing::Metrical(ticks_per_beat) => {
            tempo_changes.sort_by_key(|(tick, _)| *tick);
            let resolution = ticks_per_beat.as_int().max(1) as u64;

            let mut seconds = 0.0;
            let mut last_tick = 0u64;
            let mut tempo = DEFAULT_TEMPO_US;
            for (tick, next_tempo) in tempo_changes.into_iter().take_while(|(t, _)| *t < end_tick) {
                seconds += ticks_to_seconds(tick - last_tick, resolution, tempo);
                last_tick = tick;
                tempo = next_tempo;
            }
            seconds + ticks_to_seconds(end_tick - last_tick, resolution, tempo)
        }
        Timing::Timecode(fps, subframes) => {
            let ticks_per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
            end_tick as f64 / ticks_per_second
        }
    }
}
