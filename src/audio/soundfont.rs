//! SoundFont-based synthesis backend.
//!
//! Uses rustysynth's sequencer to play a Standard MIDI File against a
//! SoundFont bank and converts its float output to interleaved 16-bit PCM.

use super::engine::{ChannelAllocMode, SynthBackend};
use crate::error::EngineError;
use rustysynth::{MidiFile, MidiFileSequencer, SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Voices contributed by each emulated chip (an OPN2 has six FM channels).
const VOICES_PER_CHIP: usize = 6;

/// Polyphony range rustysynth accepts.
const MIN_POLYPHONY: usize = 8;
const MAX_POLYPHONY: usize = 256;

/// Sample rates rustysynth accepts.
const MIN_SAMPLE_RATE: u32 = 16_000;
const MAX_SAMPLE_RATE: u32 = 192_000;

/// Upper bound on the chip count.
pub const MAX_CHIPS: u32 = 100;

/// Synthesis backend driving a rustysynth [`MidiFileSequencer`].
pub struct SoundFontBackend {
    sample_rate: u32,
    channels: u16,
    polyphony: usize,
    loop_enabled: bool,
    alloc_mode: ChannelAllocMode,
    sound_font: Option<Arc<SoundFont>>,
    sequencer: Option<MidiFileSequencer>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
}

impl SoundFontBackend {
    /// Initializes a backend producing `channels` interleaved channels at
    /// `sample_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Init`] for a sample rate outside 16-192 kHz
    /// or a zero channel count.
    pub fn init(sample_rate: u32, channels: u16) -> Result<Self, EngineError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(EngineError::Init(format!(
                "sample rate {} Hz is outside {}..={} Hz",
                sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        if channels == 0 {
            return Err(EngineError::Init("channel count must be at least 1".to_string()));
        }

        Ok(Self {
            sample_rate,
            channels,
            polyphony: voices_for_chips(2),
            loop_enabled: false,
            alloc_mode: ChannelAllocMode::default(),
            sound_font: None,
            sequencer: None,
            left_buf: Vec::new(),
            right_buf: Vec::new(),
        })
    }

    /// Voice budget handed to the synthesizer.
    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    /// Allocation policy requested by the caller.
    pub fn channel_alloc_mode(&self) -> ChannelAllocMode {
        self.alloc_mode
    }
}

/// Maps a chip count to a polyphony accepted by the synthesizer.
fn voices_for_chips(chips: u32) -> usize {
    (chips as usize * VOICES_PER_CHIP).clamp(MIN_POLYPHONY, MAX_POLYPHONY)
}

/// Converts a float sample in -1.0..=1.0 to 16-bit PCM.
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Frames that fit in both the request and an output buffer of `out_len` samples.
fn frame_budget(max_frames: usize, out_len: usize, channels: usize) -> usize {
    max_frames.min(out_len / channels)
}

/// Writes stereo float frames into `out` as interleaved 16-bit PCM.
///
/// Mono takes the mix of both sides; channels beyond the second repeat it.
/// Returns the number of frames written.
fn interleave(left: &[f32], right: &[f32], out: &mut [i16], channels: usize) -> usize {
    let mut written = 0;
    for ((frame, &l), &r) in out.chunks_exact_mut(channels).zip(left).zip(right) {
        match frame {
            [mono] => *mono = to_i16((l + r) * 0.5),
            [first, second, rest @ ..] => {
                *first = to_i16(l);
                *second = to_i16(r);
                rest.fill(to_i16((l + r) * 0.5));
            }
            [] => {}
        }
        written += 1;
    }
    written
}

impl SynthBackend for SoundFontBackend {
    fn set_parallelism(&mut self, count: u32) -> Result<(), EngineError> {
        if count == 0 || count > MAX_CHIPS {
            return Err(EngineError::Init(format!(
                "chip count {} is outside 1..={}",
                count, MAX_CHIPS
            )));
        }
        self.polyphony = voices_for_chips(count);
        Ok(())
    }

    fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    fn set_channel_alloc_mode(&mut self, mode: ChannelAllocMode) {
        // The sample-based synthesizer allocates voices itself.
        tracing::debug!("Channel allocation {:?} has no effect on SoundFont playback", mode);
        self.alloc_mode = mode;
    }

    fn open_bank(&mut self, path: &Path) -> Result<(), EngineError> {
        let bank_error = |reason: String| EngineError::Bank {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = BufReader::new(File::open(path).map_err(|e| bank_error(e.to_string()))?);
        let sound_font = SoundFont::new(&mut reader).map_err(|e| bank_error(format!("{:?}", e)))?;
        self.sound_font = Some(Arc::new(sound_font));
        Ok(())
    }

    fn open_source(&mut self, path: &Path) -> Result<(), EngineError> {
        let source_error = |reason: String| EngineError::Source {
            path: path.to_path_buf(),
            reason,
        };

        let sound_font = self
            .sound_font
            .as_ref()
            .ok_or_else(|| source_error("no bank loaded".to_string()))?;

        let mut reader = BufReader::new(File::open(path).map_err(|e| source_error(e.to_string()))?);
        let midi_file = Arc::new(
            MidiFile::new(&mut reader).map_err(|e| source_error(format!("{:?}", e)))?,
        );

        let mut settings = SynthesizerSettings::new(self.sample_rate as i32);
        settings.maximum_polyphony = self.polyphony;
        let synth = Synthesizer::new(sound_font, &settings)
            .map_err(|e| EngineError::Init(format!("failed to create synthesizer: {:?}", e)))?;

        let mut sequencer = MidiFileSequencer::new(synth);
        sequencer.play(&midi_file, self.loop_enabled);
        tracing::debug!(
            "Sequencer ready: {:.2}s, {} voices",
            midi_file.get_length(),
            self.polyphony
        );
        self.sequencer = Some(sequencer);
        Ok(())
    }

    fn render(&mut self, out: &mut [i16], max_frames: usize) -> Result<usize, EngineError> {
        let channels = self.channels as usize;
        let frames = frame_budget(max_frames, out.len(), channels);
        let sequencer = self
            .sequencer
            .as_mut()
            .ok_or_else(|| EngineError::Render("no sequence loaded".to_string()))?;

        if self.left_buf.len() < frames {
            self.left_buf.resize(frames, 0.0);
            self.right_buf.resize(frames, 0.0);
        }
        let left = &mut self.left_buf[..frames];
        let right = &mut self.right_buf[..frames];
        sequencer.render(left, right);

        Ok(interleave(left, right, out, channels))
    }

    fn at_end(&self) -> bool {
        self.sequencer
            .as_ref()
            .map_or(true, |sequencer| sequencer.end_of_sequence())
    }

    fn close(&mut self) {
        self.sequencer = None;
        self.sound_font = None;
    }
}
