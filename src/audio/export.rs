//! Audio export functionality.
//!
//! Renders a sequence to a WAV file by pulling fixed-size chunks from the
//! synthesis engine until it reports the end of the sequence. The WAV
//! header is written empty up front and backpatched once the length is
//! known.

use super::chunk::PcmChunk;
use super::engine::{Engine, SynthBackend};
use super::soundfont::SoundFontBackend;
use crate::config::RenderConfig;
use crate::error::{EngineError, RenderError, Result};
use crate::midi::{probe_sequence, SequenceInfo};
use crate::wav::{PcmFormat, WavStreamWriter};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

/// Outcome of a completed render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Frames written to the container.
    pub frames: u64,
    /// PCM bytes written after the header.
    pub data_bytes: u64,
    /// Number of render calls issued to the engine.
    pub render_calls: u64,
    /// Sample rate of the output.
    pub sample_rate: u32,
}

impl RenderSummary {
    /// Rendered audio length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames as f64 / self.sample_rate as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Rendering,
    Done,
}

/// One render run: an opened engine plus the inputs it was opened with.
///
/// Consumed by [`RenderSession::render`]; a session is never reused.
pub struct RenderSession<B: SynthBackend> {
    engine: Engine<B>,
    chips: u32,
    loop_disabled: bool,
    source: PathBuf,
    bank: PathBuf,
    sequence: Option<SequenceInfo>,
}

impl<B: SynthBackend> RenderSession<B> {
    /// Configures `backend` and loads the bank and source named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Engine`] if configuration or loading fails.
    pub fn open(config: &RenderConfig, backend: B) -> Result<Self> {
        let engine = Engine::open(
            backend,
            &config.engine_settings(),
            &config.bank,
            &config.source,
        )?;
        Ok(Self {
            engine,
            chips: config.chips,
            loop_disabled: true,
            source: config.source.clone(),
            bank: config.bank.clone(),
            sequence: None,
        })
    }

    /// Attaches probe results, used for progress reporting.
    pub fn with_sequence_info(mut self, info: SequenceInfo) -> Self {
        self.sequence = Some(info);
        self
    }

    /// Chip count the engine was configured with.
    pub fn chips(&self) -> u32 {
        self.chips
    }

    /// Always true; a render run never loops the sequence.
    pub fn loop_disabled(&self) -> bool {
        self.loop_disabled
    }

    /// Source sequence path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Instrument bank path.
    pub fn bank(&self) -> &Path {
        &self.bank
    }

    /// Drains the engine into a new WAV file at `output`.
    ///
    /// The engine is closed before the header is finalized. If the loop
    /// fails part-way, the file is cut back to the last fully appended chunk,
    /// the header is finalized for it, and the original error is returned.
    ///
    /// # Arguments
    ///
    /// * `output` - Path for the output WAV file
    /// * `format` - PCM layout; must match what the backend produces
    /// * `chunk_frames` - Frames requested per render call
    /// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
    pub fn render<P, F>(
        self,
        output: P,
        format: PcmFormat,
        chunk_frames: usize,
        mut progress_callback: Option<F>,
    ) -> Result<RenderSummary>
    where
        P: AsRef<Path>,
        F: FnMut(f32),
    {
        let RenderSession {
            mut engine,
            sequence,
            ..
        } = self;
        let expected_seconds = sequence.map(|info| info.length_seconds);

        let mut chunk = PcmChunk::new(format.channels, chunk_frames);
        let mut writer = WavStreamWriter::create(output.as_ref(), format)?;
        let mut summary = RenderSummary {
            sample_rate: format.sample_rate,
            ..RenderSummary::default()
        };

        let outcome = drain(
            &mut engine,
            &mut chunk,
            &mut writer,
            &mut summary,
            expected_seconds,
            &mut progress_callback,
        );

        // Engine first, then the container.
        engine.close();

        match outcome {
            Ok(()) => {
                let total = u32::try_from(summary.data_bytes).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "PCM payload exceeds 4 GiB")
                })?;
                writer.finalize(total)?;
                Ok(summary)
            }
            Err(e) => {
                let written = writer.data_bytes();
                if let Err(finalize_err) = writer.finalize_truncated() {
                    tracing::warn!("Failed to finalize partial output: {}", finalize_err);
                } else {
                    tracing::warn!("Render aborted, kept {} bytes of partial output", written);
                }
                Err(e)
            }
        }
    }
}

/// Pulls chunks until the engine reports the end of the sequence.
///
/// Each returned frame count is used both for the byte tally and for the
/// slice handed to the writer, so the two never disagree.
fn drain<B, W, F>(
    engine: &mut Engine<B>,
    chunk: &mut PcmChunk,
    writer: &mut WavStreamWriter<W>,
    summary: &mut RenderSummary,
    expected_seconds: Option<f64>,
    progress_callback: &mut Option<F>,
) -> Result<()>
where
    B: SynthBackend,
    W: Write + Seek,
    F: FnMut(f32),
{
    let frame_bytes = chunk.frame_bytes() as u64;
    let mut state = LoopState::Rendering;

    while state == LoopState::Rendering {
        let frames = engine.render(chunk)?;
        summary.render_calls += 1;

        // The call that hits the end may still carry a final chunk.
        if engine.at_end() {
            state = LoopState::Done;
        }

        if frames > 0 {
            summary.frames += frames as u64;
            summary.data_bytes += frames as u64 * frame_bytes;
            writer.append_chunk(chunk.le_bytes(frames))?;
        }

        if let Some(callback) = progress_callback.as_mut() {
            let fraction = match (state, expected_seconds) {
                (LoopState::Done, _) => 1.0,
                (LoopState::Rendering, Some(total)) if total > 0.0 => {
                    (summary.duration_seconds() / total).min(1.0)
                }
                (LoopState::Rendering, _) => 0.0,
            };
            callback(fraction as f32);
        }
    }

    tracing::debug!(
        "Engine drained after {} calls, {} frames",
        summary.render_calls,
        summary.frames
    );
    Ok(())
}

/// Renders `config.source` through a backend built by `init_backend`.
///
/// Options and paths are checked, and the source is probed, before the
/// backend is created; any failure there leaves the output path untouched.
/// An engine failure while opening the bank or source also happens before
/// the output file is created.
pub fn render_with<B, I, F>(
    config: &RenderConfig,
    init_backend: I,
    progress_callback: Option<F>,
) -> Result<RenderSummary>
where
    B: SynthBackend,
    I: FnOnce(&PcmFormat) -> std::result::Result<B, EngineError>,
    F: FnMut(f32),
{
    config.validate()?;
    config.check_resources()?;
    let info = probe_sequence(&config.source)?;
    tracing::info!(
        "Sequence {}: {:?}, {} tracks, ~{:.1}s",
        config.source.display(),
        info.format,
        info.tracks,
        info.length_seconds
    );

    let backend = init_backend(&config.format).map_err(RenderError::from)?;
    let session = RenderSession::open(config, backend)?.with_sequence_info(info);
    tracing::info!(
        "Rendering with bank {} ({} chips, looping {})",
        session.bank().display(),
        session.chips(),
        if session.loop_disabled() { "off" } else { "on" }
    );

    let summary = session.render(
        &config.output,
        config.format,
        config.chunk_frames,
        progress_callback,
    )?;
    tracing::info!(
        "Wrote {} ({:.2}s, {} bytes of PCM)",
        config.output.display(),
        summary.duration_seconds(),
        summary.data_bytes
    );
    Ok(summary)
}

/// Renders a MIDI file to WAV through the SoundFont backend.
///
/// # Arguments
///
/// * `config` - Source, bank, output and format settings
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Errors
///
/// Returns error if:
/// - An option is invalid
/// - The bank, source or output location is unusable
/// - The engine fails to load the bank or sequence, or to render
/// - Writing the output fails
pub fn render_to_wav<F>(
    config: &RenderConfig,
    progress_callback: Option<F>,
) -> Result<RenderSummary>
where
    F: FnMut(f32),
{
    render_with(
        config,
        |format| SoundFontBackend::init(format.sample_rate, format.channels),
        progress_callback,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::testing::{CallLog, ScriptedBackend};
    use crate::midi::testing::write_single_note;
    use crate::wav::{WavHeader, HEADER_LEN};
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Temp dir with a valid source and a placeholder bank.
    fn fixture() -> (TempDir, RenderConfig) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("song.mid");
        let bank = dir.path().join("bank.sf2");
        write_single_note(&source, 480, None);
        std::fs::write(&bank, b"bank").unwrap();
        let config = RenderConfig::new(&source, dir.path().join("out.wav"), &bank);
        (dir, config)
    }

    fn run(config: &RenderConfig, backend: ScriptedBackend) -> Result<RenderSummary> {
        render_with(config, move |_| Ok(backend), None::<fn(f32)>)
    }

    fn read_output(config: &RenderConfig) -> (WavHeader, Vec<u8>) {
        let bytes = std::fs::read(&config.output).unwrap();
        let raw: [u8; HEADER_LEN] = bytes[..HEADER_LEN].try_into().unwrap();
        (WavHeader::from_bytes(&raw).unwrap(), bytes)
    }

    fn calls(log: &CallLog, name: &str) -> usize {
        log.borrow().iter().filter(|c| c.as_str() == name).count()
    }

    #[test]
    fn test_scripted_frame_counts_are_accounted() {
        let (_dir, config) = fixture();
        let (backend, log) = ScriptedBackend::new(&[100, 0, 2048, 0]);

        let summary = run(&config, backend).unwrap();
        assert_eq!(summary.frames, 2148);
        assert_eq!(summary.data_bytes, 2148 * 4);
        assert_eq!(summary.render_calls, 4);
        assert_eq!(calls(&log, "render"), 4);

        let (header, bytes) = read_output(&config);
        assert_eq!(header.data_bytes as u64, summary.data_bytes);
        assert_eq!(header.riff_size, 36 + header.data_bytes);
        assert_eq!(bytes.len() - HEADER_LEN, header.data_bytes as usize);
    }

    #[test]
    fn test_payload_follows_render_order() {
        let (_dir, config) = fixture();
        let (backend, _log) = ScriptedBackend::new(&[3, 0, 2]);

        run(&config, backend).unwrap();

        let mut reader = hound::WavReader::open(&config.output).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 48_000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        // Three stereo frames from call 1, two from call 3.
        assert_eq!(samples, vec![1, 1, 1, 1, 1, 1, 3, 3, 3, 3]);
    }

    #[test]
    fn test_empty_sequence_gives_header_only() {
        let (_dir, config) = fixture();
        let (backend, _log) = ScriptedBackend::new(&[]);

        let summary = run(&config, backend).unwrap();
        assert_eq!(summary.data_bytes, 0);
        assert_eq!(summary.render_calls, 1);

        let (header, bytes) = read_output(&config);
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(header.data_bytes, 0);
        assert_eq!(header.riff_size, 36);
    }

    #[test]
    fn test_final_chunk_is_kept_when_end_reported_immediately() {
        let (_dir, config) = fixture();
        let (backend, _log) = ScriptedBackend::new(&[37]);

        let summary = run(&config, backend).unwrap();
        assert_eq!(summary.render_calls, 1);
        assert_eq!(summary.frames, 37);

        let (header, bytes) = read_output(&config);
        assert_eq!(header.data_bytes, 37 * 4);
        assert!(bytes[HEADER_LEN..].chunks(2).all(|s| s == [1, 0]));
    }

    #[test]
    fn test_engine_closed_once_before_finalize() {
        let (_dir, config) = fixture();
        let (backend, log) = ScriptedBackend::new(&[10, 10]);

        run(&config, backend).unwrap();
        assert_eq!(calls(&log, "close"), 1);
        assert_eq!(log.borrow().last().map(String::as_str), Some("close"));
    }

    #[test]
    fn test_missing_bank_creates_no_output() {
        let (dir, mut config) = fixture();
        config.bank = dir.path().join("missing.sf2");
        let initialized = Cell::new(false);

        let result = render_with(
            &config,
            |_| {
                initialized.set(true);
                Ok(ScriptedBackend::new(&[10]).0)
            },
            None::<fn(f32)>,
        );
        assert!(matches!(result, Err(RenderError::Resource { .. })));
        assert!(!initialized.get());
        assert!(!config.output.exists());
    }

    #[test]
    fn test_missing_source_creates_no_output() {
        let (dir, mut config) = fixture();
        config.source = dir.path().join("missing.mid");
        let (backend, _log) = ScriptedBackend::new(&[10]);

        assert!(matches!(
            run(&config, backend),
            Err(RenderError::Resource { .. })
        ));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_empty_output_path_is_configuration_error() {
        let (_dir, mut config) = fixture();
        config.output = PathBuf::new();
        let (backend, _log) = ScriptedBackend::new(&[10]);

        assert!(matches!(
            run(&config, backend),
            Err(RenderError::Configuration(_))
        ));
    }

    #[test]
    fn test_engine_open_failure_creates_no_output() {
        let (_dir, config) = fixture();
        let (mut backend, log) = ScriptedBackend::new(&[10]);
        backend.fail_bank = true;

        assert!(matches!(
            run(&config, backend),
            Err(RenderError::Engine(EngineError::Bank { .. }))
        ));
        assert!(!config.output.exists());
        assert_eq!(calls(&log, "render"), 0);
        assert_eq!(calls(&log, "close"), 1);
    }

    #[test]
    fn test_render_failure_still_finalizes_header() {
        let (_dir, config) = fixture();
        let (mut backend, log) = ScriptedBackend::new(&[10, 10, 10, 10]);
        backend.fail_render_at = Some(3);

        let result = run(&config, backend);
        assert!(matches!(
            result,
            Err(RenderError::Engine(EngineError::Render(_)))
        ));
        assert_eq!(calls(&log, "close"), 1);

        let (header, bytes) = read_output(&config);
        assert_eq!(header.data_bytes, 80);
        assert_eq!(header.riff_size, 116);
        assert_eq!(bytes.len(), HEADER_LEN + 80);
    }

    #[test]
    fn test_progress_reaches_completion() {
        let (_dir, config) = fixture();
        let (backend, _log) = ScriptedBackend::new(&[2048; 8]);
        let mut updates = Vec::new();

        render_with(&config, move |_| Ok(backend), Some(|p: f32| updates.push(p))).unwrap();

        assert_eq!(updates.len(), 8);
        assert!(updates.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(updates.last().copied(), Some(1.0));
    }

    #[test]
    fn test_session_records_inputs() {
        let (_dir, config) = fixture();
        let (backend, _log) = ScriptedBackend::new(&[]);

        let session = RenderSession::open(&config, backend).unwrap();
        assert_eq!(session.chips(), 2);
        assert!(session.loop_disabled());
        assert_eq!(session.source(), config.source.as_path());
        assert_eq!(session.bank(), config.bank.as_path());
    }

    #[test]
    fn test_summary_duration() {
        let summary = RenderSummary {
            frames: 96_000,
            data_bytes: 384_000,
            render_calls: 47,
            sample_rate: 48_000,
        };
        assert!((summary.duration_seconds() - 2.0).abs() < f64::EPSILON);
        assert_eq!(RenderSummary::default().duration_seconds(), 0.0);
    }
}
