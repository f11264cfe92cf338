//! Synthesis engine interface.
//!
//! A backend is an opaque, stateful, pull-based frame source with a strict
//! call order: configure, open a bank, open a source, render until the end
//! of the sequence, close. [`Engine`] owns a backend and rejects calls that
//! break that order instead of relying on caller discipline.

use super::chunk::PcmChunk;
use crate::error::EngineError;
use std::path::Path;

/// Policy the engine uses to pick a synth channel for a new note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelAllocMode {
    /// Let the engine choose based on the bank.
    #[default]
    Auto,
    /// Prefer channels whose note was released longest ago.
    OffDelay,
    /// Prefer released channels that last played the same instrument.
    SameInstrument,
    /// Take any released channel.
    AnyReleased,
}

/// Operations a synthesis backend exposes.
///
/// Backends are created already initialized for a sample rate and channel
/// count; everything else goes through these calls.
pub trait SynthBackend {
    /// Sets how many parallel synthesis units ("chips") to emulate.
    fn set_parallelism(&mut self, count: u32) -> Result<(), EngineError>;

    /// Enables or disables looping of the source sequence.
    fn set_loop_enabled(&mut self, enabled: bool);

    /// Selects the channel allocation policy.
    fn set_channel_alloc_mode(&mut self, mode: ChannelAllocMode);

    /// Loads the instrument bank.
    fn open_bank(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Loads the source sequence and rewinds to its start.
    fn open_source(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Renders up to `max_frames` interleaved frames into `out`.
    ///
    /// Returns the number of frames produced, which may be anything from
    /// zero to `max_frames`.
    fn render(&mut self, out: &mut [i16], max_frames: usize) -> Result<usize, EngineError>;

    /// True once no further frames will be produced.
    fn at_end(&self) -> bool;

    /// Releases the backend's resources.
    fn close(&mut self);
}

/// Settings applied to a backend before any resource is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Number of emulated chips.
    pub chips: u32,
    /// Channel allocation policy.
    pub channel_alloc: ChannelAllocMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chips: 2,
            channel_alloc: ChannelAllocMode::SameInstrument,
        }
    }
}

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Configured,
    BankLoaded,
    Ready,
    Finished,
    Closed,
}

impl EngineState {
    fn describe(self) -> &'static str {
        match self {
            EngineState::Configured => "no bank is loaded",
            EngineState::BankLoaded => "no source is loaded",
            EngineState::Ready => "rendering",
            EngineState::Finished => "the sequence has ended",
            EngineState::Closed => "the engine is closed",
        }
    }
}

/// Owned handle to a configured backend.
///
/// The backend is closed exactly once: by [`Engine::close`] or, on an
/// early return, when the handle is dropped.
pub struct Engine<B: SynthBackend> {
    backend: B,
    state: EngineState,
}

impl<B: SynthBackend> Engine<B> {
    /// Applies `settings` to a freshly initialized backend.
    ///
    /// Looping is always disabled: the output must be finite.
    pub fn configure(mut backend: B, settings: &EngineSettings) -> Result<Self, EngineError> {
        tracing::debug!(
            "Configuring engine: {} chips, {:?} allocation, looping off",
            settings.chips,
            settings.channel_alloc
        );
        if let Err(e) = backend.set_parallelism(settings.chips) {
            backend.close();
            return Err(e);
        }
        backend.set_loop_enabled(false);
        backend.set_channel_alloc_mode(settings.channel_alloc);
        Ok(Self {
            backend,
            state: EngineState::Configured,
        })
    }

    /// Configures the backend and loads the bank and source in order.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the backend is closed before returning.
    pub fn open(
        backend: B,
        settings: &EngineSettings,
        bank: &Path,
        source: &Path,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::configure(backend, settings)?;
        engine.load_bank(bank)?;
        engine.load_source(source)?;
        Ok(engine)
    }

    /// Loads the instrument bank. Only valid directly after configuration.
    pub fn load_bank(&mut self, path: &Path) -> Result<(), EngineError> {
        self.expect_state(EngineState::Configured, "load_bank")?;
        self.backend.open_bank(path)?;
        tracing::debug!("Loaded bank {}", path.display());
        self.state = EngineState::BankLoaded;
        Ok(())
    }

    /// Loads the source sequence. Only valid once a bank is loaded.
    pub fn load_source(&mut self, path: &Path) -> Result<(), EngineError> {
        self.expect_state(EngineState::BankLoaded, "load_source")?;
        self.backend.open_source(path)?;
        tracing::debug!("Loaded sequence {}", path.display());
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Pulls the next chunk into `chunk` and returns the frame count.
    ///
    /// Once the backend reports the end of the sequence the engine moves
    /// to its finished state; further render calls are rejected.
    pub fn render(&mut self, chunk: &mut PcmChunk) -> Result<usize, EngineError> {
        self.expect_state(EngineState::Ready, "render")?;

        let max_frames = chunk.capacity_frames();
        let frames = self.backend.render(chunk.samples_mut(), max_frames)?;
        if frames > max_frames {
            return Err(EngineError::Render(format!(
                "backend produced {} frames, only {} were requested",
                frames, max_frames
            )));
        }

        if self.backend.at_end() {
            self.state = EngineState::Finished;
        }
        Ok(frames)
    }

    /// True once the sequence has ended.
    pub fn at_end(&self) -> bool {
        match self.state {
            EngineState::Finished | EngineState::Closed => true,
            EngineState::Ready => self.backend.at_end(),
            EngineState::Configured | EngineState::BankLoaded => false,
        }
    }

    /// Releases the backend.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.state != EngineState::Closed {
            self.backend.close();
            self.state = EngineState::Closed;
            tracing::debug!("Engine closed");
        }
    }

    fn expect_state(&self, expected: EngineState, op: &'static str) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::OutOfOrder {
                op,
                state: self.state.describe(),
            })
        }
    }
}

impl<B: SynthBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
