//! Rendering sequences through a synthesis engine.
//!
//! This module provides:
//! - A state-checked wrapper around a pull-based synthesis backend
//! - A SoundFont backend built on rustysynth
//! - The render loop that drains the engine into a WAV container

pub mod chunk;
pub mod engine;
pub mod export;
pub mod soundfont;

pub use chunk::PcmChunk;
pub use engine::{ChannelAllocMode, Engine, EngineSettings, SynthBackend};
pub use export::{render_to_wav, render_with, RenderSession, RenderSummary};
pub use soundfont::SoundFontBackend;

/// Sample rate used for rendering (48 kHz).
pub const SAMPLE_RATE: u32 = 48_000;

/// Frames requested from the engine per render call.
pub const CHUNK_FRAMES: usize = 2048;
