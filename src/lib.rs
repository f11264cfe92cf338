//! midi2wav - Renders MIDI sequences to WAV files.
//!
//! This library drives a pull-based synthesis engine chunk by chunk and
//! streams the samples into a WAV container whose header is backpatched
//! once the total length is known.

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod wav;

// Re-export commonly used types
pub use audio::{
    render_to_wav, render_with, Engine, RenderSession, RenderSummary, SoundFontBackend,
    SynthBackend,
};
pub use config::RenderConfig;
pub use error::{EngineError, RenderError};
pub use wav::{PcmFormat, WavHeader, WavStreamWriter};
