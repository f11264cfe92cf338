//! Streaming RIFF/WAVE container output.
//!
//! The total PCM length is only known once rendering finishes, so the
//! writer emits a placeholder header up front and backpatches it on
//! finalize.

pub mod format;
pub mod header;
pub mod writer;

pub use format::PcmFormat;
pub use header::{WavHeader, HEADER_LEN};
pub use writer::WavStreamWriter;
