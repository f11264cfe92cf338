//! The fixed 44-byte canonical WAV header.

use super::format::PcmFormat;

/// Size of the serialized header in bytes.
pub const HEADER_LEN: usize = 44;

/// Bytes counted by `riff_size` that are not PCM payload
/// (`"WAVE"` + the whole fmt chunk + the data chunk header).
pub const RIFF_OVERHEAD: u32 = 36;

/// Largest payload the 32-bit size fields can describe.
pub const MAX_DATA_BYTES: u32 = u32::MAX - RIFF_OVERHEAD;

const FMT_CHUNK_SIZE: u32 = 16;
const AUDIO_FORMAT_PCM: u16 = 1;

/// In-memory form of the header.
///
/// Only the format and the payload size are inputs; every other field is
/// derived, which keeps `riff_size == 36 + data_bytes` true by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_tag: [u8; 4],
    pub riff_size: u32,
    pub wave_tag: [u8; 4],
    pub fmt_tag: [u8; 4],
    pub fmt_chunk_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub sample_alignment: u16,
    pub bit_depth: u16,
    pub data_tag: [u8; 4],
    pub data_bytes: u32,
}

impl WavHeader {
    /// Builds the header describing `data_bytes` of PCM in `format`.
    pub fn new(format: &PcmFormat, data_bytes: u32) -> Self {
        Self {
            riff_tag: *b"RIFF",
            riff_size: RIFF_OVERHEAD.saturating_add(data_bytes),
            wave_tag: *b"WAVE",
            fmt_tag: *b"fmt ",
            fmt_chunk_size: FMT_CHUNK_SIZE,
            audio_format: AUDIO_FORMAT_PCM,
            num_channels: format.channels,
            sample_rate: format.sample_rate,
            byte_rate: format.byte_rate(),
            sample_alignment: format.block_align(),
            bit_depth: format.bits_per_sample,
            data_tag: *b"data",
            data_bytes,
        }
    }

    /// The header written before the payload length is known.
    ///
    /// Both size fields are zero here; they are corrected on finalize.
    pub fn placeholder(format: &PcmFormat) -> Self {
        Self {
            riff_size: 0,
            ..Self::new(format, 0)
        }
    }

    /// Serializes the header, all integers little-endian.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.riff_tag);
        out[4..8].copy_from_slice(&self.riff_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.wave_tag);
        out[12..16].copy_from_slice(&self.fmt_tag);
        out[16..20].copy_from_slice(&self.fmt_chunk_size.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.num_channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.sample_alignment.to_le_bytes());
        out[34..36].copy_from_slice(&self.bit_depth.to_le_bytes());
        out[36..40].copy_from_slice(&self.data_tag);
        out[40..44].copy_from_slice(&self.data_bytes.to_le_bytes());
        out
    }

    /// Parses a header back out of its serialized form.
    ///
    /// Returns `None` when any of the four tags is wrong.
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        let tag = |at: usize| -> [u8; 4] {
            [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
        };
        let u32_at = |at: usize| u32::from_le_bytes(tag(at));
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);

        let header = Self {
            riff_tag: tag(0),
            riff_size: u32_at(4),
            wave_tag: tag(8),
            fmt_tag: tag(12),
            fmt_chunk_size: u32_at(16),
            audio_format: u16_at(20),
            num_channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            sample_alignment: u16_at(32),
            bit_depth: u16_at(34),
            data_tag: tag(36),
            data_bytes: u32_at(40),
        };

        let tags_ok = &header.riff_tag == b"RIFF"
            && &header.wave_tag == b"WAVE"
            && &header.fmt_tag == b"fmt "
            && &header.data_tag == b"data";
        tags_ok.then_some(header)
    }
}

/// Serialized header for `data_bytes` of PCM in `format`.
pub fn encode_header(format: &PcmFormat, data_bytes: u32) -> [u8; HEADER_LEN] {
    WavHeader::new(format, data_bytes).to_bytes()
}
