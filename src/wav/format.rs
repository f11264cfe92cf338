//! PCM format parameters.

/// Sample layout of the PCM payload.
///
/// Byte rate and block alignment are always derived from these three
/// fields and cannot be set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 16-bit stereo at the given sample rate.
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    /// Bytes per sample (per channel).
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes per frame, or `None` if it does not fit the 16-bit header field.
    pub fn checked_block_align(&self) -> Option<u16> {
        self.channels.checked_mul(self.bytes_per_sample())
    }

    /// Bytes per second, or `None` if it does not fit the 32-bit header field.
    pub fn checked_byte_rate(&self) -> Option<u32> {
        self.checked_block_align()
            .and_then(|align| self.sample_rate.checked_mul(u32::from(align)))
    }

    /// Whether both derived header fields are representable.
    pub fn fits_header(&self) -> bool {
        self.checked_byte_rate().is_some()
    }

    /// Bytes per frame, also the header's block alignment.
    ///
    /// Saturates for layouts rejected by [`PcmFormat::fits_header`].
    pub fn block_align(&self) -> u16 {
        self.checked_block_align().unwrap_or(u16::MAX)
    }

    /// Bytes per second of audio.
    ///
    /// Saturates for layouts rejected by [`PcmFormat::fits_header`].
    pub fn byte_rate(&self) -> u32 {
        self.checked_byte_rate().unwrap_or(u32::MAX)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::stereo(48_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields_for_default_format() {
        let format = PcmFormat::default();
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.byte_rate(), 192_000);
    }

    #[test]
    fn test_derived_fields_for_mono() {
        let format = PcmFormat {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
        };
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.byte_rate(), 44_100);
    }

    #[test]
    fn test_block_align_overflow_is_detected() {
        let format = PcmFormat {
            channels: 40_000,
            sample_rate: 48_000,
            bits_per_sample: 16,
        };
        assert_eq!(format.checked_block_align(), None);
        assert!(!format.fits_header());
        assert_eq!(format.block_align(), u16::MAX);
    }

    #[test]
    fn test_byte_rate_overflow_is_detected() {
        let format = PcmFormat {
            channels: 30_000,
            sample_rate: 192_000,
            bits_per_sample: 16,
        };
        assert_eq!(format.checked_block_align(), Some(60_000));
        assert_eq!(format.checked_byte_rate(), None);
        assert!(!format.fits_header());
        assert_eq!(format.byte_rate(), u32::MAX);
    }
}
