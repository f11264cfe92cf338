//! Render options and their validation.
//!
//! Validation happens in two passes: [`RenderConfig::validate`] checks the
//! values themselves, [`RenderConfig::check_resources`] checks the paths.
//! Both run before the engine or the output file is touched.

use crate::audio::engine::{ChannelAllocMode, EngineSettings};
use crate::audio::soundfont::MAX_CHIPS;
use crate::audio::{CHUNK_FRAMES, SAMPLE_RATE};
use crate::error::{RenderError, Result};
use crate::wav::PcmFormat;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default number of emulated chips.
pub const DEFAULT_CHIPS: u32 = 2;

/// Everything a render run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Source sequence (Standard MIDI File).
    pub source: PathBuf,
    /// Output WAV path; created or truncated.
    pub output: PathBuf,
    /// Instrument bank.
    pub bank: PathBuf,
    /// Engine parallelism.
    pub chips: u32,
    /// Output sample layout.
    pub format: PcmFormat,
    /// Frames requested per render call.
    pub chunk_frames: usize,
}

impl RenderConfig {
    /// Config with the default chip count, 48 kHz 16-bit stereo output and
    /// 2048-frame chunks.
    pub fn new(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        bank: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            bank: bank.into(),
            chips: DEFAULT_CHIPS,
            format: PcmFormat::stereo(SAMPLE_RATE),
            chunk_frames: CHUNK_FRAMES,
        }
    }

    /// Engine settings derived from this config.
    ///
    /// Channel allocation is fixed to the same-instrument policy.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chips: self.chips,
            channel_alloc: ChannelAllocMode::SameInstrument,
        }
    }

    /// Checks option values.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Configuration`] for empty paths, a chip count
    /// outside 1..=100, or an unsupported PCM layout.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("input", &self.source),
            ("output", &self.output),
            ("bank", &self.bank),
        ] {
            if path.as_os_str().is_empty() {
                return Err(RenderError::Configuration(format!("no {} file given", name)));
            }
        }

        if self.chips == 0 || self.chips > MAX_CHIPS {
            return Err(RenderError::Configuration(format!(
                "chip count must be between 1 and {}, got {}",
                MAX_CHIPS, self.chips
            )));
        }
        if self.format.channels == 0 {
            return Err(RenderError::Configuration(
                "channel count must be at least 1".to_string(),
            ));
        }
        if self.format.bits_per_sample != 16 {
            return Err(RenderError::Configuration(format!(
                "only 16-bit PCM is supported, got {} bits",
                self.format.bits_per_sample
            )));
        }
        if self.format.sample_rate == 0 {
            return Err(RenderError::Configuration("sample rate must be non-zero".to_string()));
        }
        if !self.format.fits_header() {
            return Err(RenderError::Configuration(format!(
                "{} channels at {} Hz do not fit a WAV header",
                self.format.channels, self.format.sample_rate
            )));
        }
        if self.chunk_frames == 0 {
            return Err(RenderError::Configuration("chunk size must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Checks that inputs are readable files and the output can be created.
    ///
    /// Nothing is created or modified.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Resource`] naming the first unusable path.
    pub fn check_resources(&self) -> Result<()> {
        check_readable_file(&self.bank)?;
        check_readable_file(&self.source)?;

        if self.output.is_dir() {
            return Err(RenderError::resource(&self.output, "is a directory"));
        }
        let parent = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(RenderError::resource(
                &self.output,
                format!("directory {} does not exist", parent.display()),
            ));
        }
        Ok(())
    }
}

fn check_readable_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(RenderError::resource(path, "not found or not a regular file"));
    }
    File::open(path).map_err(|e| RenderError::resource(path, e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::new("song.mid", "song.wav", "bank.sf2");
        assert_eq!(config.chips, 2);
        assert_eq!(config.format, PcmFormat::stereo(48_000));
        assert_eq!(config.chunk_frames, 2048);
        assert_eq!(
            config.engine_settings().channel_alloc,
            ChannelAllocMode::SameInstrument
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = RenderConfig::new("song.mid", "song.wav", "bank.sf2");

        let cases = [
            RenderConfig { chips: 0, ..base.clone() },
            RenderConfig { chips: 101, ..base.clone() },
            RenderConfig { bank: PathBuf::new(), ..base.clone() },
            RenderConfig { chunk_frames: 0, ..base.clone() },
            RenderConfig {
                format: PcmFormat {
                    bits_per_sample: 24,
                    ..base.format
                },
                ..base.clone()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(RenderError::Configuration(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_validate_rejects_formats_that_overflow_header() {
        let base = RenderConfig::new("song.mid", "song.wav", "bank.sf2");

        // Block alignment past u16, then byte rate past u32.
        for (channels, sample_rate) in [(40_000u16, 48_000u32), (30_000, 192_000)] {
            let config = RenderConfig {
                format: PcmFormat {
                    channels,
                    sample_rate,
                    bits_per_sample: 16,
                },
                ..base.clone()
            };
            assert!(
                matches!(config.validate(), Err(RenderError::Configuration(_))),
                "{:?} should be rejected",
                config.format
            );
        }
    }

    #[test]
    fn test_check_resources_reports_missing_bank() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("song.mid");
        std::fs::write(&source, b"MThd").unwrap();

        let missing = dir.path().join("none.sf2");

        let config = RenderConfig::new(&source, dir.path().join("out.wav"), &missing);
        match config.check_resources() {
            Err(RenderError::Resource { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_check_resources_rejects_output_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("song.mid");
        let bank = dir.path().join("bank.sf2");
        std::fs::write(&source, b"MThd").unwrap();
        std::fs::write(&bank, b"RIFF").unwrap();

        let config = RenderConfig::new(&source, dir.path().join("nested/out.wav"), &bank);
        assert!(matches!(
            config.check_resources(),
            Err(RenderError::Resource { .. })
        ));

        let config = RenderConfig::new(&source, dir.path(), &bank);
        assert!(matches!(
            config.check_resources(),
            Err(RenderError::Resource { .. })
        ));

        let config = RenderConfig::new(&source, dir.path().join("out.wav"), &bank);
        assert!(config.check_resources().is_ok());
        assert!(!dir.path().join("out.wav").exists());
    }
}
