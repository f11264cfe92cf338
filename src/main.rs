//! midi2wav - Renders a MIDI file to a 16-bit stereo WAV file.
//!
//! # Usage
//!
//! ```bash
//! midi2wav -i song.mid -o song.wav -b bank.sf2        # 2 chips
//! midi2wav -i song.mid -o song.wav -b bank.sf2 -c 8   # more polyphony
//! RUST_LOG=debug midi2wav -i song.mid -o song.wav -b bank.sf2
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use midi2wav::config::DEFAULT_CHIPS;
use midi2wav::{render_to_wav, RenderConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line options.
#[derive(Parser, Debug)]
#[command(name = "midi2wav", version, about = "Render a MIDI file to WAV", long_about = None)]
struct Cli {
    /// Input MIDI file
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output WAV file
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Instrument bank (SoundFont .sf2)
    #[arg(short = 'b', long = "bank")]
    bank: PathBuf,

    /// Number of emulated chips; more chips allow more simultaneous notes
    #[arg(short = 'c', long = "chips", default_value_t = DEFAULT_CHIPS)]
    chips: u32,
}

impl Cli {
    fn into_config(self) -> RenderConfig {
        RenderConfig {
            chips: self.chips,
            ..RenderConfig::new(self.input, self.output, self.bank)
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first; missing flags exit here with a usage error
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.into_config();

    // Log every tenth of the way through
    let mut last_decile = 0u32;
    let progress = |fraction: f32| {
        let decile = (fraction * 10.0) as u32;
        if decile > last_decile {
            last_decile = decile;
            tracing::info!("Rendering... {}%", decile * 10);
        }
    };

    render_to_wav(&config, Some(progress))
        .with_context(|| format!("Failed to render {}", config.source.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_short_flags() {
        let cli = Cli::try_parse_from([
            "midi2wav", "-i", "a.mid", "-o", "a.wav", "-b", "gm.sf2", "-c", "4",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.source, PathBuf::from("a.mid"));
        assert_eq!(config.output, PathBuf::from("a.wav"));
        assert_eq!(config.bank, PathBuf::from("gm.sf2"));
        assert_eq!(config.chips, 4);
    }

    #[test]
    fn test_cli_defaults_to_two_chips() {
        let cli =
            Cli::try_parse_from(["midi2wav", "-i", "a.mid", "-o", "a.wav", "-b", "gm.sf2"]).unwrap();
        assert_eq!(cli.chips, 2);
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["midi2wav", "-i", "a.mid", "-o", "a.wav"]).is_err());
        assert!(Cli::try_parse_from(["midi2wav", "-o", "a.wav", "-b", "gm.sf2"]).is_err());
        assert!(Cli::try_parse_from(["midi2wav", "-i", "a.mid", "-b", "gm.sf2"]).is_err());
    }
}
