//! Output encoding: WAV as stitched, or MP3 through FFmpeg.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Fixed MP3 bitrate.
pub const MP3_BITRATE: &str = "192k";

/// Container of the written audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// Infer the format from an output path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "wav" | "wave" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Get the FFmpeg command, preferring a configured binary.
fn ffmpeg_command(ffmpeg: Option<&Path>) -> Command {
    match ffmpeg {
        Some(path) => Command::new(path),
        None => Command::new("ffmpeg"),
    }
}

/// Check if FFmpeg is available.
pub fn is_ffmpeg_available(ffmpeg: Option<&Path>) -> bool {
    ffmpeg_command(ffmpeg)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Encode stitched WAV bytes into the requested output format.
pub fn encode(wav: Vec<u8>, format: OutputFormat, ffmpeg: Option<&Path>) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Wav => Ok(wav),
        OutputFormat::Mp3 => encode_mp3(&wav, ffmpeg),
    }
}

/// Re-encode WAV bytes to MP3 at [`MP3_BITRATE`].
fn encode_mp3(wav: &[u8], ffmpeg: Option<&Path>) -> Result<Vec<u8>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input.wav");
    let output = temp_dir.path().join("output.mp3");
    std::fs::write(&input, wav)?;

    let result = ffmpeg_command(ffmpeg)
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(&input)
        .args(["-codec:a", "libmp3lame", "-b:a", MP3_BITRATE])
        .arg(&output)
        .output()
        .context("Failed to run ffmpeg")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        anyhow::bail!("ffmpeg MP3 encoding failed: {}", stderr);
    }

    let mp3 = std::fs::read(&output).context("Failed to read encoded MP3")?;
    log::debug!("Encoded {} WAV bytes to {} MP3 bytes", wav.len(), mp3.len());
    Ok(mp3)
}
