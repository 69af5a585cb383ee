//! gen-speech configuration management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::audio::OutputFormat;
use crate::pipeline::{DEFAULT_MAX_CALLS, ErrorPolicy};
use crate::text::chunker::DEFAULT_CHUNK_SIZE;
use crate::tts::Voice;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenSpeechConfig {
    /// Default prebuilt voice
    #[serde(default)]
    pub voice: Voice,

    /// Model override. None uses the TTS client's default model.
    #[serde(default)]
    pub model: Option<String>,

    /// Maximum chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum synthesis calls per run
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,

    /// Output container when the output path does not decide it
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Behaviour when a chunk fails
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Use the streaming synthesis endpoint
    #[serde(default)]
    pub streaming: bool,

    /// FFmpeg binary used for MP3 output. None means `ffmpeg` on PATH.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_calls() -> usize {
    DEFAULT_MAX_CALLS
}

impl Default for GenSpeechConfig {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            model: None,
            chunk_size: default_chunk_size(),
            max_calls: default_max_calls(),
            output_format: OutputFormat::default(),
            error_policy: ErrorPolicy::default(),
            streaming: false,
            ffmpeg_path: None,
        }
    }
}

impl GenSpeechConfig {
    /// Get the config file path: ~/.config/cli-programs/gen-speech.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("gen-speech.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: GenSpeechConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}
