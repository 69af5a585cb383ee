//! Speech synthesis: voices, provider setup and per-chunk fragment retrieval.

use anyhow::{Context, Result};
use clap::ValueEnum;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tts_client::{Config, SpeechAudio, SpeechProvider, SpeechRequest, TtsError, get_provider};

use crate::audio::into_wav;

/// Prebuilt voices offered by the Gemini TTS models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Kore,
    Puck,
    Charon,
    Fenrir,
    Aoede,
}

impl Voice {
    /// Voice name as the service expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create the speech provider from the shared TTS configuration.
///
/// `model` overrides the configured default model.
pub fn create_provider(model: Option<&str>) -> Result<Box<dyn SpeechProvider>> {
    let config = Config::load().context("Failed to load TTS configuration")?;

    let model = model.unwrap_or(config.default_model.as_str());
    let provider_config = config.get_provider_config(&config.default_provider);

    get_provider(&config.default_provider, model, provider_config).context(format!(
        "Failed to initialize provider '{}' with model '{}'",
        config.default_provider, model
    ))
}

/// Synthesize one chunk and return it as a WAV fragment.
///
/// With `streaming`, every partial payload is drained and concatenated
/// before conversion, so the result is always one complete fragment.
pub async fn fetch_fragment(
    provider: &dyn SpeechProvider,
    text: &str,
    voice: Voice,
    streaming: bool,
) -> Result<Vec<u8>> {
    let request = SpeechRequest::new(text, voice.as_str());

    let audio = if streaming {
        drain_stream(provider, &request).await?
    } else {
        provider.synthesize(&request).await?
    };

    if audio.data.is_empty() {
        let reason = format!("{} returned an empty payload", provider.name());
        return Err(TtsError::NoAudio(reason).into());
    }

    Ok(into_wav(audio)?)
}

async fn drain_stream(
    provider: &dyn SpeechProvider,
    request: &SpeechRequest,
) -> Result<SpeechAudio> {
    let mut stream = provider.synthesize_stream(request).await?;

    let mut merged: Option<SpeechAudio> = None;
    let mut parts = 0usize;
    while let Some(part) = stream.next().await {
        append_part(&mut merged, part?)?;
        parts += 1;
    }

    log::debug!("Drained {} streamed parts", parts);

    merged.ok_or_else(|| {
        TtsError::NoAudio(format!("{} stream ended without audio", provider.name())).into()
    })
}

/// Append one streamed part. Every part must share the first part's MIME type.
fn append_part(merged: &mut Option<SpeechAudio>, part: SpeechAudio) -> Result<()> {
    match merged.as_mut() {
        None => *merged = Some(part),
        Some(audio) if audio.mime_type == part.mime_type => {
            audio.data.extend_from_slice(&part.data)
        }
        Some(audio) => {
            return Err(TtsError::InvalidResponse(format!(
                "streamed part has MIME type {}, expected {}",
                part.mime_type, audio.mime_type
            ))
            .into());
        }
    }
    Ok(())
}
