use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::Result;

/// Request to send to a speech provider
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
        }
    }
}

/// Audio returned by a speech provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// Raw payload bytes as delivered by the service
    pub data: Vec<u8>,
    /// MIME type reported for the payload, e.g. `audio/L16;codec=pcm;rate=24000`
    pub mime_type: String,
}

/// Incrementally delivered audio for one request
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<SpeechAudio>> + Send>>;

/// Trait for speech synthesis providers
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize the whole request in one call
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio>;

    /// Synthesize the request, delivering audio as it is produced
    async fn synthesize_stream(&self, request: &SpeechRequest) -> Result<AudioStream>;

    /// Get the provider name for display
    fn name(&self) -> &'static str;

    /// Model used for synthesis
    fn model(&self) -> &str;
}
