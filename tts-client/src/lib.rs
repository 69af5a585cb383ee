//! Shared text-to-speech client library for the gen-speech workspace
//!
//! Provides a unified interface for speech synthesis providers:
//! - Gemini TTS (direct HTTP, blocking or server-sent-event streaming)
//! - Mock provider for tests

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;

pub use config::{Config, ProviderConfig};
pub use error::{Result, TtsError};
pub use provider::{AudioStream, SpeechAudio, SpeechProvider, SpeechRequest};
pub use providers::{MockProvider, ProviderKind, get_provider};
