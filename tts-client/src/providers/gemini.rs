//! Gemini speech provider
//!
//! Direct HTTP implementation of `generateContent` with the AUDIO response
//! modality. The streaming variant uses `streamGenerateContent?alt=sse`.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::sse::SseDecoder;
use crate::error::{Result, TtsError};
use crate::provider::{AudioStream, SpeechAudio, SpeechProvider, SpeechRequest};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider for the Gemini TTS models
pub struct GeminiProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(model: &str, api_key: String, base_url: Option<&str>) -> Result<Self> {
        let client = Client::new();

        Ok(Self {
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(GEMINI_API_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post(&self, url: &str, request: &SpeechRequest) -> Result<Response> {
        let body = GenerateContentRequest::speech(request);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TtsError::ApiError {
                message: format!("Request failed: {}", e),
                status_code: None,
            })?;

        check_status(response).await
    }
}

// Gemini API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn speech(request: &SpeechRequest) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: request.text.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: request.voice.clone(),
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Map non-success statuses to the matching error variant
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let error_text = response.text().await.unwrap_or_default();
    let message = if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
        error_response.error.message
    } else {
        error_text
    };

    match status.as_u16() {
        429 => Err(TtsError::RateLimited { retry_after }),
        503 => Err(TtsError::ServerOverloaded { message }),
        code => Err(TtsError::ApiError {
            message,
            status_code: Some(code),
        }),
    }
}

/// Decode every inline audio part of a response, in order.
fn audio_parts(response: GenerateContentResponse) -> Result<Vec<SpeechAudio>> {
    let mut parts = Vec::new();

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(parts);
    };
    let Some(content) = candidate.content else {
        return Ok(parts);
    };

    for part in content.parts {
        if let Some(inline) = part.inline_data {
            let data = general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| TtsError::InvalidResponse(format!("Bad base64 audio: {}", e)))?;
            parts.push(SpeechAudio {
                data,
                mime_type: inline.mime_type,
            });
        }
    }

    Ok(parts)
}

/// Merge decoded parts into one payload, keeping the first MIME type.
fn merge_parts(parts: Vec<SpeechAudio>) -> Option<SpeechAudio> {
    let mut iter = parts.into_iter();
    let mut merged = iter.next()?;
    for part in iter {
        merged.data.extend_from_slice(&part.data);
    }
    Some(merged)
}

fn parse_event(event: &str) -> Result<Vec<SpeechAudio>> {
    let response: GenerateContentResponse = serde_json::from_str(event)
        .map_err(|e| TtsError::InvalidResponse(format!("Bad stream event: {}", e)))?;
    audio_parts(response)
}

struct EventStreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<SpeechAudio>,
    done: bool,
}

impl EventStreamState {
    fn queue_events(&mut self, events: Vec<String>) -> Result<()> {
        for event in events {
            self.pending.extend(parse_event(&event)?);
        }
        Ok(())
    }
}

fn event_stream(response: Response) -> AudioStream {
    let state = EventStreamState {
        body: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(part) = state.pending.pop_front() {
                return Some((Ok(part), state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(&bytes);
                    if let Err(e) = state.queue_events(events) {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    let err = TtsError::ApiError {
                        message: format!("Stream interrupted: {}", e),
                        status_code: None,
                    };
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                    let tail: Vec<String> = state.decoder.finish().into_iter().collect();
                    if let Err(e) = state.queue_events(tail) {
                        return Some((Err(e), state));
                    }
                }
            }
        }
    });

    Box::pin(stream)
}

#[async_trait]
impl SpeechProvider for GeminiProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        let response = self.post(&self.endpoint("generateContent"), request).await?;

        let api_response: GenerateContentResponse =
            response.json().await.map_err(|e| TtsError::ApiError {
                message: format!("Failed to parse response: {}", e),
                status_code: None,
            })?;

        merge_parts(audio_parts(api_response)?)
            .ok_or_else(|| TtsError::NoAudio(format!("{} returned no inline audio", self.model)))
    }

    async fn synthesize_stream(&self, request: &SpeechRequest) -> Result<AudioStream> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, request).await?;
        log::debug!("{} stream opened for {} chars", self.model, request.text.len());
        Ok(event_stream(response))
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
