//! Mock speech provider for testing
//!
//! Returns a fixed payload for every call and can be scripted to fail or to
//! return no audio on chosen calls. Requests are recorded so callers can
//! check ordering.

use async_trait::async_trait;
use futures_util::stream;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, TtsError};
use crate::provider::{AudioStream, SpeechAudio, SpeechProvider, SpeechRequest};

/// A mock provider for testing generation loops
pub struct MockProvider {
    /// Payload returned on success
    audio: SpeechAudio,
    /// Zero-based call numbers that fail with an API error
    fail_on: HashSet<usize>,
    /// Zero-based call numbers that succeed with an empty payload
    empty_on: HashSet<usize>,
    /// Number of pieces a streamed payload is split into
    stream_parts: usize,
    /// Current call count
    call_count: AtomicUsize,
    /// Texts of every request received, in order
    requests: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create a provider that always succeeds with the given payload
    pub fn always_succeeds(data: Vec<u8>, mime_type: &str) -> Self {
        Self {
            audio: SpeechAudio {
                data,
                mime_type: mime_type.to_string(),
            },
            fail_on: HashSet::new(),
            empty_on: HashSet::new(),
            stream_parts: 1,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail the given zero-based call with an API error
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on.insert(call);
        self
    }

    /// Return an empty payload on the given zero-based call
    pub fn empty_on(mut self, call: usize) -> Self {
        self.empty_on.insert(call);
        self
    }

    /// Split streamed payloads into `parts` pieces
    pub fn with_stream_parts(mut self, parts: usize) -> Self {
        self.stream_parts = parts.max(1);
        self
    }

    /// Get the number of synthesis calls made
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts of the requests received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_call(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.text.clone());
        }

        if self.fail_on.contains(&call_num) {
            return Err(TtsError::ApiError {
                message: format!("mock failure on call {}", call_num),
                status_code: Some(500),
            });
        }

        if self.empty_on.contains(&call_num) {
            return Ok(SpeechAudio {
                data: Vec::new(),
                mime_type: self.audio.mime_type.clone(),
            });
        }

        Ok(self.audio.clone())
    }
}

#[async_trait]
impl SpeechProvider for MockProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        self.next_call(request)
    }

    async fn synthesize_stream(&self, request: &SpeechRequest) -> Result<AudioStream> {
        let audio = self.next_call(request)?;

        let piece = audio.data.len().div_ceil(self.stream_parts).max(1);
        let parts: Vec<Result<SpeechAudio>> = audio
            .data
            .chunks(piece)
            .map(|bytes| {
                Ok(SpeechAudio {
                    data: bytes.to_vec(),
                    mime_type: audio.mime_type.clone(),
                })
            })
            .collect();

        Ok(Box::pin(stream::iter(parts)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest::new(text, "Kore")
    }

    #[tokio::test]
    async fn test_always_succeeds() {
        let provider = MockProvider::always_succeeds(vec![1, 2, 3], "audio/wav");

        let result = provider.synthesize(&request("hello")).await.unwrap();
        assert_eq!(result.data, vec![1, 2, 3]);
        assert_eq!(result.mime_type, "audio/wav");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.requests(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_failing_on_call() {
        let provider = MockProvider::always_succeeds(vec![1], "audio/wav").failing_on(1);

        assert!(provider.synthesize(&request("a")).await.is_ok());
        assert!(provider.synthesize(&request("b")).await.is_err());
        assert!(provider.synthesize(&request("c")).await.is_ok());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_on_call() {
        let provider = MockProvider::always_succeeds(vec![1], "audio/wav").empty_on(0);
        let result = provider.synthesize(&request("a")).await.unwrap();
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn test_stream_parts_concatenate_to_payload() {
        let provider =
            MockProvider::always_succeeds((0u8..10).collect(), "audio/wav").with_stream_parts(3);

        let mut stream = provider.synthesize_stream(&request("a")).await.unwrap();
        let mut pieces = Vec::new();
        while let Some(part) = stream.next().await {
            pieces.push(part.unwrap().data);
        }

        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.concat(), (0u8..10).collect::<Vec<_>>());
    }
}
