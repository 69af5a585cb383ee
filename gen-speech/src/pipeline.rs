//! Sequential generation loop: one synthesis call per chunk, in order.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tts_client::SpeechProvider;

use crate::audio::stitcher::inspect;
use crate::text::TextChunk;
use crate::tts::{Voice, fetch_fragment};

/// Daily call ceiling of the hosted TTS service.
pub const DEFAULT_MAX_CALLS: usize = 15;

/// What to do when a synthesis call fails or returns no audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the whole request at the first failing chunk
    #[default]
    Abort,
    /// Record the failure and continue with the next chunk
    Skip,
}

/// Request-scoped generation settings.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub voice: Voice,
    pub streaming: bool,
    /// Calls beyond this count are never issued
    pub max_calls: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            streaming: false,
            max_calls: DEFAULT_MAX_CALLS,
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// WAV audio generated for one chunk.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Index of the chunk this audio was generated from
    pub chunk: usize,
    pub wav: Vec<u8>,
}

/// A chunk that produced no audio under [`ErrorPolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub reason: String,
}

/// Outcome of a generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Successful fragments, in chunk order
    pub fragments: Vec<Fragment>,
    pub failures: Vec<ChunkFailure>,
    pub total_chunks: usize,
    /// Chunks for which a call was issued
    pub processed: usize,
    /// Whether the call cap stopped the run early
    pub quota_reached: bool,
}

impl GenerationReport {
    /// Number of chunks that produced audio.
    pub fn succeeded(&self) -> usize {
        self.fragments.len()
    }

    /// Every chunk was processed and none failed.
    pub fn is_complete(&self) -> bool {
        self.processed == self.total_chunks && self.failures.is_empty()
    }

    /// WAV buffers in stitching order.
    pub fn wavs(&self) -> Vec<&[u8]> {
        self.fragments.iter().map(|f| f.wav.as_slice()).collect()
    }

    /// Chunk index behind the fragment at `position`.
    pub fn chunk_of_fragment(&self, position: usize) -> Option<usize> {
        self.fragments.get(position).map(|f| f.chunk)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("chunk {} of {total} failed: {reason}", .chunk + 1)]
    ChunkFailed {
        chunk: usize,
        total: usize,
        reason: String,
    },
}

/// Synthesize every chunk in order, one call at a time.
///
/// `on_progress` receives `(processed, total)` after each chunk.
pub async fn generate<F>(
    provider: &dyn SpeechProvider,
    chunks: &[TextChunk],
    options: &GenerationOptions,
    mut on_progress: F,
) -> Result<GenerationReport, GenerationError>
where
    F: FnMut(usize, usize),
{
    let total = chunks.len();
    let mut report = GenerationReport {
        total_chunks: total,
        ..Default::default()
    };

    if total > options.max_calls {
        log::warn!(
            "{} chunks exceed the call limit of {}; only the first {} will be generated",
            total,
            options.max_calls,
            options.max_calls
        );
    }

    for chunk in chunks {
        if report.processed >= options.max_calls {
            report.quota_reached = true;
            log::warn!(
                "Call limit reached after {} of {} chunks",
                report.processed,
                total
            );
            break;
        }

        report.processed += 1;
        log::debug!(
            "Synthesizing chunk {}/{} ({} chars)",
            chunk.index + 1,
            total,
            chunk.char_len()
        );

        match fetch_fragment(provider, &chunk.text, options.voice, options.streaming).await {
            Ok(wav) => {
                if let Ok(info) = inspect(&wav) {
                    log::debug!(
                        "Chunk {} produced {} ms of audio ({})",
                        chunk.index + 1,
                        info.duration_ms(),
                        info.params
                    );
                }
                report.fragments.push(Fragment {
                    chunk: chunk.index,
                    wav,
                });
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                match options.error_policy {
                    ErrorPolicy::Abort => {
                        return Err(GenerationError::ChunkFailed {
                            chunk: chunk.index,
                            total,
                            reason,
                        });
                    }
                    ErrorPolicy::Skip => {
                        log::warn!("Skipping chunk {}: {}", chunk.index + 1, reason);
                        report.failures.push(ChunkFailure {
                            chunk: chunk.index,
                            reason,
                        });
                    }
                }
            }
        }

        on_progress(report.processed, total);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stitcher::stitch;
    use crate::text::process_document;
    use tts_client::MockProvider;

    const PCM_MIME: &str = "audio/L16;codec=pcm;rate=24000";

    fn provider() -> MockProvider {
        // 100 frames of 16-bit mono per call
        MockProvider::always_succeeds(vec![0; 200], PCM_MIME)
    }

    fn chunks(n: usize) -> Vec<TextChunk> {
        (0..n)
            .map(|i| TextChunk::new(i, format!("chunk number {}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_all_chunks_in_order() {
        let provider = provider();
        let chunks = process_document("one two three four five six", 9);
        let report = generate(&provider, &chunks, &GenerationOptions::default(), |_, _| {})
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.succeeded(), chunks.len());
        assert_eq!(
            provider.requests(),
            chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>()
        );
        for (i, fragment) in report.fragments.iter().enumerate() {
            assert_eq!(fragment.chunk, i);
        }
    }

    #[tokio::test]
    async fn test_call_cap_stops_early() {
        let provider = provider();
        let chunks = chunks(20);
        let report = generate(&provider, &chunks, &GenerationOptions::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(provider.call_count(), DEFAULT_MAX_CALLS);
        assert!(report.quota_reached);
        assert_eq!(report.processed, 15);
        assert_eq!(report.total_chunks, 20);
        assert_eq!(report.succeeded(), 15);
        assert!(!report.is_complete());

        // The generated prefix still stitches.
        let stitched = stitch(&report.wavs()).unwrap();
        assert_eq!(inspect(&stitched).unwrap().frames, 1500);
    }

    #[tokio::test]
    async fn test_exact_cap_is_not_quota_stop() {
        let provider = provider();
        let report = generate(&provider, &chunks(15), &GenerationOptions::default(), |_, _| {})
            .await
            .unwrap();
        assert!(!report.quota_reached);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_abort_policy_reports_failing_chunk() {
        let provider = provider().failing_on(2);
        let err = generate(&provider, &chunks(5), &GenerationOptions::default(), |_, _| {})
            .await
            .unwrap_err();

        let GenerationError::ChunkFailed {
            chunk,
            total,
            reason,
        } = &err;
        assert_eq!(*chunk, 2);
        assert_eq!(*total, 5);
        assert!(reason.contains("mock failure"));
        assert!(err.to_string().starts_with("chunk 3 of 5 failed"));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_skip_policy_continues() {
        let provider = provider().failing_on(1).empty_on(3);
        let options = GenerationOptions {
            error_policy: ErrorPolicy::Skip,
            ..Default::default()
        };
        let report = generate(&provider, &chunks(5), &options, |_, _| {})
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 5);
        assert_eq!(report.processed, 5);
        let failed: Vec<usize> = report.failures.iter().map(|f| f.chunk).collect();
        assert_eq!(failed, vec![1, 3]);
        let kept: Vec<usize> = report.fragments.iter().map(|f| f.chunk).collect();
        assert_eq!(kept, vec![0, 2, 4]);
        assert_eq!(report.chunk_of_fragment(1), Some(2));
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_streaming_matches_blocking() {
        let options = GenerationOptions {
            streaming: true,
            ..Default::default()
        };
        let streamed = provider().with_stream_parts(4);
        let report = generate(&streamed, &chunks(3), &options, |_, _| {})
            .await
            .unwrap();

        let blocking = generate(&provider(), &chunks(3), &GenerationOptions::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(report.wavs(), blocking.wavs());
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let provider = provider();
        let mut seen = Vec::new();
        generate(&provider, &chunks(3), &GenerationOptions::default(), |done, total| {
            seen.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_no_chunks() {
        let provider = provider();
        let report = generate(&provider, &[], &GenerationOptions::default(), |_, _| {})
            .await
            .unwrap();
        assert!(report.fragments.is_empty());
        assert!(report.is_complete());
        assert_eq!(provider.call_count(), 0);
    }
}
