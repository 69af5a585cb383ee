//! Turn provider payloads into WAV fragments.

use super::stitcher::StitchError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use tts_client::SpeechAudio;

/// Sample rate assumed for raw PCM when the MIME type does not say.
pub const DEFAULT_PCM_RATE: u32 = 24000;

const WAV_MIME_TYPES: &[&str] = &["audio/wav", "audio/x-wav", "audio/wave", "audio/vnd.wave"];
const PCM_MIME_TYPES: &[&str] = &["audio/l16", "audio/pcm"];

/// Convert one provider payload into WAV container bytes.
///
/// WAV payloads pass through unchanged. Raw 16-bit PCM (`audio/L16`) is
/// wrapped in a WAV header using the `rate` and `channels` MIME parameters;
/// a zero for either is rejected.
pub fn into_wav(audio: SpeechAudio) -> Result<Vec<u8>, StitchError> {
    let (base, params) = parse_mime(&audio.mime_type);

    if WAV_MIME_TYPES.contains(&base.as_str()) || audio.data.starts_with(b"RIFF") {
        return Ok(audio.data);
    }

    if PCM_MIME_TYPES.contains(&base.as_str()) {
        let rate = mime_param(&params, "rate").unwrap_or(DEFAULT_PCM_RATE);
        let channels = mime_param(&params, "channels").unwrap_or(1);
        if rate == 0 || channels == 0 {
            return Err(StitchError::UnsupportedAudio {
                mime_type: audio.mime_type,
            });
        }
        return wrap_pcm(&audio.data, rate, channels);
    }

    Err(StitchError::UnsupportedAudio {
        mime_type: audio.mime_type,
    })
}

/// Wrap little-endian 16-bit PCM samples in a WAV container.
///
/// Gemini delivers `audio/L16` little-endian. A trailing odd byte is dropped.
pub fn wrap_pcm(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, StitchError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    if sample_rate == 0 || channels == 0 {
        return Err(StitchError::UnsupportedAudio {
            mime_type: format!("audio/L16;rate={};channels={}", sample_rate, channels),
        });
    }

    if pcm.len() % 2 != 0 {
        log::warn!("PCM payload has odd length {}, dropping last byte", pcm.len());
    }

    let mut out = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut out, spec).map_err(StitchError::Write)?;
        for pair in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            writer.write_sample(sample).map_err(StitchError::Write)?;
        }
        writer.finalize().map_err(StitchError::Write)?;
    }

    Ok(out.into_inner())
}

/// Split `audio/L16;codec=pcm;rate=24000` into its base type and parameters.
fn parse_mime(mime: &str) -> (String, Vec<(String, String)>) {
    let mut parts = mime.split(';');
    let base = parts.next().unwrap_or_default().trim().to_lowercase();
    let params = parts
        .filter_map(|p| {
            let (key, value) = p.split_once('=')?;
            Some((key.trim().to_lowercase(), value.trim().to_string()))
        })
        .collect();
    (base, params)
}

fn mime_param<T: std::str::FromStr>(params: &[(String, String)], key: &str) -> Option<T> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}
