//! WAV fragment stitching.
//!
//! Every fragment is parsed with `hound`, and its frames are appended in
//! order to one output container that carries the first fragment's header
//! parameters. Samples are copied as read: no resampling, gain, trimming or
//! crossfade is applied at fragment boundaries.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fmt;
use std::io::{Cursor, Seek, Write};
use thiserror::Error;

/// Audio parameters shared by every fragment of one stitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl From<WavSpec> for AudioParams {
    fn from(spec: WavSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            channels: spec.channels,
            sample_format: spec.sample_format,
        }
    }
}

impl From<AudioParams> for WavSpec {
    fn from(params: AudioParams) -> Self {
        WavSpec {
            channels: params.channels,
            sample_rate: params.sample_rate,
            bits_per_sample: params.bits_per_sample,
            sample_format: params.sample_format,
        }
    }
}

impl AudioParams {
    /// Nonzero sample rate and channel count.
    pub fn is_playable(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

impl fmt::Display for AudioParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self.sample_format {
            SampleFormat::Int => "int",
            SampleFormat::Float => "float",
        };
        write!(
            f,
            "{} Hz / {} ch / {}-bit {}",
            self.sample_rate, self.channels, self.bits_per_sample, format
        )
    }
}

/// Parameters and length of one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    pub params: AudioParams,
    /// Number of frames (samples per channel)
    pub frames: u32,
}

impl FragmentInfo {
    /// Playback length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.params.sample_rate == 0 {
            return 0;
        }
        self.frames as u64 * 1000 / self.params.sample_rate as u64
    }
}

/// Errors raised while assembling fragments.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("no audio fragments to stitch")]
    Empty,

    #[error("fragment {} is not a readable WAV container: {source}", .index + 1)]
    InvalidFragment {
        /// Zero-based position in the input sequence
        index: usize,
        #[source]
        source: hound::Error,
    },

    #[error("fragment {} has parameters {found}, expected {expected}", .index + 1)]
    ParameterMismatch {
        index: usize,
        expected: AudioParams,
        found: AudioParams,
    },

    #[error("fragment {} has unusable parameters {params}", .index + 1)]
    InvalidParameters { index: usize, params: AudioParams },

    #[error("fragments contain no audio frames")]
    NoFrames,

    #[error("unsupported audio payload: {mime_type}")]
    UnsupportedAudio { mime_type: String },

    #[error("failed to write WAV output: {0}")]
    Write(#[source] hound::Error),
}

/// Parse a fragment header. A zero sample rate or channel count is rejected.
fn open(index: usize, fragment: &[u8]) -> Result<WavReader<Cursor<&[u8]>>, StitchError> {
    let reader = WavReader::new(Cursor::new(fragment))
        .map_err(|source| StitchError::InvalidFragment { index, source })?;

    let params: AudioParams = reader.spec().into();
    if !params.is_playable() {
        return Err(StitchError::InvalidParameters { index, params });
    }

    Ok(reader)
}

/// Read the header of a single fragment.
pub fn inspect(fragment: &[u8]) -> Result<FragmentInfo, StitchError> {
    let reader = open(0, fragment)?;
    Ok(FragmentInfo {
        params: reader.spec().into(),
        frames: reader.duration(),
    })
}

/// Stitch WAV fragments into one WAV buffer.
///
/// The output header uses the first fragment's parameters. Any fragment that
/// cannot be parsed, or whose parameters differ from the first, fails the
/// whole stitch; no partial output is produced.
pub fn stitch<F: AsRef<[u8]>>(fragments: &[F]) -> Result<Vec<u8>, StitchError> {
    let first = fragments.first().ok_or(StitchError::Empty)?;
    let params: AudioParams = open(0, first.as_ref())?.spec().into();

    let mut out = Cursor::new(Vec::new());
    let mut total_frames: u64 = 0;
    {
        let mut writer = WavWriter::new(&mut out, params.into()).map_err(StitchError::Write)?;

        for (index, fragment) in fragments.iter().enumerate() {
            let reader = open(index, fragment.as_ref())?;
            let found: AudioParams = reader.spec().into();
            if found != params {
                return Err(StitchError::ParameterMismatch {
                    index,
                    expected: params,
                    found,
                });
            }

            total_frames += reader.duration() as u64;
            append_frames(index, reader, &mut writer)?;
        }

        if total_frames == 0 {
            return Err(StitchError::NoFrames);
        }

        writer.finalize().map_err(StitchError::Write)?;
    }

    log::debug!(
        "Stitched {} fragments: {} frames at {}",
        fragments.len(),
        total_frames,
        params
    );

    Ok(out.into_inner())
}

/// Copy every sample of `reader` into `writer`.
fn append_frames<W: Write + Seek>(
    index: usize,
    mut reader: WavReader<Cursor<&[u8]>>,
    writer: &mut WavWriter<W>,
) -> Result<(), StitchError> {
    match reader.spec().sample_format {
        SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                let sample =
                    sample.map_err(|source| StitchError::InvalidFragment { index, source })?;
                writer.write_sample(sample).map_err(StitchError::Write)?;
            }
        }
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                let sample =
                    sample.map_err(|source| StitchError::InvalidFragment { index, source })?;
                writer.write_sample(sample).map_err(StitchError::Write)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a 16-bit mono WAV whose samples are `start..start + frames`.
    fn wav_fragment(sample_rate: u32, frames: u32, start: i16) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut out = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut out, spec).unwrap();
            for i in 0..frames {
                writer.write_sample(start.wrapping_add(i as i16)).unwrap();
            }
            writer.finalize().unwrap();
        }
        out.into_inner()
    }

    fn samples(wav: &[u8]) -> Vec<i16> {
        WavReader::new(Cursor::new(wav))
            .unwrap()
            .samples::<i16>()
            .map(|s| s.unwrap())
            .collect()
    }

    #[test]
    fn test_stitch_empty_fails() {
        let fragments: Vec<Vec<u8>> = Vec::new();
        assert!(matches!(stitch(&fragments), Err(StitchError::Empty)));
    }

    #[test]
    fn test_stitch_sums_frames_and_keeps_header() {
        let fragments = vec![wav_fragment(24000, 48000, 0), wav_fragment(24000, 24000, 7)];

        let stitched = stitch(&fragments).unwrap();
        let info = inspect(&stitched).unwrap();

        assert_eq!(info.params.sample_rate, 24000);
        assert_eq!(info.params.channels, 1);
        assert_eq!(info.params.bits_per_sample, 16);
        assert_eq!(info.params.sample_format, SampleFormat::Int);
        assert_eq!(info.frames, 72000);
        assert_eq!(info.duration_ms(), 3000);
    }

    #[test]
    fn test_stitch_preserves_frame_order() {
        let a = wav_fragment(24000, 5, 100);
        let b = wav_fragment(24000, 3, -50);
        let c = wav_fragment(24000, 4, 1000);

        let stitched = stitch(&[&a[..], &b[..], &c[..]]).unwrap();

        let mut expected = samples(&a);
        expected.extend(samples(&b));
        expected.extend(samples(&c));
        assert_eq!(samples(&stitched), expected);
    }

    #[test]
    fn test_single_fragment_round_trips_bytes() {
        let a = wav_fragment(24000, 10, 3);
        assert_eq!(stitch(&[a.clone()]).unwrap(), a);
    }

    #[test]
    fn test_unreadable_first_fragment() {
        let err = stitch(&[b"not a wav".to_vec()]).unwrap_err();
        assert!(matches!(err, StitchError::InvalidFragment { index: 0, .. }));
    }

    #[test]
    fn test_unreadable_later_fragment_fails_whole_stitch() {
        let fragments = vec![
            wav_fragment(24000, 10, 0),
            wav_fragment(24000, 10, 0),
            b"RIFF\x00\x00\x00\x00garbage".to_vec(),
        ];
        let err = stitch(&fragments).unwrap_err();
        assert!(matches!(err, StitchError::InvalidFragment { index: 2, .. }));
        assert!(err.to_string().starts_with("fragment 3 "));
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let fragments = vec![wav_fragment(24000, 10, 0), wav_fragment(16000, 10, 0)];
        match stitch(&fragments) {
            Err(StitchError::ParameterMismatch {
                index,
                expected,
                found,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(expected.sample_rate, 24000);
                assert_eq!(found.sample_rate, 16000);
            }
            other => panic!("expected mismatch, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_header_only_output_refused() {
        let fragments = vec![wav_fragment(24000, 0, 0), wav_fragment(24000, 0, 0)];
        assert!(matches!(stitch(&fragments), Err(StitchError::NoFrames)));
    }

    #[test]
    fn test_float_fragments_stitch() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut out = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut out, spec).unwrap();
            for s in [0.25f32, -0.5, 0.75] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        let fragment = out.into_inner();

        let stitched = stitch(&[fragment.clone(), fragment]).unwrap();
        let info = inspect(&stitched).unwrap();
        assert_eq!(info.frames, 6);
        assert_eq!(info.params.sample_format, SampleFormat::Float);
    }

    /// A well-formed 16-bit mono fragment with the rate fields zeroed.
    fn zero_rate_fragment() -> Vec<u8> {
        let mut wav = wav_fragment(24000, 2, 0);
        // Sample rate and byte rate in the 44-byte header.
        wav[24..32].fill(0);
        wav
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let err = stitch(&[zero_rate_fragment()]).unwrap_err();
        match err {
            StitchError::InvalidParameters { index, params } => {
                assert_eq!(index, 0);
                assert_eq!(params.sample_rate, 0);
            }
            other => panic!("expected invalid parameters, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_sample_rate_later_fragment() {
        let fragments = vec![wav_fragment(24000, 2, 0), zero_rate_fragment()];
        let err = stitch(&fragments).unwrap_err();
        assert!(err.to_string().starts_with("fragment 2 has unusable parameters"));
        assert!(inspect(&zero_rate_fragment()).is_err());
    }

    #[test]
    fn test_params_display() {
        let info = inspect(&wav_fragment(24000, 1, 0)).unwrap();
        assert_eq!(info.params.to_string(), "24000 Hz / 1 ch / 16-bit int");
    }
}
