//! Layered audio loading.
//!
//! Decoders are tried in order: the WAV reader, then the general-purpose
//! symphonia decoder (with the file extension as a format hint). If every decoder
//! fails, [`load_audio`] returns three seconds of low-amplitude noise and
//! marks the clip as synthetic so callers can tell.
//!
//! Decoding stops after `max_seconds` of audio and the clip records whether
//! it was cut.

use rand::Rng;
use std::path::Path;

/// Sample rate of the synthetic fallback clip.
pub const SYNTHETIC_SAMPLE_RATE: u32 = 22_050;

/// Length of the synthetic fallback clip in seconds.
pub const SYNTHETIC_SECONDS: u32 = 3;

/// Peak amplitude of the synthetic fallback clip.
pub const SYNTHETIC_AMPLITUDE: f32 = 0.1;

/// Default cap on decoded audio length.
pub const DEFAULT_MAX_AUDIO_SECONDS: u32 = 60;

/// Errors from a single decoder attempt.
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// File could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV container or sample error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// General decoder error.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Decoding succeeded but produced nothing usable.
    #[error("No audio samples decoded")]
    Empty,
}

/// Mono audio ready for analysis.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono samples, nominally in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Samples per second.
    pub sample_rate: u32,
    /// Name of the decoder that produced the clip (`synthetic` for the fallback).
    pub decoder: &'static str,
    /// Whether the samples are generated noise rather than the upload.
    pub synthetic: bool,
    /// Whether decoding stopped at the length cap.
    pub truncated: bool,
}

impl AudioClip {
    /// Duration in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / f64::from(self.sample_rate)
        }
    }
}

/// Output of one decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Mono samples.
    pub samples: Vec<f32>,
    /// Samples per second.
    pub sample_rate: u32,
    /// More audio followed the last returned sample.
    pub truncated: bool,
}

/// A way of turning a file into mono samples.
pub trait AudioDecoder: Send + Sync {
    /// Short name used in logs and responses.
    fn name(&self) -> &'static str;

    /// Decode at most `max_seconds` of `path` into mono samples.
    fn decode(&self, path: &Path, max_seconds: u32) -> Result<Decoded, AudioError>;
}

/// Number of mono frames in `max_seconds` at `sample_rate`.
#[must_use]
pub fn frame_limit(sample_rate: u32, max_seconds: u32) -> usize {
    sample_rate as usize * max_seconds as usize
}

/// Average interleaved frames down to one channel.
#[must_use]
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// WAV
// ---------------------------------------------------------------------------

/// PCM / IEEE-float WAV reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, path: &Path, max_seconds: u32) -> Result<Decoded, AudioError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let max_frames = frame_limit(spec.sample_rate, max_seconds);
        let truncated = reader.duration() as usize > max_frames;
        let max_samples = max_frames.saturating_mul(usize::from(spec.channels));

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .take(max_samples)
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max_value = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .take(max_samples)
                    .map(|s| s.map(|s| s as f32 / max_value))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let mono = downmix(&samples, usize::from(spec.channels));
        if mono.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Decoded {
            samples: mono,
            sample_rate: spec.sample_rate,
            truncated,
        })
    }
}

// ---------------------------------------------------------------------------
// General decoder
// ---------------------------------------------------------------------------

/// Container-probing decoder for everything symphonia supports
/// (OGG/Vorbis, FLAC, MP3, WebM/Matroska, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn decode(&self, path: &Path, max_seconds: u32) -> Result<Decoded, AudioError> {
        use symphonia::core::audio::SampleBuffer;
        use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
        use symphonia::core::errors::Error as SymphoniaError;
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode("no audio track found".to_string()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| AudioError::Decode("unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(e.to_string()))?;

        let max_frames = frame_limit(sample_rate, max_seconds);
        let mut mono: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut truncated = false;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Error reading audio packet");
                    break;
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(error = %e, "Error decoding audio packet");
                    continue;
                }
            };

            let spec = *decoded.spec();
            if sample_buf.is_none() {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                mono.extend(downmix(buf.samples(), spec.channels.count()));
            }
            if mono.len() >= max_frames {
                truncated = mono.len() > max_frames || format.next_packet().is_ok();
                mono.truncate(max_frames);
                break;
            }
        }

        if mono.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Decoded {
            samples: mono,
            sample_rate,
            truncated,
        })
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

/// Three seconds of uniform noise in `[-0.1, 0.1]` at 22.05 kHz.
#[must_use]
pub fn synthetic_clip() -> AudioClip {
    let mut rng = rand::thread_rng();
    let len = (SYNTHETIC_SAMPLE_RATE * SYNTHETIC_SECONDS) as usize;
    AudioClip {
        samples: (0..len)
            .map(|_| rng.gen_range(-SYNTHETIC_AMPLITUDE..=SYNTHETIC_AMPLITUDE))
            .collect(),
        sample_rate: SYNTHETIC_SAMPLE_RATE,
        decoder: "synthetic",
        synthetic: true,
        truncated: false,
    }
}

/// Try each decoder in turn; fall back to [`synthetic_clip`].
///
/// Never fails. Every failed attempt is logged. Decoded audio longer than
/// `max_seconds` is cut to that length whatever the decoder returned.
pub fn load_audio_with(
    path: &Path,
    decoders: &[&dyn AudioDecoder],
    max_seconds: u32,
) -> AudioClip {
    for decoder in decoders {
        match decoder.decode(path, max_seconds) {
            Ok(decoded) if decoded.sample_rate > 0 => {
                let Decoded {
                    mut samples,
                    sample_rate,
                    mut truncated,
                } = decoded;
                let max_frames = frame_limit(sample_rate, max_seconds);
                if samples.len() > max_frames {
                    samples.truncate(max_frames);
                    truncated = true;
                }
                if truncated {
                    tracing::warn!(
                        decoder = decoder.name(),
                        path = %path.display(),
                        max_seconds,
                        "Audio longer than the analysis cap, truncated"
                    );
                }
                tracing::info!(
                    decoder = decoder.name(),
                    path = %path.display(),
                    samples = samples.len(),
                    sample_rate,
                    "Audio decoded"
                );
                return AudioClip {
                    samples,
                    sample_rate,
                    decoder: decoder.name(),
                    synthetic: false,
                    truncated,
                };
            }
            Ok(_) => {
                tracing::warn!(decoder = decoder.name(), path = %path.display(), "Decoder reported a zero sample rate");
            }
            Err(e) => {
                tracing::warn!(decoder = decoder.name(), path = %path.display(), error = %e, "Audio decode attempt failed");
            }
        }
    }

    tracing::warn!(
        path = %path.display(),
        "All decoders failed, substituting synthetic noise"
    );
    synthetic_clip()
}

/// [`load_audio_with`] using the WAV reader then symphonia.
pub fn load_audio(path: &Path, max_seconds: u32) -> AudioClip {
    let decoders: [&dyn AudioDecoder; 2] = [&WavDecoder, &SymphoniaDecoder];
    load_audio_with(path, &decoders, max_seconds)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write a mono or stereo 16-bit WAV to `path`.
    pub(crate) fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in frames {
            for _ in 0..channels {
                writer
                    .write_sample((s * f32::from(i16::MAX)) as i16)
                    .unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_downmix() {
        assert_eq!(downmix(&[1.0, 3.0, -1.0, 1.0], 2), vec![2.0, 0.0]);
        assert_eq!(downmix(&[0.5, 0.25], 1), vec![0.5, 0.25]);
    }

    #[test]
    fn test_wav_decoder_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 2, 16_000, &[0.5; 1600]);

        let decoded = WavDecoder.decode(&path, DEFAULT_MAX_AUDIO_SECONDS).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.samples.len(), 1600);
        assert!(!decoded.truncated);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_wav_decoder_stops_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, 2, 8_000, &[0.25; 3 * 8_000]);

        let decoded = WavDecoder.decode(&path, 1).unwrap();
        assert_eq!(decoded.samples.len(), 8_000);
        assert!(decoded.truncated);

        let clip = load_audio(&path, 1);
        assert!(clip.truncated);
        assert!((clip.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_audio_prefers_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        write_wav(&path, 1, 22_050, &[0.1; 2205]);

        let clip = load_audio(&path, DEFAULT_MAX_AUDIO_SECONDS);
        assert!(!clip.synthetic);
        assert!(!clip.truncated);
        assert_eq!(clip.decoder, "wav");
        assert!((clip.duration_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_garbage_falls_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.webm");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let clip = load_audio(&path, DEFAULT_MAX_AUDIO_SECONDS);
        assert!(clip.synthetic);
        assert_eq!(clip.decoder, "synthetic");
        assert_eq!(clip.sample_rate, SYNTHETIC_SAMPLE_RATE);
        assert_eq!(clip.samples.len(), 3 * 22_050);
        assert!(clip
            .samples
            .iter()
            .all(|s| s.abs() <= SYNTHETIC_AMPLITUDE));
    }

    #[test]
    fn test_custom_decoder_chain() {
        struct Fixed;
        impl AudioDecoder for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn decode(&self, _path: &Path, _max_seconds: u32) -> Result<Decoded, AudioError> {
                Ok(Decoded {
                    samples: vec![0.0; 10],
                    sample_rate: 8_000,
                    truncated: false,
                })
            }
        }
        struct Failing;
        impl AudioDecoder for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn decode(&self, _path: &Path, _max_seconds: u32) -> Result<Decoded, AudioError> {
                Err(AudioError::Empty)
            }
        }

        let decoders: [&dyn AudioDecoder; 2] = [&Failing, &Fixed];
        let clip = load_audio_with(Path::new("/nonexistent"), &decoders, 1);
        assert_eq!(clip.decoder, "fixed");
        assert_eq!(clip.sample_rate, 8_000);
        assert!(!clip.truncated);
    }

    #[test]
    fn test_loader_caps_decoders_that_ignore_the_limit() {
        struct Unbounded;
        impl AudioDecoder for Unbounded {
            fn name(&self) -> &'static str {
                "unbounded"
            }
            fn decode(&self, _path: &Path, _max_seconds: u32) -> Result<Decoded, AudioError> {
                Ok(Decoded {
                    samples: vec![0.1; 10 * 1_000],
                    sample_rate: 1_000,
                    truncated: false,
                })
            }
        }

        let decoders: [&dyn AudioDecoder; 1] = [&Unbounded];
        let clip = load_audio_with(Path::new("/nonexistent"), &decoders, 2);
        assert_eq!(clip.samples.len(), 2_000);
        assert!(clip.truncated);
    }
}
