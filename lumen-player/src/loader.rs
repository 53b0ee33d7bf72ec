//! Track decoding with Symphonia

use std::path::Path;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::info;

/// Errors surfaced while loading a track
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("track has no playable url")]
    EmptyUrl,
    #[error("cannot open source: {0}")]
    Unreachable(#[from] std::io::Error),
    #[error("no audio track found in file")]
    NoAudioTrack,
    #[error("decode error: {0}")]
    Decode(String),
}

/// Fully decoded audio ready for the track source
pub struct DecodedAudio {
    /// Interleaved stereo samples, [-1, 1]
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// Decodes playable urls into in-memory stereo buffers
pub struct TrackLoader;

impl TrackLoader {
    pub fn new() -> Self {
        Self
    }

    /// Decode the whole file at `url` into interleaved stereo f32
    pub fn load(&self, url: &str) -> Result<DecodedAudio, LoadError> {
        if url.trim().is_empty() {
            return Err(LoadError::EmptyUrl);
        }

        let path = Path::new(url);
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(_) => continue,
            };

            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;

            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        // Fold any channel count down to interleaved stereo
        let samples = to_stereo(&samples, channels);

        let total_frames = samples.len() / 2;
        let duration_secs = total_frames as f64 / sample_rate as f64;

        info!(url, sample_rate, duration_secs, "track decoded");

        Ok(DecodedAudio {
            samples: Arc::new(samples),
            sample_rate,
            duration_secs,
        })
    }
}

impl Default for TrackLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert interleaved samples of any channel count to stereo.
/// Mono is duplicated, surround is averaged down.
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        0 => Vec::new(),
        n => {
            let frames = samples.len() / n;
            let mut out = Vec::with_capacity(frames * 2);
            for frame in 0..frames {
                let base = frame * n;
                // Front left/right plus an even share of the rest
                let mut left = samples[base];
                let mut right = samples[base + 1];
                for ch in 2..n {
                    let spread = samples[base + ch] / (n - 2) as f32;
                    left += spread * 0.5;
                    right += spread * 0.5;
                }
                out.push(left);
                out.push(right);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_rejected() {
        let loader = TrackLoader::new();
        assert!(matches!(loader.load(""), Err(LoadError::EmptyUrl)));
        assert!(matches!(loader.load("   "), Err(LoadError::EmptyUrl)));
    }

    #[test]
    fn test_missing_file_is_unreachable() {
        let loader = TrackLoader::new();
        assert!(matches!(
            loader.load("/nonexistent/path/song.mp3"),
            Err(LoadError::Unreachable(_))
        ));
    }

    #[test]
    fn test_mono_is_duplicated_to_stereo() {
        let stereo = to_stereo(&[0.1, 0.2], 1);
        assert_eq!(stereo, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_stereo_passes_through() {
        let stereo = to_stereo(&[0.1, 0.2, 0.3, 0.4], 2);
        assert_eq!(stereo, vec![0.1, 0.2, 0.3, 0.4]);
    }
}
