//! WAV container decoding

use super::resample_to_target;
use crate::error::DecodeError;
use std::io::Cursor;

/// Decoded audio data
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Samples in [-1, 1], interleaved when `channels > 1`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
    /// Rate declared by the container before any resampling
    pub source_rate: u32,
}

impl AudioData {
    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Decode a WAV buffer to mono samples at the target sample rate
pub fn decode_audio(bytes: &[u8], target_sample_rate: u32) -> Result<AudioData, DecodeError> {
    let mut audio_data = decode_wav(bytes)?;

    // Downmix before resampling so interpolation runs on a single channel
    if audio_data.channels > 1 {
        audio_data.samples = audio_data.to_mono();
        audio_data.channels = 1;
    }

    if audio_data.sample_rate != target_sample_rate {
        audio_data.samples =
            resample_to_target(&audio_data.samples, audio_data.sample_rate, target_sample_rate);
        audio_data.sample_rate = target_sample_rate;
    }

    Ok(audio_data)
}

/// Decode a WAV buffer without downmixing or resampling
pub fn decode_wav(bytes: &[u8]) -> Result<AudioData, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DecodeError::Header(e.to_string()))?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(DecodeError::MissingMetadata("channel count"));
    }
    if spec.bits_per_sample == 0 {
        return Err(DecodeError::MissingMetadata("bit depth"));
    }
    if spec.sample_rate == 0 {
        return Err(DecodeError::MissingMetadata("sample rate"));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(DecodeError::UnsupportedSampleFormat(format!(
                    "{}-bit float",
                    spec.bits_per_sample
                )));
            }
            let raw = reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DecodeError::Samples(e.to_string()))?;
            if let Some(pos) = raw.iter().position(|s| !s.is_finite()) {
                return Err(DecodeError::Samples(format!(
                    "non-finite float sample at index {}",
                    pos
                )));
            }
            // Float PCM may overshoot full scale
            raw.into_iter().map(|s| s.clamp(-1.0, 1.0)).collect()
        }
        hound::SampleFormat::Int => {
            if spec.bits_per_sample > 32 {
                return Err(DecodeError::UnsupportedSampleFormat(format!(
                    "{}-bit integer",
                    spec.bits_per_sample
                )));
            }
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DecodeError::Samples(e.to_string()))?
        }
    };

    let frames = samples.len() as f64 / spec.channels as f64;
    let duration_ms = (frames / spec.sample_rate as f64 * 1000.0) as u32;

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration_ms,
        source_rate: spec.sample_rate,
    })
}
