//! TuneTrace Core - landmark audio fingerprinting and matching
//!
//! Audio is reduced to pairs of spectral peaks hashed into postings. Tracks
//! are indexed by those postings; a query clip is matched by counting how
//! many of its postings agree on one time offset within one track.

pub mod audio;
pub mod chunking;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod ingest;
pub mod matching;
pub mod metadata;
pub mod object_store;
pub mod peaks;
pub mod queue;
pub mod service_config;
pub mod session;
pub mod transform;

pub use config::TuneTraceConfig;
pub use error::{DecodeError, Result, TuneTraceError};
pub use fingerprint::{landmark_hash, unpack_hash, LandmarkHasher, Posting};
pub use index::{index_key, FingerprintIndex, IndexEntry, MemoryIndex, PostgresIndex};
pub use ingest::IngestionWorker;
pub use matching::{MatchResult, Matcher, MatchingConfig, TieBreak};
pub use metadata::{MemoryMetadataStore, MetadataStore, PostgresMetadataStore, Track, TrackStatus};
pub use object_store::{FilesystemObjectStore, MemoryObjectStore, ObjectStore};
pub use peaks::{Peak, PeakExtractor};
pub use queue::{ChannelQueue, IngestJob, JobQueue};
pub use service_config::ServiceConfig;
pub use session::{ClientMessage, ServerMessage, StreamingSession};

/// Fingerprint mono samples already at the target sample rate
pub fn fingerprint_samples(samples: &[f32], config: &TuneTraceConfig) -> Vec<Posting> {
    let spectrogram = transform::compute_spectrogram(samples, config);
    if spectrogram.is_empty() {
        return Vec::new();
    }

    let peaks = PeakExtractor::new(config).extract(&spectrogram.to_decibels());
    let postings = LandmarkHasher::new(config).postings(&peaks);

    log::trace!(
        "{} samples -> {} frames, {} peaks, {} postings",
        samples.len(),
        spectrogram.num_frames,
        peaks.len(),
        postings.len()
    );

    postings
}

/// Fingerprint a WAV container
pub fn fingerprint_audio(bytes: &[u8], config: &TuneTraceConfig) -> Result<Vec<Posting>> {
    let audio = audio::decode_audio(bytes, config.target_sample_rate)?;
    Ok(fingerprint_samples(&audio.samples, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_bursts(seed: u32, count: usize) -> Vec<f32> {
        let mut state = seed;
        let mut samples = vec![0.0f32; count * 4096 + 2048];
        for k in 0..count {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let bin = 20 + (state >> 16) as usize % 380;
            let freq = bin as f32 * 44100.0 / 2048.0;
            for n in 0..2048 {
                let env = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / 2047.0).cos());
                samples[k * 4096 + n] =
                    0.5 * env * (2.0 * std::f32::consts::PI * freq * n as f32 / 44100.0).sin();
            }
        }
        samples
    }

    #[test]
    fn test_fingerprinting_is_deterministic() {
        let config = TuneTraceConfig::default();
        let wav = chunking::encode_wav_pcm16(&tone_bursts(7, 20), 44100).unwrap();
        let first = fingerprint_audio(&wav, &config).unwrap();
        let second = fingerprint_audio(&wav, &config).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_postings_are_in_anchor_order() {
        let config = TuneTraceConfig::default();
        let postings = fingerprint_samples(&tone_bursts(11, 20), &config);
        assert!(postings.windows(2).all(|w| w[0].offset_ms <= w[1].offset_ms));
        for p in &postings {
            let (_, _, dt) = unpack_hash(p.hash);
            assert!((1..=20).contains(&dt));
        }
    }

    #[test]
    fn test_short_and_silent_audio_yield_nothing() {
        let config = TuneTraceConfig::default();
        assert!(fingerprint_samples(&[0.3; 2000], &config).is_empty());
        assert!(fingerprint_samples(&vec![0.0; 44100], &config).is_empty());
        let wav = chunking::encode_wav_pcm16(&[], 44100).unwrap();
        assert!(fingerprint_audio(&wav, &config).unwrap().is_empty());
    }

    #[test]
    fn test_nan_in_silence_never_reaches_the_index() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for n in 0..44100 {
                writer.write_sample(if n == 20000 { f32::NAN } else { 0.0 }).unwrap();
            }
            writer.finalize().unwrap();
        }

        let err = fingerprint_audio(&cursor.into_inner(), &TuneTraceConfig::default()).unwrap_err();
        assert_eq!(err.code(), "decode_error");
    }

    #[test]
    fn test_invalid_container_is_decode_error() {
        let err = fingerprint_audio(b"OggS....", &TuneTraceConfig::default()).unwrap_err();
        assert!(matches!(err, TuneTraceError::Decode(_)));
    }
}
