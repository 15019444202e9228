//! Audio decoding and resampling
//!
//! Accepts self-describing PCM WAV containers only. Anything else is expected
//! to be transcoded to WAV before it reaches the engine.

mod decoder;
mod resample;

pub use decoder::{decode_audio, decode_wav, AudioData};
pub use resample::resample_to_target;
