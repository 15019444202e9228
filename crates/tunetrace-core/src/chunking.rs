//! Client-side chunking for the streaming endpoint
//!
//! Splits a recording into fixed-length chunks and encodes each as a mono
//! 16-bit PCM WAV, the layout browsers send over the stream socket.

use std::io::Cursor;

/// Default chunk length sent by streaming clients
pub const DEFAULT_CHUNK_SECONDS: f64 = 1.5;

/// Quantize a float sample the way browser clients do
fn to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode mono samples as a 16-bit PCM WAV file
pub fn encode_wav_pcm16(samples: &[f32], sample_rate: u32) -> hound::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let mut i16_writer = writer.get_i16_writer(samples.len() as u32);
        for &s in samples {
            i16_writer.write_sample(to_pcm16(s));
        }
        i16_writer.flush()?;
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// One fixed-length piece of a recording
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Chunk number (0-based)
    pub index: usize,
    /// First sample of the chunk within the recording
    pub start_sample: usize,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn start_ms(&self) -> u64 {
        (self.start_sample as u64 * 1000) / self.sample_rate as u64
    }

    pub fn to_wav(&self) -> hound::Result<Vec<u8>> {
        encode_wav_pcm16(&self.samples, self.sample_rate)
    }
}

/// Split a recording into back-to-back chunks of `chunk_seconds`
///
/// A trailing partial chunk is dropped: clients only ever send full chunks.
pub fn split_chunks(samples: &[f32], sample_rate: u32, chunk_seconds: f64) -> Vec<AudioChunk> {
    let chunk_len = (sample_rate as f64 * chunk_seconds).floor() as usize;
    if chunk_len == 0 {
        return Vec::new();
    }

    samples
        .chunks_exact(chunk_len)
        .enumerate()
        .map(|(index, chunk)| AudioChunk {
            index,
            start_sample: index * chunk_len,
            samples: chunk.to_vec(),
            sample_rate,
        })
        .collect()
}

/// Incremental chunker for audio arriving in arbitrary-sized blocks
#[derive(Debug)]
pub struct Chunker {
    chunk_len: usize,
    buffered: Vec<f32>,
}

impl Chunker {
    pub fn new(sample_rate: u32, chunk_seconds: f64) -> Self {
        Self {
            chunk_len: ((sample_rate as f64 * chunk_seconds).floor() as usize).max(1),
            buffered: Vec::new(),
        }
    }

    pub fn push(&mut self, block: &[f32]) {
        self.buffered.extend_from_slice(block);
    }

    pub fn has_chunk(&self) -> bool {
        self.buffered.len() >= self.chunk_len
    }

    /// Take the oldest full chunk, if one is buffered
    pub fn take_chunk(&mut self) -> Option<Vec<f32>> {
        if !self.has_chunk() {
            return None;
        }
        let rest = self.buffered.split_off(self.chunk_len);
        Some(std::mem::replace(&mut self.buffered, rest))
    }
}
