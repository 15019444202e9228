//! .tfp postings file structures

use crc::{Crc, CRC_64_ECMA_182};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes for .tfp files: "TTFP"
pub const MAGIC: [u8; 4] = *b"TTFP";

/// Current format version
pub const VERSION: u16 = 1;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 48;

/// Encoded size of one posting: u64 hash + u32 offset
pub const POSTING_SIZE: usize = 12;

/// Checksum over the uncompressed posting payload
pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

const FLAG_COMPRESSED: u16 = 0x1;

/// Errors specific to postings files
#[derive(Debug, Error)]
pub enum FpFormatError {
    #[error("invalid postings file: magic bytes mismatch")]
    BadMagic,

    #[error("unsupported postings file version {0}")]
    UnsupportedVersion(u16),

    #[error("checksum mismatch: header {expected:#018x}, payload {actual:#018x}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("payload holds {actual} bytes, header promises {expected}")]
    TruncatedPayload { expected: usize, actual: usize },

    #[error("incompatible analysis parameters: file has {file}, engine runs {engine}")]
    Incompatible { file: String, engine: String },
}

/// Analysis parameters that determine hash semantics.
///
/// Postings produced under different parameters are not comparable, so every
/// file records the values it was generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub sample_rate: u32,
    pub frame_size: u32,
    pub hop_size: u32,
}

impl AnalysisParams {
    /// Fail unless `self` (from a file) matches the running engine's parameters
    pub fn ensure_compatible(&self, engine: &AnalysisParams) -> Result<(), FpFormatError> {
        if self == engine {
            Ok(())
        } else {
            Err(FpFormatError::Incompatible {
                file: self.to_string(),
                engine: engine.to_string(),
            })
        }
    }
}

impl std::fmt::Display for AnalysisParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz / frame {} / hop {}",
            self.sample_rate, self.frame_size, self.hop_size
        )
    }
}

/// File header (48 bytes fixed size)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpHeader {
    /// Magic bytes: "TTFP"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: zstd-compressed payload)
    pub flags: u16,
    /// Number of postings
    pub num_postings: u32,
    /// Analysis sample rate (Hz)
    pub sample_rate: u32,
    /// STFT frame size
    pub frame_size: u32,
    /// STFT hop size
    pub hop_size: u32,
    /// Duration of the fingerprinted audio (milliseconds)
    pub duration_ms: u32,
    /// Stored payload size (after compression, if any)
    pub payload_size: u64,
    /// CRC-64 of the uncompressed payload
    pub checksum: u64,
    /// Reserved
    pub reserved: u32,
}

impl FpHeader {
    pub fn new(params: AnalysisParams, num_postings: u32, duration_ms: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            num_postings,
            sample_rate: params.sample_rate,
            frame_size: params.frame_size,
            hop_size: params.hop_size,
            duration_ms,
            payload_size: 0,
            checksum: 0,
            reserved: 0,
        }
    }

    pub fn params(&self) -> AnalysisParams {
        AnalysisParams {
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
            hop_size: self.hop_size,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & FLAG_COMPRESSED) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= FLAG_COMPRESSED;
        } else {
            self.flags &= !FLAG_COMPRESSED;
        }
    }
}

/// Metadata section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FpMetadata {
    /// Identifier the postings are indexed under (usually the file stem)
    pub identifier: String,
    /// Original audio filename
    pub original_filename: String,
}

/// Complete postings file
#[derive(Debug, Clone, PartialEq)]
pub struct FpFile {
    pub header: FpHeader,
    pub metadata: FpMetadata,
    /// Posting data: (hash, offset_ms)
    pub postings: Vec<(u64, u32)>,
}

impl FpFile {
    pub fn new(
        metadata: FpMetadata,
        params: AnalysisParams,
        duration_ms: u32,
        postings: Vec<(u64, u32)>,
    ) -> Self {
        Self {
            header: FpHeader::new(params, postings.len() as u32, duration_ms),
            metadata,
            postings,
        }
    }

    /// Encode postings as the raw (uncompressed) payload
    pub fn encode_payload(postings: &[(u64, u32)]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(postings.len() * POSTING_SIZE);
        for (hash, offset_ms) in postings {
            payload.extend_from_slice(&hash.to_le_bytes());
            payload.extend_from_slice(&offset_ms.to_le_bytes());
        }
        payload
    }

    /// Decode a raw payload into postings
    pub fn decode_payload(payload: &[u8]) -> Vec<(u64, u32)> {
        payload
            .chunks_exact(POSTING_SIZE)
            .map(|chunk| {
                let mut hash = [0u8; 8];
                let mut offset = [0u8; 4];
                hash.copy_from_slice(&chunk[..8]);
                offset.copy_from_slice(&chunk[8..]);
                (u64::from_le_bytes(hash), u32::from_le_bytes(offset))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AnalysisParams {
        AnalysisParams {
            sample_rate: 44100,
            frame_size: 2048,
            hop_size: 512,
        }
    }

    #[test]
    fn test_compressed_flag() {
        let mut header = FpHeader::new(params(), 0, 0);
        assert!(!header.is_compressed());
        header.set_compressed(true);
        assert!(header.is_compressed());
        header.set_compressed(false);
        assert_eq!(header.flags, 0);
    }

    #[test]
    fn test_payload_layout() {
        let payload = FpFile::encode_payload(&[(0x1_0000_0001, 7)]);
        assert_eq!(payload.len(), POSTING_SIZE);
        assert_eq!(&payload[..8], &0x1_0000_0001u64.to_le_bytes());
        assert_eq!(FpFile::decode_payload(&payload), vec![(0x1_0000_0001, 7)]);
    }

    #[test]
    fn test_incompatible_params_rejected() {
        let other = AnalysisParams {
            hop_size: 256,
            ..params()
        };
        assert!(params().ensure_compatible(&params()).is_ok());
        let err = other.ensure_compatible(&params()).unwrap_err();
        assert!(err.to_string().contains("hop 256"));
    }
}
