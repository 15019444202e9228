//! .tfp file reader

use crate::format::{
    FpFile, FpFormatError, FpHeader, FpMetadata, CRC64, MAGIC, POSTING_SIZE, VERSION,
};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Upper bound on a metadata string, guards against garbage length prefixes
const MAX_METADATA_FIELD: usize = 64 * 1024;

pub struct FpReader;

impl FpReader {
    /// Read .tfp file
    pub fn read(path: &Path) -> Result<FpFile> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open .tfp file: {}", path.display()))?;

        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
            .with_context(|| format!("Failed to read .tfp file: {}", path.display()))
    }

    /// Read a postings file from any source
    pub fn read_from<R: Read>(reader: &mut R) -> Result<FpFile> {
        let header = Self::read_header(reader)?;

        if header.magic != MAGIC {
            return Err(FpFormatError::BadMagic.into());
        }
        if header.version != VERSION {
            return Err(FpFormatError::UnsupportedVersion(header.version).into());
        }

        let metadata = Self::read_metadata(reader)?;

        // Sizes come from the file; never allocate more than is actually there
        let mut stored = Vec::new();
        reader
            .by_ref()
            .take(header.payload_size)
            .read_to_end(&mut stored)
            .context("Failed to read posting payload")?;
        if stored.len() as u64 != header.payload_size {
            return Err(FpFormatError::TruncatedPayload {
                expected: header.payload_size as usize,
                actual: stored.len(),
            }
            .into());
        }

        let expected = header.num_postings as usize * POSTING_SIZE;
        let raw = if header.is_compressed() {
            let mut raw = Vec::new();
            zstd::stream::read::Decoder::new(&stored[..])
                .context("Failed to open compressed posting payload")?
                .take(expected as u64 + 1)
                .read_to_end(&mut raw)
                .context("Failed to decompress posting payload")?;
            raw
        } else {
            stored
        };

        if raw.len() != expected {
            return Err(FpFormatError::TruncatedPayload {
                expected,
                actual: raw.len(),
            }
            .into());
        }

        let actual = CRC64.checksum(&raw);
        if actual != header.checksum {
            return Err(FpFormatError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            }
            .into());
        }

        let postings = FpFile::decode_payload(&raw);

        Ok(FpFile {
            header,
            metadata,
            postings,
        })
    }

    fn read_header<R: Read>(reader: &mut R) -> Result<FpHeader> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        Ok(FpHeader {
            magic,
            version: Self::read_u16(reader)?,
            flags: Self::read_u16(reader)?,
            num_postings: Self::read_u32(reader)?,
            sample_rate: Self::read_u32(reader)?,
            frame_size: Self::read_u32(reader)?,
            hop_size: Self::read_u32(reader)?,
            duration_ms: Self::read_u32(reader)?,
            payload_size: Self::read_u64(reader)?,
            checksum: Self::read_u64(reader)?,
            reserved: Self::read_u32(reader)?,
        })
    }

    fn read_metadata<R: Read>(reader: &mut R) -> Result<FpMetadata> {
        let identifier = Self::read_string(reader)?;
        let original_filename = Self::read_string(reader)?;

        Ok(FpMetadata {
            identifier,
            original_filename,
        })
    }

    fn read_string<R: Read>(reader: &mut R) -> Result<String> {
        let len = Self::read_u32(reader)? as usize;
        if len > MAX_METADATA_FIELD {
            anyhow::bail!("Metadata field of {} bytes exceeds limit", len);
        }
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{AnalysisParams, HEADER_SIZE};
    use crate::writer::FpWriter;

    fn sample_file(compressed: bool) -> FpFile {
        let params = AnalysisParams {
            sample_rate: 44100,
            frame_size: 2048,
            hop_size: 512,
        };
        let postings = (0..200u64).map(|i| (i * 0x1_0001, (i * 12) as u32)).collect();
        let mut file = FpFile::new(
            FpMetadata {
                identifier: "track-a".to_string(),
                original_filename: "track-a.wav".to_string(),
            },
            params,
            5000,
            postings,
        );
        file.header.set_compressed(compressed);
        file
    }

    fn encode(file: &FpFile) -> Vec<u8> {
        let mut buf = Vec::new();
        FpWriter::new().write_to(&mut buf, file).unwrap();
        buf
    }

    #[test]
    fn test_uncompressed_file_reads_back() {
        let file = sample_file(false);
        let bytes = encode(&file);
        let metadata_len = 4 + "track-a".len() + 4 + "track-a.wav".len();
        assert_eq!(bytes.len(), HEADER_SIZE + metadata_len + 200 * POSTING_SIZE);

        let read = FpReader::read_from(&mut &bytes[..]).unwrap();
        assert_eq!(read.postings, file.postings);
        assert_eq!(read.metadata, file.metadata);
        assert_eq!(read.header.duration_ms, 5000);
    }

    #[test]
    fn test_compressed_file_is_smaller_and_reads_back() {
        let file = sample_file(true);
        let bytes = encode(&file);
        assert!(bytes.len() < encode(&sample_file(false)).len());

        let read = FpReader::read_from(&mut &bytes[..]).unwrap();
        assert!(read.header.is_compressed());
        assert_eq!(read.postings, file.postings);
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let mut bytes = encode(&sample_file(false));
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let err = FpReader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(err.downcast_ref::<FpFormatError>().is_some());
    }

    #[test]
    fn test_oversized_payload_length_is_rejected() {
        let mut bytes = encode(&sample_file(false));
        // payload_size lives at bytes 28..36 of the header
        bytes[28..36].copy_from_slice(&u64::MAX.to_le_bytes());

        let err = FpReader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FpFormatError>(),
            Some(FpFormatError::TruncatedPayload { actual, .. }) if *actual == 200 * POSTING_SIZE
        ));
    }

    #[test]
    fn test_posting_count_bounds_decompression() {
        let mut bytes = encode(&sample_file(true));
        // Claim fewer postings than the compressed payload holds
        bytes[8..12].copy_from_slice(&10u32.to_le_bytes());

        let err = FpReader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FpFormatError>(),
            Some(FpFormatError::TruncatedPayload { expected, actual })
                if *expected == 10 * POSTING_SIZE && *actual == 10 * POSTING_SIZE + 1
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = encode(&sample_file(false));
        bytes[0] = b'X';
        let err = FpReader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FpFormatError>(),
            Some(FpFormatError::BadMagic)
        ));
    }
}
