//! .tfp file writer

use crate::format::{FpFile, FpHeader, FpMetadata, CRC64};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct FpWriter {
    compression_level: i32,
}

impl FpWriter {
    pub fn new() -> Self {
        Self {
            compression_level: 3,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Write .tfp file
    pub fn write(&self, path: &Path, fp_file: &FpFile) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create .tfp file: {}", path.display()))?;

        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, fp_file)?;
        writer.flush()?;

        Ok(())
    }

    /// Write a postings file to any sink
    pub fn write_to<W: Write>(&self, writer: &mut W, fp_file: &FpFile) -> Result<()> {
        let raw = FpFile::encode_payload(&fp_file.postings);

        let mut header = fp_file.header.clone();
        header.num_postings = fp_file.postings.len() as u32;
        header.checksum = CRC64.checksum(&raw);

        let payload = if header.is_compressed() {
            zstd::encode_all(&raw[..], self.compression_level)
                .context("Failed to compress posting payload")?
        } else {
            raw
        };
        header.payload_size = payload.len() as u64;

        self.write_header(writer, &header)?;
        self.write_metadata(writer, &fp_file.metadata)?;
        writer.write_all(&payload)?;

        Ok(())
    }

    fn write_header<W: Write>(&self, writer: &mut W, header: &FpHeader) -> Result<()> {
        writer.write_all(&header.magic)?;
        writer.write_all(&header.version.to_le_bytes())?;
        writer.write_all(&header.flags.to_le_bytes())?;
        writer.write_all(&header.num_postings.to_le_bytes())?;
        writer.write_all(&header.sample_rate.to_le_bytes())?;
        writer.write_all(&header.frame_size.to_le_bytes())?;
        writer.write_all(&header.hop_size.to_le_bytes())?;
        writer.write_all(&header.duration_ms.to_le_bytes())?;
        writer.write_all(&header.payload_size.to_le_bytes())?;
        writer.write_all(&header.checksum.to_le_bytes())?;
        writer.write_all(&header.reserved.to_le_bytes())?;

        Ok(())
    }

    fn write_metadata<W: Write>(&self, writer: &mut W, metadata: &FpMetadata) -> Result<()> {
        for field in [&metadata.identifier, &metadata.original_filename] {
            let bytes = field.as_bytes();
            writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
            writer.write_all(bytes)?;
        }

        Ok(())
    }
}

impl Default for FpWriter {
    fn default() -> Self {
        Self::new()
    }
}
