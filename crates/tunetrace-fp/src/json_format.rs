//! JSON format for postings files
//!
//! Human-readable alternative to `.tfp`. Hashes are written as `0x`-prefixed
//! hexadecimal strings, matching the keys the index stores them under.

use crate::format::{AnalysisParams, FpFile, FpMetadata};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete JSON postings file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpJsonFile {
    pub version: String,
    pub metadata: FpJsonMetadata,
    pub postings: Vec<FpJsonPosting>,
}

/// Metadata about the fingerprinted audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpJsonMetadata {
    pub identifier: String,
    pub original_path: String,
    pub sample_rate: u32,
    pub frame_size: u32,
    pub hop_size: u32,
    pub duration_ms: u32,
    pub created_at: String,
}

/// Individual posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FpJsonPosting {
    pub hash: String,
    pub offset_ms: u32,
}

impl FpJsonFile {
    /// Build a JSON file from a binary-layout file
    pub fn from_fp_file(fp_file: &FpFile) -> Self {
        Self {
            version: "1.0".to_string(),
            metadata: FpJsonMetadata {
                identifier: fp_file.metadata.identifier.clone(),
                original_path: fp_file.metadata.original_filename.clone(),
                sample_rate: fp_file.header.sample_rate,
                frame_size: fp_file.header.frame_size,
                hop_size: fp_file.header.hop_size,
                duration_ms: fp_file.header.duration_ms,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            postings: fp_file
                .postings
                .iter()
                .map(|(hash, offset_ms)| FpJsonPosting {
                    hash: format!("{:#x}", hash),
                    offset_ms: *offset_ms,
                })
                .collect(),
        }
    }

    /// Convert back to the binary-layout representation
    pub fn into_fp_file(self) -> Result<FpFile> {
        let postings = self
            .postings
            .iter()
            .map(|p| Ok((parse_hex_hash(&p.hash)?, p.offset_ms)))
            .collect::<Result<Vec<_>>>()?;

        let params = AnalysisParams {
            sample_rate: self.metadata.sample_rate,
            frame_size: self.metadata.frame_size,
            hop_size: self.metadata.hop_size,
        };

        Ok(FpFile::new(
            FpMetadata {
                identifier: self.metadata.identifier,
                original_filename: self.metadata.original_path,
            },
            params,
            self.metadata.duration_ms,
            postings,
        ))
    }

    /// Save to JSON file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)
            .with_context(|| format!("Failed to write JSON postings: {}", path.display()))?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let json_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON postings: {}", path.display()))?;
        let fp_file: FpJsonFile = serde_json::from_str(&json_str)
            .with_context(|| format!("Malformed JSON postings: {}", path.display()))?;
        Ok(fp_file)
    }
}

/// Parse a `0x`-prefixed hexadecimal hash
pub fn parse_hex_hash(text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("Hash {:?} lacks 0x prefix", text))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hash: {:?}", text))
}
