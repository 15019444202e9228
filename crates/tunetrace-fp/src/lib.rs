//! TuneTrace postings file format library

pub mod format;
pub mod json_format;
pub mod reader;
pub mod writer;

pub use format::{
    AnalysisParams, FpFile, FpFormatError, FpHeader, FpMetadata, HEADER_SIZE, MAGIC, VERSION,
};
pub use json_format::{parse_hex_hash, FpJsonFile, FpJsonPosting};
pub use reader::FpReader;
pub use writer::FpWriter;

use std::path::Path;

/// Load a postings file, choosing the format from the extension
/// (`.json` for JSON, anything else as `.tfp`)
pub fn load_auto(path: &Path) -> anyhow::Result<FpFile> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => FpJsonFile::load(path)?.into_fp_file(),
        _ => FpReader::read(path),
    }
}

/// True when a path looks like a postings file
pub fn is_postings_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tfp") | Some("json")
    )
}
