//! JSON output formatting

use serde::Serialize;
use tunetrace_core::MatchResult;

#[derive(Debug, Serialize)]
pub struct MatchOutput {
    pub query_path: String,
    /// Number of postings the query produced
    pub query_postings: usize,
    #[serde(rename = "match")]
    pub result: Option<MatchResult>,
}

/// Summary printed by `fpgen`
#[derive(Debug, Serialize)]
pub struct FingerprintOutput {
    pub input_path: String,
    pub output_path: String,
    pub identifier: String,
    pub duration_ms: u32,
    pub postings: usize,
}

/// One streamed chunk and the reply it received
#[derive(Debug, Serialize)]
pub struct ChunkOutput {
    pub chunk: usize,
    pub start_ms: u64,
    pub reply: serde_json::Value,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Print one value per line, for streams of results
pub fn print_json_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
