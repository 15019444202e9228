//! Error types for the fingerprinting engine

use thiserror::Error;

/// Failure to turn an input buffer or message into something the pipeline
/// can use. Always scoped to that one input.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The container header could not be parsed
    #[error("unreadable audio header: {0}")]
    Header(String),

    /// Header parsed but lacks channel count, sample rate, or bit depth
    #[error("audio header is missing {0}")]
    MissingMetadata(&'static str),

    /// Sample encoding outside what the decoder handles
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Sample data ended early or was malformed
    #[error("corrupt sample data: {0}")]
    Samples(String),

    /// A control message did not match any known shape
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Top-level error type for the engine and its collaborators
#[derive(Debug, Error)]
pub enum TuneTraceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Fingerprint index unavailable or rejected a read/write
    #[error("index error: {0}")]
    Index(String),

    /// Metadata store failure
    #[error("metadata store error: {0}")]
    Metadata(String),

    /// Object storage failure
    #[error("object storage error: {0}")]
    ObjectStore(String),

    /// Job queue failure
    #[error("queue error: {0}")]
    Queue(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking fingerprint task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TuneTraceError {
    /// Short machine-readable code sent to streaming clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::Index(_) => "index_unavailable",
            Self::Metadata(_) => "metadata_unavailable",
            Self::ObjectStore(_) => "object_store_error",
            Self::Queue(_) => "queue_error",
            Self::Config(_) => "config_error",
            Self::Task(_) => "internal_error",
            Self::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, TuneTraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_converts_and_keeps_message() {
        let err: TuneTraceError = DecodeError::MissingMetadata("channel count").into();
        assert_eq!(err.code(), "decode_error");
        assert_eq!(err.to_string(), "audio header is missing channel count");
    }
}
