//! Service configuration
//!
//! TOML file selecting the storage backends and the matching, session and
//! worker parameters of the server. Every section is optional.

use crate::error::{Result, TuneTraceError};
use crate::matching::MatchingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub matching: MatchingConfig,
    pub session: SessionConfig,
    pub worker: WorkerConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit for uploads, in megabytes
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_mb: 50,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub postgresql: PostgresqlConfig,
    pub objects: ObjectStoreConfig,
}

/// Storage backend type for the index and metadata store
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgresql,
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostgresqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "tunetrace".to_string(),
            user: "tunetrace".to_string(),
            password: "tunetrace".to_string(),
            max_connections: 10,
        }
    }
}

/// Uploaded audio storage
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub base_directory: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            base_directory: "./uploads".to_string(),
        }
    }
}

/// Streaming session options
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Decoded audio kept from the previous chunk and prepended to the next.
    /// Zero keeps chunks fully independent.
    pub carry_tail_ms: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Ingestion jobs fingerprinted at the same time
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl ServiceConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TuneTraceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TuneTraceError::Config(format!("failed to parse TOML config: {}", e)))
    }

    /// PostgreSQL connection string, when that backend is selected
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            StorageBackend::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}@{}:{}/{}",
                    pg.user, pg.host, pg.port, pg.database
                ))
            }
            StorageBackend::Memory => None,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::TieBreak;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ServiceConfig::parse("").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.matching.max_entries_per_hash, 500);
        assert_eq!(config.matching.tie_break, TieBreak::FirstSeen);
        assert_eq!(config.session.carry_tail_ms, 0);
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.server.port, 8080);
        assert!(config.connection_string().is_none());
    }

    #[test]
    fn test_parse_postgresql_toml() {
        let toml_str = r#"
            [server]
            port = 9000

            [storage]
            backend = "postgresql"

            [storage.postgresql]
            host = "db.example.com"
            port = 5433
            database = "fp"

            [storage.objects]
            base_directory = "/var/lib/tunetrace"

            [matching]
            tie_break = "smallest_track_id"

            [session]
            carry_tail_ms = 250
        "#;

        let config = ServiceConfig::parse(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Postgresql);
        assert_eq!(config.storage.postgresql.port, 5433);
        assert_eq!(config.storage.postgresql.user, "tunetrace");
        assert_eq!(config.storage.objects.base_directory, "/var/lib/tunetrace");
        assert_eq!(config.matching.tie_break, TieBreak::SmallestTrackId);
        assert_eq!(config.matching.max_entries_per_hash, 500);
        assert_eq!(config.session.carry_tail_ms, 250);
        assert_eq!(
            config.connection_string().unwrap(),
            "postgresql://tunetrace@db.example.com:5433/fp"
        );
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = ServiceConfig::parse("[storage]\nbackend = \"redis\"\n").unwrap_err();
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ServiceConfig::load(Path::new("/nonexistent/tunetrace.toml")).unwrap_err();
        assert!(matches!(err, TuneTraceError::Config(_)));
    }
}
