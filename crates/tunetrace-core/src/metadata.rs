//! Track metadata store
//!
//! Owns track records and their lifecycle status. The engine only reads
//! tracks (to resolve match winners) and moves them through their statuses.

use crate::error::{Result, TuneTraceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;
use tunetrace_db::{DbPool, NewTrack, TrackRow};
use uuid::Uuid;

/// Lifecycle of an uploaded track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackStatus {
    Queued,
    Fingerprinting,
    Ready,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Queued => "QUEUED",
            TrackStatus::Fingerprinting => "FINGERPRINTING",
            TrackStatus::Ready => "READY",
            TrackStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = TuneTraceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(TrackStatus::Queued),
            "FINGERPRINTING" => Ok(TrackStatus::Fingerprinting),
            "READY" => Ok(TrackStatus::Ready),
            "FAILED" => Ok(TrackStatus::Failed),
            other => Err(TuneTraceError::Metadata(format!(
                "unknown track status '{}'",
                other
            ))),
        }
    }
}

/// A track record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub storage_key: String,
    pub status: TrackStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TrackRow> for Track {
    type Error = TuneTraceError;

    fn try_from(row: TrackRow) -> Result<Self> {
        Ok(Track {
            status: row.status.parse()?,
            id: row.id,
            title: row.title,
            artist: row.artist,
            storage_key: row.storage_key,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create a QUEUED track and return it with its new id
    async fn create_track(&self, title: &str, artist: &str, storage_key: &str) -> Result<Track>;

    async fn get_track(&self, id: &str) -> Result<Option<Track>>;

    /// Fails when the id is unknown
    async fn update_status(&self, id: &str, status: TrackStatus) -> Result<()>;
}

/// Process-local metadata store
#[derive(Default)]
pub struct MemoryMetadataStore {
    tracks: RwLock<HashMap<String, Track>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track under a caller-chosen id, replacing any previous record
    pub async fn insert(&self, track: Track) {
        self.tracks.write().await.insert(track.id.clone(), track);
    }

    pub async fn len(&self) -> usize {
        self.tracks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_track(&self, title: &str, artist: &str, storage_key: &str) -> Result<Track> {
        let track = Track {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            storage_key: storage_key.to_string(),
            status: TrackStatus::Queued,
            created_at: Utc::now(),
        };
        self.insert(track.clone()).await;
        Ok(track)
    }

    async fn get_track(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.tracks.read().await.get(id).cloned())
    }

    async fn update_status(&self, id: &str, status: TrackStatus) -> Result<()> {
        let mut tracks = self.tracks.write().await;
        let track = tracks
            .get_mut(id)
            .ok_or_else(|| TuneTraceError::Metadata(format!("unknown track {}", id)))?;
        track.status = status;
        Ok(())
    }
}

/// PostgreSQL-backed metadata store
pub struct PostgresMetadataStore {
    pool: DbPool,
}

impl PostgresMetadataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: anyhow::Error) -> TuneTraceError {
    TuneTraceError::Metadata(format!("{:#}", e))
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn create_track(&self, title: &str, artist: &str, storage_key: &str) -> Result<Track> {
        let new_track = NewTrack {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            storage_key: storage_key.to_string(),
            status: TrackStatus::Queued.to_string(),
        };
        let row = tunetrace_db::insert_track(&self.pool, &new_track)
            .await
            .map_err(db_error)?;
        row.try_into()
    }

    async fn get_track(&self, id: &str) -> Result<Option<Track>> {
        tunetrace_db::get_track_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .map(Track::try_from)
            .transpose()
    }

    async fn update_status(&self, id: &str, status: TrackStatus) -> Result<()> {
        let updated = tunetrace_db::update_track_status(&self.pool, id, status.as_str())
            .await
            .map_err(db_error)?;
        if !updated {
            return Err(TuneTraceError::Metadata(format!("unknown track {}", id)));
        }
        Ok(())
    }
}
