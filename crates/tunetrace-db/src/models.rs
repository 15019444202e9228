use serde::{Deserialize, Serialize};

/// A track row in the `tracks` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub storage_key: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Input structure for creating a new track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub storage_key: String,
    pub status: String,
}

/// Input structure for appending to a hash's posting list.
///
/// `hash_key` is the `fp:0x…` list key and `entry` the encoded
/// `trackId:offsetMs` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPosting {
    pub hash_key: String,
    pub entry: String,
}
