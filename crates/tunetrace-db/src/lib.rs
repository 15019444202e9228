//! TuneTrace Database Layer
//!
//! PostgreSQL integration for track metadata and the posting index

pub mod connection;
pub mod models;
pub mod operations;

// Re-export commonly used types
pub use connection::{create_pool, test_connection, DbPool};
pub use models::{NewPosting, NewTrack, TrackRow};
pub use operations::{
    get_entries_by_hash_key, get_track_by_id, init_schema, insert_postings_batch, insert_track,
    update_track_status, SCHEMA,
};
