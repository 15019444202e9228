//! Append-only postings index
//!
//! Keys are `fp:0x<hash>`, values are ordered lists of `trackId:offsetMs`
//! entries. A track's postings are appended as one batch.

use crate::error::{Result, TuneTraceError};
use crate::fingerprint::{hash_hex, Posting};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tunetrace_db::{DbPool, NewPosting};

/// Index key for a landmark hash
pub fn index_key(hash: u64) -> String {
    format!("fp:{}", hash_hex(hash))
}

/// One stored `(track, offset)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub track_id: String,
    pub offset_ms: i64,
}

impl IndexEntry {
    pub fn new(track_id: impl Into<String>, offset_ms: i64) -> Self {
        Self {
            track_id: track_id.into(),
            offset_ms,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.track_id, self.offset_ms)
    }

    /// Parse `trackId:offsetMs`. The offset is taken after the last colon.
    pub fn parse(raw: &str) -> Option<Self> {
        let (track_id, offset) = raw.rsplit_once(':')?;
        if track_id.is_empty() {
            return None;
        }
        let offset_ms = offset.parse().ok()?;
        Some(Self::new(track_id, offset_ms))
    }
}

/// Postings index shared by ingestion (writes) and matching (reads)
#[async_trait]
pub trait FingerprintIndex: Send + Sync {
    /// Append every posting of one track as a single batch
    async fn insert(&self, track_id: &str, postings: &[Posting]) -> Result<()>;

    /// Raw entries under a key, oldest first, at most `limit`
    async fn fetch(&self, key: &str, limit: usize) -> Result<Vec<String>>;
}

/// Process-local index
#[derive(Default)]
pub struct MemoryIndex {
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys
    pub async fn key_count(&self) -> usize {
        self.lists.read().await.len()
    }

    /// Total number of stored entries
    pub async fn entry_count(&self) -> usize {
        self.lists.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl FingerprintIndex for MemoryIndex {
    async fn insert(&self, track_id: &str, postings: &[Posting]) -> Result<()> {
        let mut lists = self.lists.write().await;
        for posting in postings {
            let entry = IndexEntry::new(track_id, posting.offset_ms as i64);
            lists
                .entry(index_key(posting.hash))
                .or_default()
                .push(entry.encode());
        }
        Ok(())
    }

    async fn fetch(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// PostgreSQL-backed index
pub struct PostgresIndex {
    pool: DbPool,
}

impl PostgresIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FingerprintIndex for PostgresIndex {
    async fn insert(&self, track_id: &str, postings: &[Posting]) -> Result<()> {
        let rows: Vec<NewPosting> = postings
            .iter()
            .map(|p| NewPosting {
                hash_key: index_key(p.hash),
                entry: IndexEntry::new(track_id, p.offset_ms as i64).encode(),
            })
            .collect();

        tunetrace_db::insert_postings_batch(&self.pool, &rows)
            .await
            .map_err(|e| TuneTraceError::Index(format!("{:#}", e)))
    }

    async fn fetch(&self, key: &str, limit: usize) -> Result<Vec<String>> {
        tunetrace_db::get_entries_by_hash_key(&self.pool, key, limit as i64)
            .await
            .map_err(|e| TuneTraceError::Index(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_key() {
        assert_eq!(index_key(0x64000c8007), "fp:0x64000c8007");
    }

    #[test]
    fn test_entry_parse() {
        assert_eq!(
            IndexEntry::parse("abc:1509"),
            Some(IndexEntry::new("abc", 1509))
        );
        // Track ids may themselves contain colons
        assert_eq!(
            IndexEntry::parse("urn:track:7:42"),
            Some(IndexEntry::new("urn:track:7", 42))
        );
        assert_eq!(IndexEntry::parse("no-offset"), None);
        assert_eq!(IndexEntry::parse("abc:"), None);
        assert_eq!(IndexEntry::parse(":12"), None);
        assert_eq!(IndexEntry::parse("abc:1.5"), None);
    }

    #[tokio::test]
    async fn test_memory_index_preserves_insertion_order() {
        let index = MemoryIndex::new();
        index
            .insert("a", &[Posting::new(7, 100), Posting::new(8, 120)])
            .await
            .unwrap();
        index.insert("b", &[Posting::new(7, 40)]).await.unwrap();

        let entries = index.fetch(&index_key(7), 500).await.unwrap();
        assert_eq!(entries, vec!["a:100".to_string(), "b:40".to_string()]);
        assert_eq!(index.key_count().await, 2);
        assert_eq!(index.entry_count().await, 3);
    }

    #[tokio::test]
    async fn test_memory_index_fetch_caps_oldest_first() {
        let index = MemoryIndex::new();
        let postings: Vec<Posting> = (0..10).map(|i| Posting::new(1, i)).collect();
        index.insert("t", &postings).await.unwrap();

        let entries = index.fetch(&index_key(1), 3).await.unwrap();
        assert_eq!(entries, vec!["t:0", "t:1", "t:2"]);
        assert!(index.fetch("fp:0xdead", 3).await.unwrap().is_empty());
    }
}
