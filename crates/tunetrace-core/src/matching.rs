//! Time-aligned vote matching
//!
//! Every stored entry that shares a hash with a query posting casts one vote
//! for `(track, stored offset - query offset)`. A real match piles its votes
//! into a single offset bucket; chance collisions scatter.

use crate::error::Result;
use crate::fingerprint::Posting;
use crate::index::{index_key, FingerprintIndex, IndexEntry};
use crate::metadata::MetadataStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;


/// Best match for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Track id; serialized as `song_id` for the streaming clients
    #[serde(rename = "song_id")]
    pub track_id: String,
    pub title: String,
    pub artist: String,
    /// Raw vote count of the winning bucket
    pub confidence: u32,
    /// Stored offset minus query offset
    pub delta_ms: i64,
}

/// How to choose between buckets with the same vote count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The bucket that received its first vote earliest wins
    #[default]
    FirstSeen,
    /// The lexicographically smallest `(track id, delta)` wins
    SmallestTrackId,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first_seen" => Ok(TieBreak::FirstSeen),
            "smallest_track_id" => Ok(TieBreak::SmallestTrackId),
            other => Err(format!(
                "unknown tie-break '{}' (expected first_seen or smallest_track_id)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Entries read per hash, oldest first
    pub max_entries_per_hash: usize,
    pub tie_break: TieBreak,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_entries_per_hash: 500,
            tie_break: TieBreak::FirstSeen,
        }
    }
}

/// Vote counts per `(track, delta)` bucket, in first-vote order
#[derive(Debug, Default)]
pub struct VoteTally {
    slots: HashMap<(String, i64), usize>,
    buckets: Vec<((String, i64), u32)>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vote(&mut self, track_id: &str, delta_ms: i64) {
        let key = (track_id.to_string(), delta_ms);
        match self.slots.get(&key) {
            Some(&slot) => self.buckets[slot].1 += 1,
            None => {
                self.slots.insert(key.clone(), self.buckets.len());
                self.buckets.push((key, 1));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn count(&self, track_id: &str, delta_ms: i64) -> u32 {
        self.slots
            .get(&(track_id.to_string(), delta_ms))
            .map_or(0, |&slot| self.buckets[slot].1)
    }

    /// Winning `(track, delta, votes)`, or `None` when nothing was voted
    pub fn winner(&self, tie_break: TieBreak) -> Option<(&str, i64, u32)> {
        let mut best: Option<&((String, i64), u32)> = None;

        for bucket in &self.buckets {
            let replace = match best {
                None => true,
                Some(current) => match bucket.1.cmp(&current.1) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => match tie_break {
                        TieBreak::FirstSeen => false,
                        TieBreak::SmallestTrackId => bucket.0 < current.0,
                    },
                },
            };
            if replace {
                best = Some(bucket);
            }
        }

        best.map(|((track_id, delta), votes)| (track_id.as_str(), *delta, *votes))
    }
}

/// Matcher over an index and a metadata store
pub struct Matcher {
    index: Arc<dyn FingerprintIndex>,
    metadata: Arc<dyn MetadataStore>,
    config: MatchingConfig,
}

impl Matcher {
    pub fn new(
        index: Arc<dyn FingerprintIndex>,
        metadata: Arc<dyn MetadataStore>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            index,
            metadata,
            config,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Count votes for a set of query postings
    pub async fn tally(&self, postings: &[Posting]) -> Result<VoteTally> {
        let mut tally = VoteTally::new();
        // Clips repeat hashes; each key is read once per query
        let mut fetched: HashMap<u64, Vec<IndexEntry>> = HashMap::new();

        for posting in postings {
            if !fetched.contains_key(&posting.hash) {
                let key = index_key(posting.hash);
                let raw = self
                    .index
                    .fetch(&key, self.config.max_entries_per_hash)
                    .await?;
                let entries = raw
                    .iter()
                    .filter_map(|r| {
                        let parsed = IndexEntry::parse(r);
                        if parsed.is_none() {
                            log::warn!("Skipping malformed index entry '{}' under {}", r, key);
                        }
                        parsed
                    })
                    .collect();
                fetched.insert(posting.hash, entries);
            }

            if let Some(entries) = fetched.get(&posting.hash) {
                for entry in entries {
                    tally.vote(&entry.track_id, entry.offset_ms - posting.offset_ms as i64);
                }
            }
        }

        Ok(tally)
    }

    /// Best match for the query postings, if any
    pub async fn query(&self, postings: &[Posting]) -> Result<Option<MatchResult>> {
        let tally = self.tally(postings).await?;

        let Some((track_id, delta_ms, votes)) = tally.winner(self.config.tie_break) else {
            log::trace!("No stored hashes among {} query postings", postings.len());
            return Ok(None);
        };

        log::debug!(
            "Best bucket {} @ {} ms with {} votes ({} buckets)",
            track_id,
            delta_ms,
            votes,
            tally.len()
        );

        let Some(track) = self.metadata.get_track(track_id).await? else {
            log::debug!("Winning track {} is unknown to the metadata store", track_id);
            return Ok(None);
        };

        Ok(Some(MatchResult {
            track_id: track.id,
            title: track.title,
            artist: track.artist,
            confidence: votes,
            delta_ms,
        }))
    }
}
