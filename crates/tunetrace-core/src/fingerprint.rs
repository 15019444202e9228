//! Landmark hashing
//!
//! Pairs each anchor peak with a handful of later peaks and packs the pair
//! into a 52-bit hash: 20 bits per frequency bin and 12 bits of frame delta.

use crate::config::TuneTraceConfig;
use crate::peaks::Peak;
use serde::{Deserialize, Serialize};

const FREQ_BITS: u32 = 20;
const DELTA_BITS: u32 = 12;
const FREQ_MASK: u64 = (1 << FREQ_BITS) - 1;
const DELTA_MASK: u64 = (1 << DELTA_BITS) - 1;

/// Pack a peak pair into a landmark hash
///
/// Fields are masked to their widths before packing, so out-of-range values
/// are silently truncated.
pub fn landmark_hash(f1: usize, f2: usize, dt: usize) -> u64 {
    ((f1 as u64 & FREQ_MASK) << (FREQ_BITS + DELTA_BITS))
        | ((f2 as u64 & FREQ_MASK) << DELTA_BITS)
        | (dt as u64 & DELTA_MASK)
}

/// Split a landmark hash back into `(f1, f2, dt)`
pub fn unpack_hash(hash: u64) -> (u32, u32, u32) {
    let f1 = (hash >> (FREQ_BITS + DELTA_BITS)) & FREQ_MASK;
    let f2 = (hash >> DELTA_BITS) & FREQ_MASK;
    let dt = hash & DELTA_MASK;
    (f1 as u32, f2 as u32, dt as u32)
}

/// Render a hash as the `0x`-prefixed lowercase hex used for index keys
pub fn hash_hex(hash: u64) -> String {
    format!("0x{:x}", hash)
}

/// Parse a `0x`-prefixed hex hash
pub fn parse_hash_hex(text: &str) -> Option<u64> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// One `(hash, anchor offset)` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Posting {
    pub hash: u64,
    pub offset_ms: u32,
}

impl Posting {
    pub fn new(hash: u64, offset_ms: u32) -> Self {
        Self { hash, offset_ms }
    }

    pub fn hash_hex(&self) -> String {
        hash_hex(self.hash)
    }
}

/// A hashed peak pair before the anchor time is converted to milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landmark {
    pub anchor: Peak,
    pub target: Peak,
}

impl Landmark {
    pub fn dt(&self) -> usize {
        self.target.t - self.anchor.t
    }

    pub fn hash(&self) -> u64 {
        landmark_hash(self.anchor.f, self.target.f, self.dt())
    }
}

/// Landmark hasher
pub struct LandmarkHasher {
    min_frame_delta: usize,
    max_frame_delta: usize,
    fan_out: usize,
    config: TuneTraceConfig,
}

impl LandmarkHasher {
    pub fn new(config: &TuneTraceConfig) -> Self {
        Self {
            min_frame_delta: config.min_frame_delta as usize,
            max_frame_delta: config.max_frame_delta as usize,
            fan_out: config.fan_out,
            config: config.clone(),
        }
    }

    /// Pair peaks into landmarks in anchor order
    ///
    /// `peaks` must be ordered by time; scanning for an anchor stops at the
    /// first peak past the delta window.
    pub fn landmarks(&self, peaks: &[Peak]) -> Vec<Landmark> {
        let mut landmarks = Vec::new();

        for (i, anchor) in peaks.iter().enumerate() {
            let mut pairs = 0;

            for target in &peaks[i + 1..] {
                let dt = target.t.saturating_sub(anchor.t);
                if dt > self.max_frame_delta {
                    break;
                }
                if dt < self.min_frame_delta {
                    continue;
                }

                landmarks.push(Landmark {
                    anchor: *anchor,
                    target: *target,
                });
                pairs += 1;
                if pairs == self.fan_out {
                    break;
                }
            }
        }

        landmarks
    }

    /// Hash peaks into postings
    pub fn postings(&self, peaks: &[Peak]) -> Vec<Posting> {
        self.landmarks(peaks)
            .iter()
            .map(|lm| Posting::new(lm.hash(), self.config.frame_to_ms(lm.anchor.t)))
            .collect()
    }
}
