//! Constellation point extraction
//!
//! A cell of the decibel grid is a peak when it is strictly louder than every
//! other cell in a rectangular neighbourhood around it and clears the energy
//! floor. Cells whose neighbourhood would leave the grid are never evaluated.

use crate::config::TuneTraceConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A local maximum in the time-frequency grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Peak {
    /// Time index (frame number)
    pub t: usize,
    /// Frequency bin index
    pub f: usize,
}

impl Peak {
    pub fn new(t: usize, f: usize) -> Self {
        Self { t, f }
    }
}

/// Peak extractor
pub struct PeakExtractor {
    neighborhood_time: usize,
    neighborhood_freq: usize,
    energy_floor_db: f32,
}

impl PeakExtractor {
    pub fn new(config: &TuneTraceConfig) -> Self {
        Self {
            neighborhood_time: config.neighborhood_time,
            neighborhood_freq: config.neighborhood_freq,
            energy_floor_db: config.energy_floor_db,
        }
    }

    /// Extract peaks ordered by time, then frequency
    pub fn extract(&self, db_grid: &[Vec<f32>]) -> Vec<Peak> {
        let nt = self.neighborhood_time;
        let nf = self.neighborhood_freq;
        let num_frames = db_grid.len();
        let num_bins = db_grid.first().map_or(0, Vec::len);

        if num_frames <= 2 * nt || num_bins <= 2 * nf {
            return Vec::new();
        }

        (nt..num_frames - nt)
            .into_par_iter()
            .flat_map_iter(|t| {
                (nf..num_bins - nf)
                    .filter(move |&f| self.is_peak(db_grid, t, f))
                    .map(move |f| Peak::new(t, f))
            })
            .collect()
    }

    fn is_peak(&self, grid: &[Vec<f32>], t: usize, f: usize) -> bool {
        let value = grid[t][f];
        if value < self.energy_floor_db {
            return false;
        }

        let nt = self.neighborhood_time;
        let nf = self.neighborhood_freq;

        for (ti, row) in grid[t - nt..=t + nt].iter().enumerate() {
            for (fi, &other) in row[f - nf..=f + nf].iter().enumerate() {
                if ti == nt && fi == nf {
                    continue;
                }
                // Equal neighbours block the peak
                if other >= value {
                    return false;
                }
            }
        }
        true
    }
}
