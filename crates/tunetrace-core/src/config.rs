//! Configuration parameters for the landmark fingerprinting algorithm
//!
//! Frame size, hop size and target sample rate fix the meaning of every hash:
//! changing any of them invalidates all previously indexed postings.

use crate::error::{Result, TuneTraceError};
use serde::{Deserialize, Serialize};
use tunetrace_fp::AnalysisParams;

/// Algorithm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneTraceConfig {
    // Audio processing
    pub target_sample_rate: u32,

    // Spectrogram
    pub frame_size: usize,
    pub hop_size: usize,

    // Peak extraction
    pub neighborhood_time: usize,
    pub neighborhood_freq: usize,
    pub energy_floor_db: f32,

    // Landmark hashing
    pub min_frame_delta: u32,
    pub max_frame_delta: u32,
    pub fan_out: usize,
}

impl Default for TuneTraceConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 44100,

            frame_size: 2048,
            hop_size: 512,

            neighborhood_time: 5,
            neighborhood_freq: 5,
            energy_floor_db: -60.0,

            min_frame_delta: 1,
            max_frame_delta: 20,
            fan_out: 5,
        }
    }
}

impl TuneTraceConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.target_sample_rate == 0 {
            return Err(TuneTraceError::Config("target_sample_rate must be > 0".into()));
        }
        if !self.frame_size.is_power_of_two() || !self.hop_size.is_power_of_two() {
            return Err(TuneTraceError::Config(format!(
                "frame_size ({}) and hop_size ({}) must be powers of two",
                self.frame_size, self.hop_size
            )));
        }
        if self.hop_size > self.frame_size {
            return Err(TuneTraceError::Config("hop_size must not exceed frame_size".into()));
        }
        if self.min_frame_delta == 0 || self.min_frame_delta > self.max_frame_delta {
            return Err(TuneTraceError::Config(format!(
                "frame delta window [{}, {}] is empty or starts at zero",
                self.min_frame_delta, self.max_frame_delta
            )));
        }
        if self.fan_out == 0 {
            return Err(TuneTraceError::Config("fan_out must be > 0".into()));
        }
        Ok(())
    }

    /// Number of frequency bins per frame (real-signal transform)
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Convert a frame index to milliseconds, rounded to nearest
    pub fn frame_to_ms(&self, frame: usize) -> u32 {
        let ms = frame as f64 * self.hop_size as f64 * 1000.0 / self.target_sample_rate as f64;
        ms.round() as u32
    }

    /// Parameters recorded alongside persisted postings
    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            sample_rate: self.target_sample_rate,
            frame_size: self.frame_size as u32,
            hop_size: self.hop_size as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TuneTraceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_bins(), 1025);
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let config = TuneTraceConfig {
            frame_size: 2000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TuneTraceError::Config(_))));
    }

    #[test]
    fn test_empty_delta_window_rejected() {
        let config = TuneTraceConfig {
            min_frame_delta: 21,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_to_ms_rounds() {
        let config = TuneTraceConfig::default();
        assert_eq!(config.frame_to_ms(0), 0);
        // 512 / 44100 s = 11.609.. ms
        assert_eq!(config.frame_to_ms(1), 12);
        assert_eq!(config.frame_to_ms(100), 1161);
    }
}
