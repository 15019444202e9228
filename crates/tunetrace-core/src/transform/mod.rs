//! Short-time Fourier transform
//!
//! Hann-windowed real FFT over fixed frames. Only the non-negative half of
//! the spectrum is kept.

use crate::config::TuneTraceConfig;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Added to magnitudes before taking the log so silence maps to a finite floor
pub const DB_EPSILON: f32 = 1e-9;

/// Spectrogram representation
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Magnitude values [time_frame][frequency_bin]
    pub magnitudes: Vec<Vec<f32>>,
    /// Number of time frames
    pub num_frames: usize,
    /// Number of frequency bins
    pub num_bins: usize,
}

impl Spectrogram {
    /// Decibel grid `20 * log10(m + eps)` with the same shape
    pub fn to_decibels(&self) -> Vec<Vec<f32>> {
        self.magnitudes
            .iter()
            .map(|frame| frame.iter().map(|&m| magnitude_to_db(m)).collect())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }
}

pub fn magnitude_to_db(magnitude: f32) -> f32 {
    20.0 * (magnitude + DB_EPSILON).log10()
}

/// Number of full frames that fit in `num_samples`
pub fn frame_count(num_samples: usize, frame_size: usize, hop_size: usize) -> usize {
    if num_samples < frame_size {
        0
    } else {
        (num_samples - frame_size) / hop_size + 1
    }
}

/// Compute the magnitude spectrogram of mono samples
///
/// A signal shorter than one frame yields an empty grid.
pub fn compute_spectrogram(samples: &[f32], config: &TuneTraceConfig) -> Spectrogram {
    let frame_size = config.frame_size;
    let hop_size = config.hop_size;
    let num_bins = config.num_bins();
    let num_frames = frame_count(samples.len(), frame_size, hop_size);

    if num_frames == 0 {
        return Spectrogram {
            magnitudes: Vec::new(),
            num_frames: 0,
            num_bins,
        };
    }

    let fft = FftPlanner::<f32>::new().plan_fft_forward(frame_size);
    let window = create_hann_window(frame_size);

    // Frames are independent; the plan is shared read-only across workers
    let magnitudes: Vec<Vec<f32>> = (0..num_frames)
        .into_par_iter()
        .map(|frame_idx| {
            let start = frame_idx * hop_size;
            let mut buffer: Vec<Complex<f32>> = samples[start..start + frame_size]
                .iter()
                .zip(&window)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();

            fft.process(&mut buffer);

            buffer[..num_bins].iter().map(|c| c.norm()).collect()
        })
        .collect();

    Spectrogram {
        magnitudes,
        num_frames,
        num_bins,
    }
}

/// Create Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let x = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_hann_window() {
        let window = create_hann_window(2048);
        assert_eq!(window.len(), 2048);
        assert_abs_diff_eq!(window[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(window[2047], 0.0, epsilon = 1e-6);
        assert!(window[1023] > 0.999);
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(2047, 2048, 512), 0);
        assert_eq!(frame_count(2048, 2048, 512), 1);
        assert_eq!(frame_count(2559, 2048, 512), 1);
        assert_eq!(frame_count(2560, 2048, 512), 2);
        assert_eq!(frame_count(44100, 2048, 512), 83);
    }

    #[test]
    fn test_short_signal_is_empty() {
        let config = TuneTraceConfig::default();
        let spectrogram = compute_spectrogram(&[0.5; 1000], &config);
        assert!(spectrogram.is_empty());
        assert!(spectrogram.to_decibels().is_empty());
        assert_eq!(spectrogram.num_bins, 1025);
    }

    #[test]
    fn test_bin_centred_sine_peaks_at_its_bin() {
        let config = TuneTraceConfig::default();
        let bin = 100;
        let freq = bin as f32 * 44100.0 / 2048.0;
        let samples: Vec<f32> = (0..8192)
            .map(|n| (2.0 * PI * freq * n as f32 / 44100.0).sin())
            .collect();

        let spectrogram = compute_spectrogram(&samples, &config);
        assert_eq!(spectrogram.num_frames, 13);
        for frame in &spectrogram.magnitudes {
            assert_eq!(frame.len(), 1025);
            let (argmax, _) = frame
                .iter()
                .enumerate()
                .fold((0, f32::MIN), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
            assert_eq!(argmax, bin);
        }
    }

    #[test]
    fn test_silence_maps_to_db_floor() {
        let config = TuneTraceConfig::default();
        let spectrogram = compute_spectrogram(&[0.0; 2048], &config);
        let db = spectrogram.to_decibels();
        assert_abs_diff_eq!(db[0][0], -180.0, epsilon = 1e-3);
    }
}
