//! Audio resampling using simple linear interpolation
//!
//! Cheap and deterministic: the output only has to be stable for hashing,
//! not band-limited.

/// Resample audio to target sample rate using linear interpolation
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    // Round up so the output spans the whole input: the last output position
    // still lands on an input sample, never past the end.
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    let last = samples[samples.len() - 1];

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let current = samples.get(idx).copied().unwrap_or(last);
            // Past the final input sample there is nothing to lerp towards:
            // hold the last value rather than fading to zero.
            let next = samples.get(idx + 1).copied().unwrap_or(current);
            current + (next - current) * frac
        })
        .collect()
}
