//! Level math shared by both capture modes and consumer-side meters.
//!
//! Levels live in the dBFS domain `[-160, 0]`. Normalization clamps into a
//! working window and rescales linearly; it never extrapolates.

/// Level reported for digital silence.
pub const SILENCE_DBFS: f32 = -160.0;

/// Compute RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Convert a linear amplitude to dBFS, clamped to `[-160, 0]`.
pub fn amplitude_to_dbfs(amplitude: f32) -> f32 {
    if amplitude <= 0.0 || !amplitude.is_finite() {
        return SILENCE_DBFS;
    }
    (20.0 * amplitude.log10()).clamp(SILENCE_DBFS, 0.0)
}

/// RMS of a buffer expressed in dBFS.
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    amplitude_to_dbfs(rms_level(samples))
}

/// Map dBFS to `[0, 1]` over the window `[floor_db, 0]`.
///
/// Values below the floor clamp to 0.0, values above 0 dBFS clamp to 1.0.
pub fn normalize_level(dbfs: f32, floor_db: f32) -> f32 {
    if floor_db >= 0.0 || dbfs.is_nan() {
        return 0.0;
    }
    let clamped = dbfs.clamp(floor_db, 0.0);
    (clamped - floor_db) / (0.0 - floor_db)
}
