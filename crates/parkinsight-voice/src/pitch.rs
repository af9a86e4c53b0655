//! Monophonic fundamental-frequency tracking (YIN).
//!
//! # Algorithm
//!
//! Per frame of [`FRAME_LENGTH`] samples, hopped by [`HOP_LENGTH`]:
//!
//! 1. Difference function `d(τ) = Σ (x[j] - x[j+τ])²` over lags covering
//!    [`FMIN_HZ`]..[`FMAX_HZ`]
//! 2. Cumulative mean normalised difference `d'(τ) = d(τ)·τ / Σ_{k≤τ} d(k)`
//! 3. First lag whose `d'` dips below [`VOICING_THRESHOLD`], refined to its
//!    local minimum and by parabolic interpolation
//! 4. Frames with no such dip are unvoiced
//!
//! # Reference
//!
//! de Cheveigné, A., & Kawahara, H. (2002). YIN, a fundamental frequency
//! estimator for speech and music. *JASA* 111(4).

/// Lowest tracked frequency (C2).
pub const FMIN_HZ: f64 = 65.41;

/// Highest tracked frequency (C7).
pub const FMAX_HZ: f64 = 2093.0;

/// Analysis frame length in samples.
pub const FRAME_LENGTH: usize = 2048;

/// Hop between frames in samples.
pub const HOP_LENGTH: usize = 512;

/// CMNDF value below which a frame counts as voiced.
pub const VOICING_THRESHOLD: f64 = 0.1;

/// Frames quieter than this RMS are treated as unvoiced.
const SILENCE_RMS: f64 = 1e-4;

/// Per-frame F0 estimates; `None` marks unvoiced frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchTrack {
    /// One entry per analysed frame.
    pub frames: Vec<Option<f64>>,
}

impl PitchTrack {
    /// F0 values of voiced frames, in frame order.
    #[must_use]
    pub fn voiced(&self) -> Vec<f64> {
        self.frames.iter().flatten().copied().collect()
    }

    /// Number of voiced frames.
    #[must_use]
    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }
}

/// Track F0 over `samples`.
///
/// Returns an empty track when the signal is shorter than one frame or the
/// sample rate cannot represent the tracked band.
#[must_use]
pub fn track_pitch(samples: &[f32], sample_rate: u32) -> PitchTrack {
    let sr = f64::from(sample_rate);
    let tau_min = ((sr / FMAX_HZ).floor() as usize).max(2);
    let tau_max = (sr / FMIN_HZ).ceil() as usize;
    if sample_rate == 0 || tau_max + 2 >= FRAME_LENGTH || samples.len() < FRAME_LENGTH {
        return PitchTrack::default();
    }

    let window = FRAME_LENGTH - tau_max - 1;
    let mut diff = vec![0.0f64; tau_max + 2];
    let frames = (0..=(samples.len() - FRAME_LENGTH) / HOP_LENGTH)
        .map(|i| {
            let frame = &samples[i * HOP_LENGTH..i * HOP_LENGTH + FRAME_LENGTH];
            estimate_frame(frame, sr, tau_min, tau_max, window, &mut diff)
        })
        .collect();

    PitchTrack { frames }
}

fn estimate_frame(
    frame: &[f32],
    sr: f64,
    tau_min: usize,
    tau_max: usize,
    window: usize,
    diff: &mut [f64],
) -> Option<f64> {
    let energy: f64 = frame.iter().map(|s| f64::from(*s).powi(2)).sum();
    if (energy / frame.len() as f64).sqrt() < SILENCE_RMS {
        return None;
    }

    // Difference function.
    diff[0] = 0.0;
    for tau in 1..=tau_max + 1 {
        diff[tau] = (0..window)
            .map(|j| {
                let d = f64::from(frame[j]) - f64::from(frame[j + tau]);
                d * d
            })
            .sum();
    }

    // Cumulative mean normalisation, in place.
    let mut running = 0.0;
    diff[0] = 1.0;
    for tau in 1..=tau_max + 1 {
        running += diff[tau];
        diff[tau] = if running > 0.0 {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }

    let mut tau = tau_min;
    while tau <= tau_max {
        if diff[tau] < VOICING_THRESHOLD {
            while tau < tau_max && diff[tau + 1] < diff[tau] {
                tau += 1;
            }
            let refined = parabolic_peak(diff, tau);
            let f0 = sr / refined;
            return (FMIN_HZ..=FMAX_HZ).contains(&f0).then_some(f0);
        }
        tau += 1;
    }
    None
}

/// Sub-sample position of the minimum around `tau`.
fn parabolic_peak(cmndf: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmndf.len() {
        return tau as f64;
    }
    let (a, b, c) = (cmndf[tau - 1], cmndf[tau], cmndf[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        tau as f64
    } else {
        tau as f64 + 0.5 * (a - c) / denom
    }
}
