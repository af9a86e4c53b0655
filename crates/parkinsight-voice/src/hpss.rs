//! Harmonic/percussive separation by median filtering (Fitzgerald, 2010).
//!
//! Harmonic energy is smooth along time, percussive energy is smooth along
//! frequency. Median-filtering the magnitude spectrogram in each direction
//! and turning the results into soft masks splits the power of the signal
//! into the two components; only their totals are needed downstream.
//!
//! # Algorithm
//!
//! 1. STFT with a Hann window (`n_fft` 2048, hop 512)
//! 2. `H = median_time(|X|)`, `P = median_freq(|X|)` with [`KERNEL`]-wide filters
//! 3. Soft masks `M_h = H² / (H² + P²)`, `M_p = P² / (H² + P²)`
//! 4. Component powers `Σ |X·M|²`

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// STFT frame length.
pub const N_FFT: usize = 2048;

/// STFT hop.
pub const HOP: usize = 512;

/// Median filter width in both directions.
pub const KERNEL: usize = 31;

/// Total power of the harmonic and percussive components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentPower {
    /// Harmonic power.
    pub harmonic: f64,
    /// Percussive (noise-like) power.
    pub percussive: f64,
}

/// Magnitude spectrogram as `frames x bins`.
fn magnitude_spectrogram(samples: &[f32]) -> Vec<Vec<f64>> {
    let mut padded;
    let signal = if samples.len() < N_FFT {
        padded = samples.to_vec();
        padded.resize(N_FFT, 0.0);
        &padded[..]
    } else {
        samples
    };

    let window: Vec<f64> = (0..N_FFT)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / N_FFT as f64).cos())
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let bins = N_FFT / 2 + 1;

    let n_frames = (signal.len() - N_FFT) / HOP + 1;
    let mut buffer = vec![Complex::new(0.0, 0.0); N_FFT];
    (0..n_frames)
        .map(|f| {
            let frame = &signal[f * HOP..f * HOP + N_FFT];
            for ((b, s), w) in buffer.iter_mut().zip(frame).zip(&window) {
                *b = Complex::new(f64::from(*s) * w, 0.0);
            }
            fft.process(&mut buffer);
            buffer[..bins].iter().map(|c| c.norm()).collect()
        })
        .collect()
}

/// Median of `values` (upper median for even lengths). Reorders `values`.
fn median(values: &mut [f64]) -> f64 {
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    *m
}

/// Windowed median along one axis; the window is clipped at the edges.
fn median_filter(line: &[f64], scratch: &mut Vec<f64>) -> Vec<f64> {
    let half = KERNEL / 2;
    (0..line.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(line.len());
            scratch.clear();
            scratch.extend_from_slice(&line[lo..hi]);
            median(scratch)
        })
        .collect()
}

/// Split the signal's spectral power into harmonic and percussive parts.
///
/// Returns `None` for an empty signal.
#[must_use]
pub fn component_power(samples: &[f32]) -> Option<ComponentPower> {
    if samples.is_empty() {
        return None;
    }
    let spec = magnitude_spectrogram(samples);
    let n_frames = spec.len();
    let n_bins = spec.first().map_or(0, Vec::len);
    let mut scratch = Vec::with_capacity(KERNEL);

    // Harmonic: filter each bin across time.
    let mut harmonic = vec![vec![0.0; n_bins]; n_frames];
    let mut line = Vec::with_capacity(n_frames);
    for k in 0..n_bins {
        line.clear();
        line.extend(spec.iter().map(|frame| frame[k]));
        for (t, v) in median_filter(&line, &mut scratch).into_iter().enumerate() {
            harmonic[t][k] = v;
        }
    }

    // Percussive: filter each frame across frequency.
    let percussive: Vec<Vec<f64>> = spec
        .iter()
        .map(|frame| median_filter(frame, &mut scratch))
        .collect();

    let mut power = ComponentPower {
        harmonic: 0.0,
        percussive: 0.0,
    };
    for t in 0..n_frames {
        for k in 0..n_bins {
            let x2 = spec[t][k].powi(2);
            let h2 = harmonic[t][k].powi(2);
            let p2 = percussive[t][k].powi(2);
            let total = h2 + p2;
            if total <= 0.0 {
                continue;
            }
            let (mh, mp) = (h2 / total, p2 / total);
            power.harmonic += x2 * mh * mh;
            power.percussive += x2 * mp * mp;
        }
    }
    Some(power)
}
