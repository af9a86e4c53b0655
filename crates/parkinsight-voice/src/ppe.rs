//! Pitch period entropy.
//!
//! Entropy (nats) of the histogram of pitch periods `1 / f0` over voiced
//! frames. Bin widths follow numpy's `auto` rule: the smaller of the
//! Freedman-Diaconis and Sturges widths, or Sturges alone when the
//! interquartile range is zero.
//!
//! Near-constant pitch with a single outlier drives the Freedman-Diaconis
//! width towards zero and the bin count into the billions, so only occupied
//! bins are stored.

use std::collections::BTreeMap;

/// Shannon entropy of the period histogram, `None` with fewer than two periods.
#[must_use]
pub fn pitch_period_entropy(f0: &[f64]) -> Option<f64> {
    let periods: Vec<f64> = f0
        .iter()
        .filter(|f| f.is_finite() && **f > 0.0)
        .map(|f| 1.0 / f)
        .collect();
    if periods.len() < 2 {
        return None;
    }
    let histogram = histogram(&periods);
    Some(entropy(histogram.counts.values().copied()))
}

/// Equal-width histogram keeping occupied bins only.
#[derive(Debug, Clone, PartialEq)]
struct Histogram {
    /// Number of bins the `auto` rule chose.
    bins: usize,
    /// Count per occupied bin index.
    counts: BTreeMap<usize, usize>,
}

/// Bin `values` with the `auto` rule.
fn histogram(values: &[f64]) -> Histogram {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 0.0 {
        return Histogram {
            bins: 1,
            counts: BTreeMap::from([(0, values.len())]),
        };
    }

    let n = values.len() as f64;
    let sturges = range / (n.log2() + 1.0);
    let fd = 2.0 * interquartile_range(values) * n.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };
    // Float-to-int casts saturate, so an enormous ratio stays a valid count.
    let bins = ((range / width).ceil() as usize).max(1);

    let mut counts = BTreeMap::new();
    for v in values {
        let idx = (((v - min) / range) * bins as f64) as usize;
        *counts.entry(idx.min(bins - 1)).or_insert(0) += 1;
    }
    Histogram { bins, counts }
}

/// `q75 - q25` with linear interpolation between order statistics.
fn interquartile_range(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 75.0) - percentile(&sorted, 25.0)
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let pos = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Entropy in nats of the normalised counts.
fn entropy(counts: impl Iterator<Item = usize> + Clone) -> f64 {
    let total: usize = counts.clone().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .filter(|c| *c > 0)
        .map(|c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}
