//! Per-request score calibration.
//!
//! Raw BM25 scores and raw reranker logits have unbounded, query-dependent
//! scales; cosine similarity is bounded but not `[0,1]`. Calibrating each
//! source's raw values against the statistics of the current request's
//! candidate union keeps fusion thresholds meaningful across query
//! distributions, instead of drifting with a fixed min/max.

use std::collections::HashMap;

/// Summary statistics of a set of raw scores within one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
}

/// Floor applied to standard deviation and range to avoid division by zero.
const EPSILON: f32 = 1e-6;

/// Compute mean/std/min/max over `values`.
///
/// `std` uses the Bessel-corrected (`n - 1`) denominator when more than one
/// value is given; with zero or one value, `std` is `0.0` (callers should
/// treat it as degenerate, which [`logistic_from_stats`] does).
pub fn compute_stats(values: &[f32]) -> Stats {
    if values.is_empty() {
        return Stats { mean: 0.0, std: 0.0, min: 0.0, max: 0.0 };
    }

    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let std = if values.len() > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    Stats { mean, std, min, max }
}

/// Map a raw value to `[0,1]` using the request's score distribution.
///
/// With enough spread (`|values| > 1` and `std >= EPSILON` in the stats that
/// produced `stats`), this is a scaled logistic `σ((x - mean) / max(std, ε) · scale)`.
/// Otherwise it falls back to a deterministic min-max clamp, returning `0.5`
/// for a fully degenerate distribution (`max == min`).
pub fn logistic_from_stats(x: f32, stats: Stats, scale: f32) -> f32 {
    if stats.std >= EPSILON {
        let z = (x - stats.mean) / stats.std.max(EPSILON) * scale;
        return sigmoid(z);
    }

    let range = stats.max - stats.min;
    if range.abs() < EPSILON {
        return 0.5;
    }
    ((x - stats.min) / range.max(EPSILON)).clamp(0.0, 1.0)
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// Re-normalize an arbitrary weight mapping so its values sum to `1`.
///
/// Negative weights are clamped to `0` before normalization. If every
/// weight is zero, `defaults` is returned unchanged -- this is how a
/// misconfigured `FUSION_<SOURCE>_WEIGHT` override degrades safely rather
/// than producing a zeroed-out fusion.
pub fn normalize_weight_mapping(
    weights: &HashMap<String, f32>,
    defaults: &HashMap<String, f32>,
) -> HashMap<String, f32> {
    let sum: f32 = weights.values().map(|w| w.max(0.0)).sum();
    if sum <= EPSILON {
        return defaults.clone();
    }
    weights
        .iter()
        .map(|(k, v)| (k.clone(), v.max(0.0) / sum))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_stats_basic() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = compute_stats(&values);
        assert!((stats.mean - 3.0).abs() < 1e-6);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert!(stats.std > 0.0);
    }

    #[test]
    fn compute_stats_single_value_has_zero_std() {
        let stats = compute_stats(&[2.5]);
        assert_eq!(stats.std, 0.0);
    }

    #[test]
    fn logistic_maps_mean_to_half() {
        let stats = Stats { mean: 10.0, std: 2.0, min: 0.0, max: 20.0 };
        let mapped = logistic_from_stats(10.0, stats, 1.0);
        assert!((mapped - 0.5).abs() < 1e-4);
    }

    #[test]
    fn logistic_clamps_to_unit_interval() {
        let stats = Stats { mean: 0.0, std: 1.0, min: -10.0, max: 10.0 };
        let high = logistic_from_stats(1000.0, stats, 1.0);
        let low = logistic_from_stats(-1000.0, stats, 1.0);
        assert!(high <= 1.0 && high > 0.99);
        assert!(low >= 0.0 && low < 0.01);
    }

    #[test]
    fn degenerate_distribution_falls_back_to_min_max() {
        // std < epsilon but values differ in range: min-max clamp applies.
        let stats = Stats { mean: 5.0, std: 0.0, min: 0.0, max: 10.0 };
        let mapped = logistic_from_stats(7.5, stats, 1.0);
        assert!((mapped - 0.75).abs() < 1e-6);
    }

    #[test]
    fn fully_degenerate_distribution_returns_one_half() {
        let stats = Stats { mean: 5.0, std: 0.0, min: 5.0, max: 5.0 };
        assert_eq!(logistic_from_stats(5.0, stats, 1.0), 0.5);
    }

    #[test]
    fn normalize_weight_mapping_sums_to_one() {
        let mut weights = HashMap::new();
        weights.insert("bm25".to_string(), 2.0);
        weights.insert("cosine".to_string(), 2.0);

        let defaults = HashMap::new();
        let normalized = normalize_weight_mapping(&weights, &defaults);
        let sum: f32 = normalized.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_weight_mapping_all_zero_restores_defaults() {
        let mut weights = HashMap::new();
        weights.insert("bm25".to_string(), 0.0);
        weights.insert("cosine".to_string(), 0.0);

        let mut defaults = HashMap::new();
        defaults.insert("bm25".to_string(), 0.1);
        defaults.insert("cosine".to_string(), 0.9);

        let normalized = normalize_weight_mapping(&weights, &defaults);
        assert_eq!(normalized, defaults);
    }
}
