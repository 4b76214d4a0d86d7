//! Numerically careful aggregation helpers.
//!
//! Everything here is pure and allocation-light; callers pass slices of
//! per-timestep samples. NaN inputs propagate as NaN rather than being
//! silently reordered by sorts, except where noted.

/// Guard added under log10 so zero samples stay finite.
pub const LOG_GUARD: f64 = 1e-16;

/// Arithmetic mean. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolation quantile (R type 7) on unsorted data.
///
/// `q` is clamped to [0, 1]. Returns 0.0 for empty input. NaN samples are
/// dropped before ranking.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Upper Tukey fence: `Q75 + 1.5 * (Q75 - Q25)`.
pub fn tukey_upper_fence(values: &[f64]) -> f64 {
    let q75 = quantile(values, 0.75);
    let q25 = quantile(values, 0.25);
    q75 + 1.5 * (q75 - q25)
}

/// Count samples strictly above the upper Tukey fence.
pub fn tukey_outlier_count(values: &[f64]) -> usize {
    if values.len() < 4 {
        return 0;
    }
    let fence = tukey_upper_fence(values);
    values.iter().filter(|v| **v > fence).count()
}

/// Centered moving average with an odd window, shrunk at the boundaries.
///
/// For window 5, element `i` averages indices `[i-2, i+2]` clipped to the
/// slice. Shorter inputs degrade gracefully to whatever fits.
pub fn moving_average_centered(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        out.push(mean(&values[lo..hi]));
    }
    out
}

/// First difference, zero-padded at the start: `out[0] = 0`,
/// `out[i] = values[i] - values[i-1]`.
pub fn first_difference(values: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

/// Lagged copy, zero-padded at the start: `out[i] = values[i - k]`.
pub fn lag(values: &[f64], k: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    for i in k..values.len() {
        out[i] = values[i - k];
    }
    out
}

/// `numerator / denominator` with a floor on the denominator.
pub fn ratio_floored(numerator: f64, denominator: f64, floor: f64) -> f64 {
    numerator / denominator.max(floor)
}

/// `log10(x + LOG_GUARD)`; keeps zero samples finite.
pub fn log10_guarded(x: f64) -> f64 {
    (x + LOG_GUARD).log10()
}

/// Mean of successive `log10_guarded` differences over the given samples.
/// Returns 0.0 with fewer than two samples.
pub fn mean_log10_reduction(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for pair in samples.windows(2) {
        sum += log10_guarded(pair[1]) - log10_guarded(pair[0]);
    }
    sum / (samples.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&data, 0.0), 1.0);
        assert_eq!(quantile(&data, 1.0), 4.0);
        assert!((quantile(&data, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_tukey_flags_single_spike() {
        // 10 timesteps of well-behaved iteration counts plus one blowup.
        let iters = [2.0, 2.0, 3.0, 2.0, 3.0, 2.0, 2.0, 3.0, 2.0, 50.0];
        assert_eq!(tukey_outlier_count(&iters), 1);
        let fence = tukey_upper_fence(&iters);
        assert!(fence > 3.0 && fence < 50.0);
    }

    #[test]
    fn test_tukey_uniform_data_has_no_outliers() {
        let flat = [5.0; 20];
        assert_eq!(tukey_outlier_count(&flat), 0);
    }

    #[test]
    fn test_tukey_tiny_input() {
        assert_eq!(tukey_outlier_count(&[1.0, 100.0]), 0);
    }

    #[test]
    fn test_moving_average_shrinks_at_edges() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ma = moving_average_centered(&v, 5);
        assert_eq!(ma.len(), 6);
        // index 0 averages [1,2,3]
        assert!((ma[0] - 2.0).abs() < 1e-12);
        // index 2 averages [1..=5]
        assert!((ma[2] - 3.0).abs() < 1e-12);
        // index 5 averages [4,5,6]
        assert!((ma[5] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_moving_average_shorter_than_window() {
        let v = [2.0, 4.0];
        let ma = moving_average_centered(&v, 5);
        assert!((ma[0] - 3.0).abs() < 1e-12);
        assert!((ma[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_first_difference_zero_padded() {
        assert_eq!(first_difference(&[3.0, 5.0, 4.0]), vec![0.0, 2.0, -1.0]);
        assert_eq!(first_difference(&[]), Vec::<f64>::new());
    }

    #[test]
    fn test_lag() {
        assert_eq!(lag(&[1.0, 2.0, 3.0], 1), vec![0.0, 1.0, 2.0]);
        assert_eq!(lag(&[1.0, 2.0, 3.0], 2), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_ratio_floored() {
        assert_eq!(ratio_floored(1.0, 0.0, 1e-6), 1e6);
        assert_eq!(ratio_floored(4.0, 2.0, 1e-6), 2.0);
    }

    #[test]
    fn test_mean_log10_reduction_converging_sequence() {
        // One order of magnitude per iteration.
        let samples = [1e-1, 1e-2, 1e-3, 1e-4];
        let r = mean_log10_reduction(&samples);
        assert!((r + 1.0).abs() < 1e-6, "got {r}");
    }

    #[test]
    fn test_mean_log10_reduction_needs_two_samples() {
        assert_eq!(mean_log10_reduction(&[1.0]), 0.0);
        assert_eq!(mean_log10_reduction(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_quantile_within_range(v in proptest::collection::vec(0.0f64..1e9, 1..200), q in 0.0f64..1.0) {
            let min = v.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let x = quantile(&v, q);
            prop_assert!(x >= min && x <= max);
        }

        #[test]
        fn prop_moving_average_preserves_length(v in proptest::collection::vec(-1e6f64..1e6, 0..100)) {
            prop_assert_eq!(moving_average_centered(&v, 5).len(), v.len());
        }

        #[test]
        fn prop_lag_is_shifted_identity(v in proptest::collection::vec(-1e6f64..1e6, 2..100)) {
            let l = lag(&v, 1);
            for i in 1..v.len() {
                prop_assert_eq!(l[i], v[i - 1]);
            }
        }
    }
}
