//! Rolling-window helpers used by the built-in strategies.
//!
//! Every function returns a series aligned with its input: index `i` only
//! looks at `values[..=i]`, and a window containing NaN yields NaN.

/// Simple moving average. First valid value at `period - 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Highest value over the trailing window.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Lowest value over the trailing window.
pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(window);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(&out[2..], &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn sma_nan_poisons_window() {
        let out = sma(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_eq!(out[3], 3.5);
    }

    #[test]
    fn channel_bounds() {
        let highs = [10.0, 12.0, 11.0, 9.0, 13.0];
        assert_eq!(rolling_max(&highs, 3)[2..], [12.0, 12.0, 13.0]);
        assert_eq!(rolling_min(&highs, 3)[2..], [10.0, 9.0, 9.0]);
    }

    #[test]
    fn short_input_is_all_nan() {
        assert!(sma(&[1.0, 2.0], 3).iter().all(|v| v.is_nan()));
        assert!(rolling_max(&[], 3).is_empty());
    }
}
