//! Confidence combinators shared by patterns and tuples

/// Exponentially-weighted moving average: `alpha * new + (1 - alpha) * old`
pub fn ewma(alpha: f64, new: f64, old: f64) -> f64 {
    alpha * new + (1.0 - alpha) * old
}

/// Probabilistic OR of independent signals: `1 - Π(1 - s_i)`.
///
/// An empty set of signals combines to `0.0`.
pub fn noisy_or<I>(signals: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    1.0 - signals.into_iter().map(|s| 1.0 - s).product::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ewma_extremes() {
        assert_eq!(ewma(1.0, 0.3, 0.9), 0.3);
        assert_eq!(ewma(0.0, 0.3, 0.9), 0.9);
        assert!((ewma(0.5, 0.2, 0.6) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_noisy_or() {
        assert_eq!(noisy_or([]), 0.0);
        assert!((noisy_or([0.5]) - 0.5).abs() < 1e-12);
        assert!((noisy_or([0.5, 0.5]) - 0.75).abs() < 1e-12);
        assert_eq!(noisy_or([1.0, 0.2]), 1.0);
    }

    proptest! {
        #[test]
        fn prop_noisy_or_grows_with_signals(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            prop_assert!(noisy_or([a, b]) >= noisy_or([a]) - 1e-12);
        }
    }
}
