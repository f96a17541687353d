/// Largest global budget that lets every stream contribute equally:
/// `min(populations) * populations.len()`.
///
/// An empty slice yields `0`.
pub fn balanced_sample_budget(populations: &[u64]) -> u64 {
    let Some(min) = populations.iter().copied().min() else {
        return 0;
    };
    min.saturating_mul(populations.len() as u64)
}

/// Population counts scaled into `[0, 1]` by the largest count.
///
/// Returns `None` when there is nothing to weight (empty input or every count
/// is zero); callers fall back to uniform draws.
pub fn normalized_weights(populations: &[u64]) -> Option<Vec<f64>> {
    let max = populations.iter().copied().max()?;
    if max == 0 {
        return None;
    }
    Some(
        populations
            .iter()
            .map(|count| *count as f64 / max as f64)
            .collect(),
    )
}

/// Effective cap on the single-stream path: the smaller of the explicit caps.
pub fn single_stream_cap(per_stream: Option<u64>, global: Option<u64>) -> Option<u64> {
    match (per_stream, global) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Estimated number of descriptors a balanced run yields before the budget applies.
///
/// Each stream contributes `min(population, per_stream_cap)`.
pub fn capped_population_total(populations: &[u64], per_stream_cap: Option<u64>) -> u64 {
    populations
        .iter()
        .map(|count| per_stream_cap.map_or(*count, |cap| (*count).min(cap)))
        .fold(0u64, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_budget_is_min_times_streams() {
        assert_eq!(balanced_sample_budget(&[50, 30]), 60);
        assert_eq!(balanced_sample_budget(&[5]), 5);
        assert_eq!(balanced_sample_budget(&[10, 0, 3]), 0);
        assert_eq!(balanced_sample_budget(&[]), 0);
    }

    #[test]
    fn weights_are_normalized_by_max() {
        let weights = normalized_weights(&[100, 10, 0]).unwrap();
        assert_eq!(weights, vec![1.0, 0.1, 0.0]);
        assert!(normalized_weights(&[0, 0]).is_none());
        assert!(normalized_weights(&[]).is_none());
    }

    #[test]
    fn single_stream_cap_takes_smaller_explicit_cap() {
        assert_eq!(single_stream_cap(Some(10), Some(4)), Some(4));
        assert_eq!(single_stream_cap(Some(3), Some(4)), Some(3));
        assert_eq!(single_stream_cap(None, Some(4)), Some(4));
        assert_eq!(single_stream_cap(Some(2), None), Some(2));
        assert_eq!(single_stream_cap(None, None), None);
    }

    #[test]
    fn capped_population_total_applies_per_stream_cap() {
        assert_eq!(capped_population_total(&[50, 30], None), 80);
        assert_eq!(capped_population_total(&[50, 30], Some(40)), 70);
        assert_eq!(capped_population_total(&[], Some(1)), 0);
    }
}
