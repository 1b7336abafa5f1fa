use anyhow::bail;

/// Rescaling policy applied to a numeric vector before layout or ranking.
///
/// A closed set of policies bound to pure functions; there is no string
/// dispatch in the numeric path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Subtract the mean, divide by the standard deviation.
    Scale,
    /// Fractional rank (average rank on ties) scaled to `range`.
    Rank { range: f64 },
    /// Min-max normalization onto [0, 1].
    Bounded,
}

impl Normalization {
    pub fn apply(&self, values: &[f64]) -> anyhow::Result<Vec<f64>> {
        match self {
            Normalization::Scale => scale(values),
            Normalization::Rank { range } => Ok(rank(values, *range)),
            Normalization::Bounded => bounded(values),
        }
    }
}

fn scale(values: &[f64]) -> anyhow::Result<Vec<f64>> {
    if values.is_empty() {
        bail!("cannot scale an empty vector");
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    if sd <= 0.0 || !sd.is_finite() {
        bail!("zero-variance vector cannot be z-scored");
    }
    Ok(values.iter().map(|v| (v - mean) / sd).collect())
}

fn rank(values: &[f64], range: f64) -> Vec<f64> {
    let scaled = fractional_ranks(values);
    let n = values.len() as f64;
    scaled.iter().map(|r| r / n * range).collect()
}

fn bounded(values: &[f64]) -> anyhow::Result<Vec<f64>> {
    if values.is_empty() {
        bail!("cannot min-max normalize an empty vector");
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span <= 0.0 || !span.is_finite() {
        bail!(
            "degenerate vector (min {} == max {}) cannot be min-max normalized",
            min,
            max
        );
    }
    Ok(values.iter().map(|v| (v - min) / span).collect())
}

/// 1-based fractional ranks with average ranks assigned to ties.
pub(crate) fn fractional_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Average the ranks the tied block would have occupied.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scale_has_zero_mean_unit_variance() {
        let values = vec![2.0, 4.0, 6.0, 8.0, 20.0];
        let scaled = Normalization::Scale.apply(&values).unwrap();
        let n = scaled.len() as f64;
        let mean = scaled.iter().sum::<f64>() / n;
        let var = scaled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn scale_fails_on_constant_input() {
        assert!(Normalization::Scale.apply(&[3.0, 3.0, 3.0]).is_err());
    }

    #[test]
    fn bounded_spans_unit_interval() {
        let values = vec![5.0, -1.0, 3.0, 11.0];
        let out = Normalization::Bounded.apply(&values).unwrap();
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_relative_eq!(out[1], 0.0);
        assert_relative_eq!(out[3], 1.0);
    }

    #[test]
    fn bounded_is_idempotent() {
        let values = vec![5.0, -1.0, 3.0, 11.0];
        let once = Normalization::Bounded.apply(&values).unwrap();
        let twice = Normalization::Bounded.apply(&once).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn bounded_fails_on_zero_range() {
        assert!(Normalization::Bounded.apply(&[1.0, 1.0]).is_err());
    }

    #[test]
    fn rank_averages_ties() {
        let values = vec![10.0, 20.0, 20.0, 5.0];
        let ranks = fractional_ranks(&values);
        assert_eq!(ranks, vec![2.0, 3.5, 3.5, 1.0]);

        let out = Normalization::Rank { range: 8.0 }.apply(&values).unwrap();
        assert_relative_eq!(out[3], 1.0 / 4.0 * 8.0);
        assert_relative_eq!(out[1], 3.5 / 4.0 * 8.0);
    }
}
