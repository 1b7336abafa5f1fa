use ndarray::ArrayView1;
use num_traits::{Float, FromPrimitive, ToPrimitive};

use crate::normalize::fractional_ranks;

pub fn pearson<T>(a: ArrayView1<T>, b: ArrayView1<T>) -> f64
where
    T: Float + FromPrimitive + ToPrimitive,
{
    let n = T::from_usize(a.len()).unwrap_or_else(T::one);
    let mut sum_a = T::zero();
    let mut sum_b = T::zero();
    let mut sum_ab = T::zero();
    let mut sum_a_sq = T::zero();
    let mut sum_b_sq = T::zero();

    for i in 0..a.len() {
        sum_a = sum_a + a[i];
        sum_b = sum_b + b[i];
        sum_ab = sum_ab + a[i] * b[i];
        sum_a_sq = sum_a_sq + a[i] * a[i];
        sum_b_sq = sum_b_sq + b[i] * b[i];
    }

    let numerator = sum_ab - (sum_a * sum_b) / n;
    let denominator =
        ((sum_a_sq - (sum_a * sum_a) / n) * (sum_b_sq - (sum_b * sum_b) / n)).sqrt();

    if denominator > T::epsilon() {
        (numerator / denominator)
            .to_f64()
            .map(|r| r.clamp(-1.0, 1.0))
            .unwrap_or(0.0)
    } else {
        0.0
    }
}

/// Pearson correlation of the fractional ranks.
pub fn spearman<T>(a: ArrayView1<T>, b: ArrayView1<T>) -> f64
where
    T: Float + FromPrimitive + ToPrimitive,
{
    let to_f64 = |v: ArrayView1<T>| -> Vec<f64> {
        v.iter().map(|x| x.to_f64().unwrap_or(f64::NAN)).collect()
    };
    let ra = fractional_ranks(&to_f64(a));
    let rb = fractional_ranks(&to_f64(b));
    pearson(ArrayView1::from(&ra), ArrayView1::from(&rb))
}

pub fn cosine_similarity<T>(a: ArrayView1<T>, b: ArrayView1<T>) -> f64
where
    T: Float + FromPrimitive + ToPrimitive,
{
    let mut dot_product = T::zero();
    let mut norm_a = T::zero();
    let mut norm_b = T::zero();

    for i in 0..a.len() {
        dot_product = dot_product + a[i] * b[i];
        norm_a = norm_a + a[i] * a[i];
        norm_b = norm_b + b[i] * b[i];
    }

    let norm_product = (norm_a * norm_b).sqrt();
    if norm_product > T::epsilon() {
        (dot_product / norm_product)
            .to_f64()
            .map(|c| c.clamp(-1.0, 1.0))
            .unwrap_or(0.0)
    } else {
        0.0
    }
}

pub fn euclidean_distance<T>(a: ArrayView1<T>, b: ArrayView1<T>) -> f64
where
    T: Float + FromPrimitive + ToPrimitive,
{
    let mut squared_dist = T::zero();
    for i in 0..a.len() {
        let diff = a[i] - b[i];
        squared_dist = squared_dist + diff * diff;
    }
    squared_dist.sqrt().to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn pearson_detects_perfect_linear_relation() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        let b = array![2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(pearson(a.view(), b.view()), 1.0, epsilon = 1e-12);

        let c = array![8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(pearson(a.view(), c.view()), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_works_for_f32_inputs() {
        let a = array![1.0_f32, 2.0, 3.0, 4.0];
        let b = array![2.0_f32, 4.0, 6.0, 8.0];
        assert_relative_eq!(pearson(a.view(), b.view()), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn spearman_is_invariant_to_monotone_transforms() {
        let a = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = array![1.0, 8.0, 27.0, 64.0, 125.0];
        assert_relative_eq!(spearman(a.view(), b.view()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![2.0, 4.0, 6.0];
        assert_relative_eq!(cosine_similarity(a.view(), b.view()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn euclidean_distance_matches_hand_computation() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_relative_eq!(euclidean_distance(a.view(), b.view()), 5.0);
    }
}
