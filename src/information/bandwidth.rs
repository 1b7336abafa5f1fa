use anyhow::bail;

/// Unbiased cross-validation bandwidth selector for a Gaussian kernel.
///
/// Minimizes the UCV criterion over `[0.1 * hmax, hmax]` with
/// `hmax = 1.144 * sd * n^(-1/5)` by golden-section search.
pub(crate) fn bw_ucv(values: &[f64]) -> anyhow::Result<f64> {
    let n = values.len();
    if n < 2 {
        bail!("bandwidth selection requires at least 2 observations, got {}", n);
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (nf - 1.0);
    let sd = var.sqrt();
    if sd <= 0.0 || !sd.is_finite() {
        bail!("zero-variance vector has no cross-validation bandwidth");
    }

    let hmax = 1.144 * sd * nf.powf(-0.2);
    let lower = 0.1 * hmax;
    let tol = 0.1 * lower;

    Ok(golden_section_min(|h| ucv_score(values, h), lower, hmax, tol))
}

/// UCV score for bandwidth `h` (Gaussian kernel, exact pair sums).
fn ucv_score(values: &[f64], h: f64) -> f64 {
    let n = values.len() as f64;
    let sqrt_pi = std::f64::consts::PI.sqrt();
    let sqrt_8 = 8.0_f64.sqrt();

    let mut sum = 0.0;
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            let u = (values[i] - values[j]) / h;
            sum += (-u * u / 4.0).exp() - sqrt_8 * (-u * u / 2.0).exp();
        }
    }
    1.0 / (2.0 * n * h * sqrt_pi) + sum / (n * n * h * sqrt_pi)
}

fn golden_section_min<F: Fn(f64) -> f64>(f: F, mut a: f64, mut b: f64, tol: f64) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_9;
    let mut c = b - (b - a) * INV_PHI;
    let mut d = a + (b - a) * INV_PHI;
    let mut fc = f(c);
    let mut fd = f(d);

    for _ in 0..200 {
        if (b - a).abs() < tol {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - (b - a) * INV_PHI;
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + (b - a) * INV_PHI;
            fd = f(d);
        }
    }
    (a + b) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_is_positive_and_below_hmax() {
        let values: Vec<f64> = (0..60).map(|i| (i as f64 * 0.37).sin() * 3.0).collect();
        let h = bw_ucv(&values).unwrap();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let sd =
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        let hmax = 1.144 * sd * n.powf(-0.2);
        assert!(h > 0.0);
        assert!(h <= hmax);
    }

    #[test]
    fn constant_vector_is_rejected() {
        assert!(bw_ucv(&[1.0; 10]).is_err());
    }

    #[test]
    fn golden_section_finds_parabola_minimum() {
        let min = golden_section_min(|x| (x - 2.5) * (x - 2.5), 0.0, 10.0, 1e-8);
        assert!((min - 2.5).abs() < 1e-6);
    }
}
