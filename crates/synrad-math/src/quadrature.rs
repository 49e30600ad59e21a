//! Trapezoid quadrature on non-uniform samples and compensated summation.

/// Trapezoid weights for sample abscissae `t` (any spacing, any sign of step).
///
/// `Σ w_i f(t_i)` approximates `∫ f dt` over `[t_0, t_{n-1}]`.
pub fn trapezoid_weights(t: &[f64]) -> Vec<f64> {
    let n = t.len();
    let mut w = vec![0.0; n];
    if n < 2 {
        return w;
    }
    for i in 0..n - 1 {
        let half = 0.5 * (t[i + 1] - t[i]);
        w[i] += half;
        w[i + 1] += half;
    }
    w
}

/// Trapezoid integral of samples `f` over abscissae `t`.
pub fn trapezoid(t: &[f64], f: &[f64]) -> f64 {
    let mut sum = KahanSum::default();
    for (w, v) in trapezoid_weights(t).iter().zip(f.iter()) {
        sum.add(w * v);
    }
    sum.value()
}

/// Kahan–Babuška (Neumaier) compensated accumulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trapezoid_exact_for_linear_on_nonuniform_grid() {
        let t = [0.0, 0.1, 0.5, 0.55, 2.0];
        let f: Vec<f64> = t.iter().map(|x| 3.0 * x + 1.0).collect();
        // ∫_0^2 (3x + 1) dx = 8
        assert!((trapezoid(&t, &f) - 8.0).abs() < 1e-12);
        let w = trapezoid_weights(&t);
        assert!((w.iter().sum::<f64>() - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_trapezoid_degenerate_inputs() {
        assert!(trapezoid_weights(&[]).is_empty());
        assert_eq!(trapezoid_weights(&[1.0]), vec![0.0]);
    }

    #[test]
    fn test_kahan_recovers_small_terms() {
        let mut k = KahanSum::default();
        k.add(1.0);
        for _ in 0..10_000 {
            k.add(1e-16);
        }
        k.add(-1.0);
        assert!((k.value() - 1e-12).abs() < 1e-20, "{}", k.value());
    }
}
