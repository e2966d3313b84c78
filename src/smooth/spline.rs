use super::SmoothError;
use super::interp::collapse_ties;
use super::linalg::PentaDiagonal;

/// Natural cubic smoothing spline in Reinsch form.
///
/// Minimises `Σ wᵢ (yᵢ − g(xᵢ))² + λ ∫ g''(t)² dt`, where tied x values are
/// merged into one knot with weight equal to the tie count. Outside the
/// knot range the spline continues as a straight line.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingSpline {
    knots: Vec<f64>,
    /// Fitted values at the knots.
    values: Vec<f64>,
    /// Second derivatives at the knots; zero at both ends.
    curvature: Vec<f64>,
}

impl SmoothingSpline {
    /// Fit to sorted `x` with penalty `lambda` (0 interpolates the knot means).
    pub fn fit(x: &[f64], y: &[f64], lambda: f64) -> Result<Self, SmoothError> {
        if x.len() != y.len() {
            return Err(SmoothError::InvalidParameters(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        if !(lambda.is_finite() && lambda >= 0.0) {
            return Err(SmoothError::InvalidParameters(format!(
                "smoothing penalty must be non-negative, got {lambda}"
            )));
        }

        let (knots, ybar, weights) = collapse_ties(x, y);
        let n = knots.len();
        if n < 2 {
            return Err(SmoothError::TooFewDistinct { needed: 2, got: n });
        }

        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        let m = n - 2;

        // Q is n × m with column k touching rows k, k+1, k+2.
        let q = |row: usize, col: usize| -> f64 {
            match row.wrapping_sub(col) {
                0 => 1.0 / h[col],
                1 => -1.0 / h[col] - 1.0 / h[col + 1],
                2 => 1.0 / h[col + 1],
                _ => 0.0,
            }
        };

        // A = R + λ·Qᵀ W⁻¹ Q
        let mut system = PentaDiagonal::zeros(m);
        for k in 0..m {
            system.add(k, k, (h[k] + h[k + 1]) / 3.0);
            if k + 1 < m {
                system.add(k + 1, k, h[k + 1] / 6.0);
            }
        }
        for row in 0..n {
            let cols: Vec<usize> = (row.saturating_sub(2)..=row).filter(|&c| c < m).collect();
            for &a in &cols {
                for &b in cols.iter().filter(|&&b| b <= a) {
                    system.add(a, b, lambda * q(row, a) * q(row, b) / weights[row]);
                }
            }
        }

        let rhs: Vec<f64> = (0..m)
            .map(|k| (ybar[k + 2] - ybar[k + 1]) / h[k + 1] - (ybar[k + 1] - ybar[k]) / h[k])
            .collect();
        let gamma = system
            .solve(&rhs)
            .ok_or(SmoothError::Singular("smoothing spline"))?;

        // g = ȳ − λ W⁻¹ Q γ
        let values: Vec<f64> = (0..n)
            .map(|row| {
                let q_gamma: f64 = (row.saturating_sub(2)..=row)
                    .filter(|&c| c < m)
                    .map(|c| q(row, c) * gamma[c])
                    .sum();
                ybar[row] - lambda * q_gamma / weights[row]
            })
            .collect();

        let mut curvature = vec![0.0; n];
        curvature[1..n - 1].copy_from_slice(&gamma);

        Ok(SmoothingSpline {
            knots,
            values,
            curvature,
        })
    }

    /// Spline value at `t`, linear beyond the outer knots. NaN for a NaN query.
    pub fn value_at(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        let n = self.knots.len();
        let (x, g, gamma) = (&self.knots, &self.values, &self.curvature);

        if t <= x[0] {
            let h = x[1] - x[0];
            let slope = (g[1] - g[0]) / h - h * gamma[1] / 6.0;
            return g[0] - (x[0] - t) * slope;
        }
        if t >= x[n - 1] {
            let h = x[n - 1] - x[n - 2];
            let slope = (g[n - 1] - g[n - 2]) / h + h * gamma[n - 2] / 6.0;
            return g[n - 1] + (t - x[n - 1]) * slope;
        }

        let i = x.partition_point(|&k| k <= t) - 1;
        let h = x[i + 1] - x[i];
        let left = t - x[i];
        let right = x[i + 1] - t;
        let linear = (left * g[i + 1] + right * g[i]) / h;
        let bend = (1.0 + left / h) * gamma[i + 1] + (1.0 + right / h) * gamma[i];
        linear - left * right * bend / 6.0
    }

    /// Evaluate everywhere, extrapolating linearly beyond the knots.
    pub fn evaluate(&self, grid: &[f64]) -> Vec<Option<f64>> {
        grid.iter().map(|&t| Some(self.value_at(t))).collect()
    }
}
