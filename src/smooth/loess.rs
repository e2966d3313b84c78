use nalgebra::{DMatrix, DVector};

use super::SmoothError;

/// Tuning constant for bisquare robustness weights, in units of the median
/// absolute residual.
const BISQUARE_C: f64 = 6.0;

/// Locally weighted polynomial regression with tricube weights.
///
/// `span` is the fraction of samples in each local neighbourhood; `degree`
/// is the local polynomial degree (0, 1 or 2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loess {
    pub span: f64,
    pub degree: usize,
    pub robust_iterations: usize,
}

impl Loess {
    pub fn new(span: f64, degree: usize, robust_iterations: usize) -> Self {
        Loess {
            span,
            degree,
            robust_iterations,
        }
    }

    /// Number of nearest neighbours used for `n` samples.
    pub fn neighbours(&self, n: usize) -> usize {
        let q = (n as f64 * self.span + 1e-5).floor() as usize;
        q.max(self.degree + 2).min(n)
    }

    /// Prepare a fit over sorted samples, running the robustness passes.
    pub fn fit(&self, x: &[f64], y: &[f64]) -> Result<LoessFit, SmoothError> {
        if !(self.span > 0.0 && self.span <= 1.0) {
            return Err(SmoothError::InvalidParameters(format!(
                "span must lie in (0, 1], got {}",
                self.span
            )));
        }
        if self.degree > 2 {
            return Err(SmoothError::InvalidParameters(format!(
                "local degree must be 0, 1 or 2, got {}",
                self.degree
            )));
        }
        if x.len() != y.len() {
            return Err(SmoothError::InvalidParameters(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        let n = x.len();
        let needed = self.degree + 2;
        if n < needed {
            return Err(SmoothError::TooFewSamples { needed, got: n });
        }
        let distinct = 1 + x.windows(2).filter(|w| w[1] != w[0]).count();
        if distinct < self.degree + 1 {
            return Err(SmoothError::TooFewDistinct {
                needed: self.degree + 1,
                got: distinct,
            });
        }

        let mut fit = LoessFit {
            x: x.to_vec(),
            y: y.to_vec(),
            robustness: vec![1.0; n],
            neighbours: self.neighbours(n),
            degree: self.degree,
        };
        log::debug!(
            "LOESS: span {:.4}, {} of {n} samples per neighbourhood, degree {}",
            self.span,
            fit.neighbours,
            self.degree
        );

        for pass in 0..self.robust_iterations {
            let residuals: Vec<f64> = (0..n)
                .map(|i| fit.value_at(x[i]).map_or(0.0, |v| y[i] - v))
                .collect();
            let scale = residual_scale(&residuals);
            if scale <= f64::EPSILON {
                log::debug!("LOESS: residuals vanished after {pass} robustness passes");
                break;
            }
            fit.robustness = residuals
                .iter()
                .map(|r| bisquare(r / (BISQUARE_C * scale)))
                .collect();
        }
        Ok(fit)
    }
}

/// A prepared LOESS smoother that can be evaluated at arbitrary positions.
#[derive(Debug, Clone, PartialEq)]
pub struct LoessFit {
    x: Vec<f64>,
    y: Vec<f64>,
    robustness: Vec<f64>,
    neighbours: usize,
    degree: usize,
}

impl LoessFit {
    /// Local fit at `t`. `None` outside the sample range or when no
    /// neighbour carries weight.
    pub fn value_at(&self, t: f64) -> Option<f64> {
        let n = self.x.len();
        if !(t >= self.x[0] && t <= self.x[n - 1]) {
            return None;
        }

        let (lo, hi) = self.nearest(t);
        let radius = (t - self.x[lo]).max(self.x[hi - 1] - t);

        if radius <= 0.0 {
            // Every neighbour sits exactly at t.
            let (sum, total) = (lo..hi).fold((0.0, 0.0), |(s, w), i| {
                (s + self.robustness[i] * self.y[i], w + self.robustness[i])
            });
            return (total > 0.0).then(|| sum / total);
        }

        let mut local: Vec<(f64, f64, f64)> = Vec::with_capacity(hi - lo);
        let mut support = 0;
        let mut last_x = f64::NAN;
        for i in lo..hi {
            let z = (self.x[i] - t) / radius;
            let w = tricube(z.abs()) * self.robustness[i];
            if w <= 0.0 {
                continue;
            }
            if self.x[i] != last_x {
                support += 1;
                last_x = self.x[i];
            }
            local.push((z, w, self.y[i]));
        }
        if support == 0 {
            return None;
        }

        // Fall back to a lower degree when too few distinct positions carry weight.
        let terms = (self.degree + 1).min(support);
        let design = DMatrix::from_fn(local.len(), terms, |i, k| {
            let (z, w, _) = local[i];
            w.sqrt() * z.powi(k as i32)
        });
        let target = DVector::from_iterator(local.len(), local.iter().map(|&(_, w, y)| w.sqrt() * y));
        let beta = design.tr_mul(&design).lu().solve(&design.tr_mul(&target))?;
        beta.iter().all(|b| b.is_finite()).then(|| beta[0])
    }

    pub fn evaluate(&self, grid: &[f64]) -> Vec<Option<f64>> {
        grid.iter().map(|&t| self.value_at(t)).collect()
    }

    /// Half-open index range of the `neighbours` samples closest to `t`.
    fn nearest(&self, t: f64) -> (usize, usize) {
        let n = self.x.len();
        let mut lo = self.x.partition_point(|&v| v < t);
        let mut hi = lo;
        while hi - lo < self.neighbours {
            let take_left = match (lo > 0, hi < n) {
                (true, true) => t - self.x[lo - 1] <= self.x[hi] - t,
                (true, false) => true,
                (false, true) => false,
                (false, false) => break,
            };
            if take_left {
                lo -= 1;
            } else {
                hi += 1;
            }
        }
        (lo, hi)
    }
}

/// Tricube kernel, cut off at 0.999 of the radius.
fn tricube(r: f64) -> f64 {
    if r >= 0.999 {
        0.0
    } else {
        let c = 1.0 - r * r * r;
        c * c * c
    }
}

fn bisquare(u: f64) -> f64 {
    let u = u.abs();
    if u >= 1.0 {
        0.0
    } else {
        let c = 1.0 - u * u;
        c * c
    }
}

/// Median absolute residual, or the mean absolute residual when more than
/// half the residuals vanish.
fn residual_scale(residuals: &[f64]) -> f64 {
    let median = median_abs(residuals);
    let mean = residuals.iter().map(|r| r.abs()).sum::<f64>() / residuals.len().max(1) as f64;
    if median <= 1e-7 * mean {
        mean
    } else {
        median
    }
}

fn median_abs(values: &[f64]) -> f64 {
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    if abs.is_empty() {
        return 0.0;
    }
    abs.sort_by(f64::total_cmp);
    let mid = abs.len() / 2;
    if abs.len() % 2 == 0 {
        0.5 * (abs[mid - 1] + abs[mid])
    } else {
        abs[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.1 + if i % 4 == 1 { 0.03 } else { 0.0 }).collect()
    }

    #[test]
    fn test_neighbour_count() {
        let l = Loess::new(0.25, 2, 0);
        assert_eq!(l.neighbours(100), 25);
        assert_eq!(l.neighbours(8), 4);
        assert_eq!(Loess::new(1.0, 1, 0).neighbours(7), 7);
    }

    #[test]
    fn test_reproduces_quadratic_inside_range() {
        let x = grid(50);
        let y: Vec<f64> = x.iter().map(|t| 0.2 + 0.1 * t - 0.03 * t * t).collect();
        let fit = Loess::new(0.2, 2, 0).fit(&x, &y).unwrap();
        for t in [0.0, 0.55, 1.7, 3.333, 4.9] {
            assert_abs_diff_eq!(fit.value_at(t).unwrap(), 0.2 + 0.1 * t - 0.03 * t * t, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_local_linear_reproduces_line() {
        let x = grid(30);
        let y: Vec<f64> = x.iter().map(|t| 1.0 - 0.4 * t).collect();
        let fit = Loess::new(0.3, 1, 0).fit(&x, &y).unwrap();
        assert_abs_diff_eq!(fit.value_at(1.234).unwrap(), 1.0 - 0.4 * 1.234, epsilon = 1e-9);
    }

    #[test]
    fn test_no_value_outside_samples() {
        let x = grid(20);
        let y = vec![0.5; 20];
        let fit = Loess::new(0.5, 2, 0).fit(&x, &y).unwrap();
        assert!(fit.value_at(-0.01).is_none());
        assert!(fit.value_at(x[19] + 0.01).is_none());
        assert_abs_diff_eq!(fit.value_at(x[19]).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_robustness_damps_a_spike() {
        let x = grid(40);
        let mut y: Vec<f64> = x.iter().map(|t| 0.5 + 0.05 * t).collect();
        y[20] = 3.0;
        let plain = Loess::new(0.3, 1, 0).fit(&x, &y).unwrap();
        let robust = Loess::new(0.3, 1, 3).fit(&x, &y).unwrap();
        let truth = 0.5 + 0.05 * x[21];
        let plain_err = (plain.value_at(x[21]).unwrap() - truth).abs();
        let robust_err = (robust.value_at(x[21]).unwrap() - truth).abs();
        assert!(robust_err < plain_err);
        assert!(robust_err < 1e-6);
    }

    #[test]
    fn test_tied_positions_are_accepted() {
        let x = vec![0.0, 0.1, 0.1, 0.2, 0.3, 0.3, 0.4, 0.5];
        let y = vec![0.1, 0.2, 0.4, 0.3, 0.5, 0.5, 0.6, 0.7];
        let fit = Loess::new(0.8, 2, 0).fit(&x, &y).unwrap();
        // Only 0.2 and 0.3 carry weight at 0.25, so the fit drops to a line.
        assert_abs_diff_eq!(fit.value_at(0.25).unwrap(), 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_parameter_and_size_errors() {
        let x = grid(10);
        let y = vec![0.0; 10];
        assert!(matches!(
            Loess::new(0.0, 2, 0).fit(&x, &y),
            Err(SmoothError::InvalidParameters(_))
        ));
        assert!(matches!(
            Loess::new(1.5, 2, 0).fit(&x, &y),
            Err(SmoothError::InvalidParameters(_))
        ));
        assert_eq!(
            Loess::new(0.5, 2, 0).fit(&x[..3], &y[..3]).unwrap_err(),
            SmoothError::TooFewSamples { needed: 4, got: 3 }
        );
        assert_eq!(
            Loess::new(0.5, 2, 0).fit(&[1.0; 5], &[0.0; 5]).unwrap_err(),
            SmoothError::TooFewDistinct { needed: 3, got: 1 }
        );
    }
}
