use super::SmoothError;

/// Piecewise-linear interpolant through `(x, y)` knots.
///
/// Tied x values are collapsed to the mean of their y values. Queries
/// outside `[x_min, x_max]` have no value.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolator {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Interpolator {
    /// `x` must be sorted ascending and the same length as `y`.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, SmoothError> {
        if x.len() != y.len() {
            return Err(SmoothError::InvalidParameters(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        let (x, y, _) = collapse_ties(x, y);
        if x.len() < 2 {
            return Err(SmoothError::TooFewDistinct {
                needed: 2,
                got: x.len(),
            });
        }
        Ok(Interpolator { x, y })
    }

    pub fn value_at(&self, t: f64) -> Option<f64> {
        let n = self.x.len();
        if !(t >= self.x[0] && t <= self.x[n - 1]) {
            return None;
        }
        // First knot strictly greater than t; t sits in [x[i-1], x[i]).
        let i = self.x.partition_point(|&k| k <= t);
        if i == n {
            return Some(self.y[n - 1]);
        }
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        if t == x0 {
            return Some(y0);
        }
        Some(y0 + (t - x0) / (x1 - x0) * (y1 - y0))
    }

    pub fn evaluate(&self, grid: &[f64]) -> Vec<Option<f64>> {
        grid.iter().map(|&t| self.value_at(t)).collect()
    }
}

/// Merge runs of equal x into one knot: mean y, count as weight.
/// `x` must be sorted.
pub fn collapse_ties(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut xs: Vec<f64> = Vec::with_capacity(x.len());
    let mut ys: Vec<f64> = Vec::with_capacity(x.len());
    let mut ws: Vec<f64> = Vec::with_capacity(x.len());

    for (&xi, &yi) in x.iter().zip(y) {
        match xs.last() {
            Some(&last) if last == xi => {
                let k = ys.len() - 1;
                ys[k] += yi;
                ws[k] += 1.0;
            }
            _ => {
                xs.push(xi);
                ys.push(yi);
                ws.push(1.0);
            }
        }
    }
    for (sum, count) in ys.iter_mut().zip(&ws) {
        *sum /= count;
    }
    (xs, ys, ws)
}
