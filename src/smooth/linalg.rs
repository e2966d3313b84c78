//! Banded solver for the smoothing spline's penalised system.

/// Symmetric positive-definite matrix with two sub-diagonals, stored by
/// diagonal: `diag[i] = A[i][i]`, `off1[i] = A[i+1][i]`, `off2[i] = A[i+2][i]`.
#[derive(Debug, Clone, Default)]
pub struct PentaDiagonal {
    pub diag: Vec<f64>,
    pub off1: Vec<f64>,
    pub off2: Vec<f64>,
}

impl PentaDiagonal {
    pub fn zeros(n: usize) -> Self {
        PentaDiagonal {
            diag: vec![0.0; n],
            off1: vec![0.0; n.saturating_sub(1)],
            off2: vec![0.0; n.saturating_sub(2)],
        }
    }

    pub fn len(&self) -> usize {
        self.diag.len()
    }

    /// Add `value` at `(row, col)` with `|row - col| <= 2`; the symmetric
    /// entry is implied.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        let (i, j) = if row >= col { (row, col) } else { (col, row) };
        match i - j {
            0 => self.diag[j] += value,
            1 => self.off1[j] += value,
            2 => self.off2[j] += value,
            _ => debug_assert!(false, "entry ({row}, {col}) outside the band"),
        }
    }

    /// Solve by banded `L·D·Lᵀ` factorisation. `None` if a pivot is not
    /// positive.
    pub fn solve(&self, b: &[f64]) -> Option<Vec<f64>> {
        let n = self.len();
        debug_assert_eq!(b.len(), n);
        if n == 0 {
            return Some(Vec::new());
        }

        let mut d = vec![0.0; n];
        let mut l1 = vec![0.0; n]; // L[i+1][i]
        let mut l2 = vec![0.0; n]; // L[i+2][i]

        for i in 0..n {
            let mut di = self.diag[i];
            if i >= 1 {
                di -= l1[i - 1] * l1[i - 1] * d[i - 1];
            }
            if i >= 2 {
                di -= l2[i - 2] * l2[i - 2] * d[i - 2];
            }
            if !(di > 0.0 && di.is_finite()) {
                return None;
            }
            d[i] = di;

            if i + 1 < n {
                let mut a1 = self.off1[i];
                if i >= 1 {
                    a1 -= l2[i - 1] * l1[i - 1] * d[i - 1];
                }
                l1[i] = a1 / di;
            }
            if i + 2 < n {
                l2[i] = self.off2[i] / di;
            }
        }

        // Forward substitution with L, then D, then back substitution with Lᵀ.
        let mut z = b.to_vec();
        for i in 0..n {
            let mut zi = z[i];
            if i >= 1 {
                zi -= l1[i - 1] * z[i - 1];
            }
            if i >= 2 {
                zi -= l2[i - 2] * z[i - 2];
            }
            z[i] = zi;
        }
        for (zi, di) in z.iter_mut().zip(&d) {
            *zi /= di;
        }
        for i in (0..n).rev() {
            let mut zi = z[i];
            if i + 1 < n {
                zi -= l1[i] * z[i + 1];
            }
            if i + 2 < n {
                zi -= l2[i] * z[i + 2];
            }
            z[i] = zi;
        }
        Some(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn test_penta_diagonal_matches_dense() {
        let n = 6;
        let mut band = PentaDiagonal::zeros(n);
        let mut dense = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            band.add(i, i, 6.0 + i as f64);
            dense[(i, i)] = 6.0 + i as f64;
            if i + 1 < n {
                band.add(i + 1, i, -2.0);
                dense[(i + 1, i)] = -2.0;
                dense[(i, i + 1)] = -2.0;
            }
            if i + 2 < n {
                band.add(i, i + 2, 0.5);
                dense[(i + 2, i)] = 0.5;
                dense[(i, i + 2)] = 0.5;
            }
        }
        let b: Vec<f64> = (0..n).map(|i| (i as f64).sin() + 1.0).collect();

        let banded = band.solve(&b).unwrap();
        let reference = dense.lu().solve(&DVector::from_vec(b)).unwrap();
        for (u, v) in banded.iter().zip(&reference) {
            assert_abs_diff_eq!(*u, *v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_penta_diagonal_rejects_indefinite() {
        let mut band = PentaDiagonal::zeros(2);
        band.add(0, 0, 1.0);
        band.add(1, 1, 1.0);
        band.add(1, 0, 2.0);
        assert!(band.solve(&[1.0, 1.0]).is_none());
    }
}
