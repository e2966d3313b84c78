use nalgebra::DMatrix;

use super::SmoothError;

/// Least-squares projection weights for a window of `window` samples and a
/// polynomial of degree `order`.
///
/// Row `t` holds the weights that evaluate the fitted polynomial at window
/// position `t`; the centre row is the classic convolution kernel.
pub fn savgol_coefficients(window: usize, order: usize) -> Result<Vec<Vec<f64>>, SmoothError> {
    if window % 2 == 0 {
        return Err(SmoothError::InvalidParameters(format!(
            "window length must be odd, got {window}"
        )));
    }
    if order >= window {
        return Err(SmoothError::InvalidParameters(format!(
            "polynomial order {order} must be less than window length {window}"
        )));
    }

    let half = (window / 2) as f64;
    // Positions scaled to [-1, 1] keep the normal equations well conditioned.
    let u: Vec<f64> = (0..window)
        .map(|j| if half > 0.0 { (j as f64 - half) / half } else { 0.0 })
        .collect();
    let terms = order + 1;
    let vander = DMatrix::from_fn(window, terms, |j, k| u[j].powi(k as i32));

    // (VᵀV)⁻¹Vᵀ maps a window of samples to polynomial coefficients.
    let gram = vander.tr_mul(&vander);
    let projection = gram
        .lu()
        .solve(&vander.transpose())
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .ok_or(SmoothError::Singular("Savitzky-Golay kernel"))?;
    let fitted = &vander * projection;

    let hat: Vec<Vec<f64>> = fitted
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect();
    Ok(hat)
}

/// Savitzky-Golay smoothing of an index-spaced sequence.
///
/// Interior points use the centred kernel; the first and last `window / 2`
/// points are taken from the polynomial fitted to the first and last full
/// window.
pub fn savgol_filter(y: &[f64], window: usize, order: usize) -> Result<Vec<f64>, SmoothError> {
    let hat = savgol_coefficients(window, order)?;
    let n = y.len();
    if n < window {
        return Err(SmoothError::TooFewSamples {
            needed: window,
            got: n,
        });
    }

    let half = window / 2;
    let apply = |start: usize, position: usize| -> f64 {
        hat[position]
            .iter()
            .zip(&y[start..start + window])
            .map(|(w, v)| w * v)
            .sum()
    };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let value = if i < half {
            apply(0, i)
        } else if i >= n - half {
            apply(n - window, i - (n - window))
        } else {
            apply(i - half, half)
        };
        out.push(value);
    }
    Ok(out)
}
