//! Leakage-safe preprocessing: median imputation and standard scaling.
//!
//! Both transforms learn their statistics from training data only and apply
//! them unchanged to any later input, so test records can never influence
//! the fitted artifacts.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Per-feature median imputer for NaN-marked missing values.
#[derive(Clone, Debug)]
pub struct Imputer {
    pub medians: Vec<f64>,
}

/// Fit an `Imputer` from training data, one median per column computed over
/// the non-missing values. A column with no observed value at all is a
/// configuration error: there is nothing to impute from.
pub fn fit_imputer(x: &Array2<f64>, feature_names: &[String]) -> Result<Imputer> {
    let mut medians = Vec::with_capacity(x.ncols());
    for (c, col) in x.columns().into_iter().enumerate() {
        let mut observed: Vec<f64> = col.iter().copied().filter(|v| !v.is_nan()).collect();
        if observed.is_empty() {
            let name = feature_names
                .get(c)
                .map(String::as_str)
                .unwrap_or("<unnamed>");
            return Err(Error::Config(format!(
                "feature '{}' has no non-missing training values",
                name
            )));
        }
        observed.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = observed.len() / 2;
        let median = if observed.len() % 2 == 0 {
            (observed[mid - 1] + observed[mid]) / 2.0
        } else {
            observed[mid]
        };
        medians.push(median);
    }
    Ok(Imputer { medians })
}

impl Imputer {
    /// Replace every NaN cell with the stored training median; finite values
    /// pass through unchanged.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (c, &median) in self.medians.iter().enumerate() {
            for v in out.column_mut(c).iter_mut() {
                if v.is_nan() {
                    *v = median;
                }
            }
        }
        out
    }
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Fit a `Scaler` from an already-imputed matrix where rows are samples and
/// columns are features. Uses the population standard deviation.
pub fn fit_scaler(x: &Array2<f64>) -> Scaler {
    let (nrows, ncols) = x.dim();
    assert!(
        nrows > 0 && ncols > 0,
        "fit_scaler requires non-empty matrix"
    );

    let nrows_f = nrows as f64;
    let mut mean = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, &v) in row.iter().enumerate() {
            mean[c] += v;
        }
    }
    for v in mean.iter_mut() {
        *v /= nrows_f;
    }

    let mut std = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, &v) in row.iter().enumerate() {
            let d = v - mean[c];
            std[c] += d * d;
        }
    }
    for v in std.iter_mut() {
        *v = (*v / nrows_f).sqrt();
    }

    Scaler { mean, std }
}

impl Scaler {
    /// Transform all rows to `(value - mean) / std`. A constant column
    /// (zero std) maps to exactly 0.0 instead of dividing by zero.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let (nrows, ncols) = x.dim();
        let mut out = Vec::with_capacity(nrows * ncols);
        for row in x.rows() {
            for (c, &v) in row.iter().enumerate() {
                let z = if self.std[c] > 0.0 {
                    (v - self.mean[c]) / self.std[c]
                } else {
                    0.0
                };
                out.push(z);
            }
        }
        Array2::from_shape_vec((nrows, ncols), out).expect("transform: shape mismatch")
    }
}

/// Fit scaler and return the transformed matrix in one call.
pub fn fit_transform(x: &Array2<f64>) -> (Scaler, Array2<f64>) {
    let sc = fit_scaler(x);
    let z = sc.transform(x);
    (sc, z)
}
