//! Local, model-agnostic explanation of single predictions.
//!
//! The engine approximates the global model around one instance with a
//! weighted linear surrogate: draw synthetic neighbors from the training
//! feature distribution, query the black-box probability for each, weight
//! neighbors by proximity to the target with an exponential kernel, and fit
//! a ridge regression of the probabilities on standardized features. The
//! coefficients are the signed per-feature contributions; the weighted R²
//! of the fit is reported as a trust signal.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::Normal;

use crate::config::ExplainerConfig;
use crate::error::{Error, Result};

/// Ridge strength for the surrogate's normal equations. Keeps the system
/// positive definite even when the kernel concentrates weight on few
/// neighbors.
const RIDGE: f64 = 1e-4;

/// Weighted output variance below this marks a degenerate neighborhood.
const MIN_OUTPUT_VARIANCE: f64 = 1e-6;

/// Surrogate R² below this marks the explanation low-confidence.
const MIN_TRUSTED_R2: f64 = 0.25;

/// One signed feature contribution.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub weight: f64,
}

/// Explanation of one prediction: top features ranked by absolute
/// contribution, the surrogate intercept and its local fit quality.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// Per-feature signed weights, ordered by |weight| descending.
    pub feature_weights: Vec<FeatureWeight>,
    pub intercept: f64,
    /// Weighted R² of the local surrogate; low values mean the linear
    /// approximation is unreliable for this instance.
    pub r_squared: f64,
    /// Black-box positive-class probability for the target itself.
    pub prediction: f64,
    /// Set when the neighborhood outcomes lack variance or the surrogate
    /// fit quality is poor. The explanation is still returned.
    pub low_confidence: bool,
}

/// Local surrogate explainer over an opaque probability function.
///
/// `means` and `stds` are the training statistics of the fitted pipeline's
/// scaler; they define both the sampling distribution and the standardized
/// space in which proximity is measured.
pub struct LimeExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    predict_fn: F,
    feature_names: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
    config: ExplainerConfig,
}

impl<F> LimeExplainer<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    pub fn new(
        predict_fn: F,
        feature_names: Vec<String>,
        means: Vec<f64>,
        stds: Vec<f64>,
    ) -> Result<Self> {
        if feature_names.is_empty() {
            return Err(Error::Config("explainer needs at least one feature".into()));
        }
        if means.len() != feature_names.len() || stds.len() != feature_names.len() {
            return Err(Error::Config(format!(
                "feature statistics length mismatch: {} names, {} means, {} stds",
                feature_names.len(),
                means.len(),
                stds.len()
            )));
        }
        Ok(Self {
            predict_fn,
            feature_names,
            means,
            stds,
            config: ExplainerConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ExplainerConfig) -> Result<Self> {
        if config.num_samples == 0 {
            return Err(Error::Config("num_samples must be positive".into()));
        }
        if config.top_k == 0 {
            return Err(Error::Config("top_k must be positive".into()));
        }
        if let Some(width) = config.kernel_width {
            if !width.is_finite() || width <= 0.0 {
                return Err(Error::Config(format!(
                    "kernel_width must be finite and positive, got {}",
                    width
                )));
            }
        }
        self.config = config;
        Ok(self)
    }

    /// Explain one instance. Identical target, pipeline and seed yield an
    /// identical explanation: a single RNG stream drives all sampling and
    /// the parallel model queries are gathered in submission order.
    pub fn explain(&self, target: &ArrayView1<f64>, seed: u64) -> Result<Explanation> {
        let d = self.feature_names.len();
        if target.len() != d {
            return Err(Error::Config(format!(
                "target has {} features but the explainer was built for {}",
                target.len(),
                d
            )));
        }

        // Missing target cells fall back to the training mean. The filled
        // target is row 0 of the neighborhood, so sampling, distance and
        // the reported prediction all see the mean-filled value.
        let target_filled: Vec<f64> = target
            .iter()
            .enumerate()
            .map(|(j, &v)| if v.is_nan() { self.means[j] } else { v })
            .collect();

        let samples = self.sample_neighbors(&target_filled, seed)?;
        let probs = self.query_model(&samples)?;

        let z = self.standardize(&samples);
        let weights = self.proximity_weights(&z);

        let (variance_ok, _) = weighted_moments(&probs, &weights);
        if !variance_ok {
            log::warn!(
                "degenerate neighborhood: black-box outcomes have near-zero variance, \
                 explanation will be low-confidence"
            );
        }

        let (beta, r_squared) = fit_weighted_ridge(&z, &probs, &weights)?;

        let mut feature_weights: Vec<FeatureWeight> = self
            .feature_names
            .iter()
            .zip(beta.iter().skip(1))
            .map(|(name, &w)| FeatureWeight {
                feature: name.clone(),
                weight: w,
            })
            .collect();
        feature_weights.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        feature_weights.truncate(self.config.top_k.min(d));

        let low_confidence = !variance_ok || r_squared < MIN_TRUSTED_R2;
        if low_confidence {
            log::warn!(
                "low-confidence explanation (r_squared = {:.3})",
                r_squared
            );
        }

        Ok(Explanation {
            feature_weights,
            intercept: beta[0],
            r_squared,
            prediction: probs[0],
            low_confidence,
        })
    }

    /// Draw the synthetic neighborhood. Row 0 is the target itself; every
    /// other row samples each feature independently from a Gaussian with
    /// the training mean and std, so the neighborhood spans realistic
    /// feature ranges rather than local noise only.
    fn sample_neighbors(&self, target_filled: &[f64], seed: u64) -> Result<Array2<f64>> {
        let d = target_filled.len();
        let n = self.config.num_samples + 1;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut dists: Vec<Option<Normal>> = Vec::with_capacity(d);
        for j in 0..d {
            if self.stds[j] > 0.0 {
                let dist = Normal::new(self.means[j], self.stds[j])
                    .map_err(|e| Error::Config(format!("feature '{}': {}", self.feature_names[j], e)))?;
                dists.push(Some(dist));
            } else {
                dists.push(None);
            }
        }

        let mut data = Vec::with_capacity(n * d);
        data.extend_from_slice(target_filled);
        for _ in 1..n {
            for (j, dist) in dists.iter().enumerate() {
                match dist {
                    Some(normal) => data.push(normal.sample(&mut rng)),
                    // constant features sample to their mean
                    None => data.push(self.means[j]),
                }
            }
        }
        Array2::from_shape_vec((n, d), data).map_err(|e| Error::Config(e.to_string()))
    }

    /// Query the black-box probability function over the neighborhood,
    /// fanning row chunks out across the rayon pool and gathering results
    /// in order. This is the only place the model is consulted.
    fn query_model(&self, samples: &Array2<f64>) -> Result<Array1<f64>> {
        let n = samples.nrows();
        let chunk_rows = (n / rayon::current_num_threads().max(1)).max(64);
        let chunks: Vec<Array2<f64>> = samples
            .axis_chunks_iter(Axis(0), chunk_rows)
            .map(|view| view.to_owned())
            .collect();

        let results: Vec<Array1<f64>> = chunks
            .par_iter()
            .map(|chunk| (self.predict_fn)(chunk))
            .collect::<Result<Vec<_>>>()?;

        let mut probs = Vec::with_capacity(n);
        for part in results {
            probs.extend(part.iter().copied());
        }
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(Error::Classifier(
                "model returned a non-finite probability".to_string(),
            ));
        }
        Ok(Array1::from_vec(probs))
    }

    fn standardize(&self, samples: &Array2<f64>) -> Array2<f64> {
        let (n, d) = samples.dim();
        let mut z = samples.clone();
        for j in 0..d {
            let mean = self.means[j];
            let std = self.stds[j];
            for i in 0..n {
                z[(i, j)] = if std > 0.0 { (z[(i, j)] - mean) / std } else { 0.0 };
            }
        }
        z
    }

    /// Exponential kernel over Euclidean distance to the target (row 0) in
    /// standardized space.
    fn proximity_weights(&self, z: &Array2<f64>) -> Array1<f64> {
        let d = z.ncols();
        let width = self
            .config
            .kernel_width
            .unwrap_or_else(|| 0.75 * (d as f64).sqrt());
        let target = z.row(0).to_owned();
        let width_sq = width * width;
        z.rows()
            .into_iter()
            .map(|row| {
                let dist_sq: f64 = row
                    .iter()
                    .zip(target.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (-dist_sq / width_sq).exp()
            })
            .collect()
    }
}

/// Weighted mean and a flag for whether the weighted variance clears the
/// degeneracy floor.
fn weighted_moments(values: &Array1<f64>, weights: &Array1<f64>) -> (bool, f64) {
    let w_sum: f64 = weights.sum();
    let mean = values
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / w_sum;
    let variance = values
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum::<f64>()
        / w_sum;
    (variance >= MIN_OUTPUT_VARIANCE, mean)
}

/// Weighted ridge regression of `y` on `z` with an intercept column.
/// Returns the coefficient vector (intercept first) and the weighted R².
fn fit_weighted_ridge(
    z: &Array2<f64>,
    y: &Array1<f64>,
    weights: &Array1<f64>,
) -> Result<(Array1<f64>, f64)> {
    let (n, d) = z.dim();
    let p = d + 1;

    // Normal equations: (Phi^T W Phi + ridge * I) beta = Phi^T W y,
    // with Phi = [1 | z].
    let mut a = Array2::<f64>::zeros((p, p));
    let mut b = Array1::<f64>::zeros(p);
    for i in 0..n {
        let w = weights[i];
        let yi = y[i];
        let mut phi = Vec::with_capacity(p);
        phi.push(1.0);
        phi.extend(z.row(i).iter().copied());
        for r in 0..p {
            let wr = w * phi[r];
            b[r] += wr * yi;
            for c in r..p {
                a[(r, c)] += wr * phi[c];
            }
        }
    }
    for r in 0..p {
        for c in 0..r {
            a[(r, c)] = a[(c, r)];
        }
        a[(r, r)] += RIDGE;
    }

    let beta = solve_linear_system(a, b)?;

    // Weighted R² against the black-box outputs.
    let w_sum: f64 = weights.sum();
    let y_mean: f64 = y
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / w_sum;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for i in 0..n {
        let mut fitted = beta[0];
        for (j, &zij) in z.row(i).iter().enumerate() {
            fitted += beta[j + 1] * zij;
        }
        ss_res += weights[i] * (y[i] - fitted) * (y[i] - fitted);
        ss_tot += weights[i] * (y[i] - y_mean) * (y[i] - y_mean);
    }
    let r_squared = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).max(0.0)
    } else {
        0.0
    };

    Ok((beta, r_squared))
}

/// Gaussian elimination with partial pivoting. The ridge term keeps the
/// system positive definite, so a vanishing pivot only occurs on corrupted
/// input.
fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let p = b.len();
    for col in 0..p {
        let mut pivot_row = col;
        for r in (col + 1)..p {
            if a[(r, col)].abs() > a[(pivot_row, col)].abs() {
                pivot_row = r;
            }
        }
        if a[(pivot_row, col)].abs() < 1e-12 {
            return Err(Error::Config(
                "local surrogate system is singular".to_string(),
            ));
        }
        if pivot_row != col {
            for c in 0..p {
                let tmp = a[(col, c)];
                a[(col, c)] = a[(pivot_row, c)];
                a[(pivot_row, c)] = tmp;
            }
            b.swap(col, pivot_row);
        }
        for r in (col + 1)..p {
            let factor = a[(r, col)] / a[(col, col)];
            if factor == 0.0 {
                continue;
            }
            for c in col..p {
                a[(r, c)] -= factor * a[(col, c)];
            }
            b[r] -= factor * b[col];
        }
    }
    let mut x = Array1::<f64>::zeros(p);
    for col in (0..p).rev() {
        let mut acc = b[col];
        for c in (col + 1)..p {
            acc -= a[(col, c)] * x[c];
        }
        x[col] = acc / a[(col, col)];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Linear-in-standardized-features mock model: recoverable exactly by
    /// the surrogate.
    fn linear_model(
        means: Vec<f64>,
        stds: Vec<f64>,
        coefs: Vec<f64>,
        intercept: f64,
    ) -> impl Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync {
        move |x: &Array2<f64>| {
            let preds: Array1<f64> = x
                .rows()
                .into_iter()
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .map(|(j, &v)| coefs[j] * (v - means[j]) / stds[j])
                        .sum::<f64>()
                        + intercept
                })
                .collect();
            Ok(preds)
        }
    }

    fn small_config() -> ExplainerConfig {
        ExplainerConfig {
            num_samples: 800,
            kernel_width: None,
            top_k: 10,
        }
    }

    #[test]
    fn surrogate_recovers_linear_model() {
        let means = vec![2.0, 50.0, -1.0];
        let stds = vec![0.5, 10.0, 2.0];
        let model = linear_model(means.clone(), stds.clone(), vec![0.4, -0.1, 0.02], 0.5);
        let explainer = LimeExplainer::new(
            model,
            vec!["lactate".into(), "hr".into(), "base_excess".into()],
            means,
            stds,
        )
        .unwrap()
        .with_config(small_config())
        .unwrap();

        let target = array![2.6, 55.0, -0.5];
        let exp = explainer.explain(&target.view(), 11).unwrap();

        assert!(!exp.low_confidence);
        assert!(exp.r_squared > 0.99);
        assert_relative_eq!(exp.intercept, 0.5, epsilon = 0.02);
        // Ranking follows coefficient magnitude.
        assert_eq!(exp.feature_weights[0].feature, "lactate");
        assert_eq!(exp.feature_weights[1].feature, "hr");
        assert_relative_eq!(exp.feature_weights[0].weight, 0.4, epsilon = 0.02);
        assert_relative_eq!(exp.feature_weights[1].weight, -0.1, epsilon = 0.02);
    }

    #[test]
    fn explanation_is_deterministic_for_a_fixed_seed() {
        let means = vec![0.0, 0.0];
        let stds = vec![1.0, 1.0];
        let model = linear_model(means.clone(), stds.clone(), vec![1.0, -2.0], 0.0);
        let explainer = LimeExplainer::new(
            model,
            vec!["a".into(), "b".into()],
            means,
            stds,
        )
        .unwrap()
        .with_config(small_config())
        .unwrap();

        let target = array![0.3, -0.7];
        let first = explainer.explain(&target.view(), 99).unwrap();
        let second = explainer.explain(&target.view(), 99).unwrap();

        assert_eq!(first.intercept, second.intercept);
        assert_eq!(first.r_squared, second.r_squared);
        for (a, b) in first.feature_weights.iter().zip(second.feature_weights.iter()) {
            assert_eq!(a.feature, b.feature);
            assert_eq!(a.weight, b.weight);
        }
    }

    #[test]
    fn constant_model_yields_low_confidence() {
        let model = |x: &Array2<f64>| Ok(Array1::from_elem(x.nrows(), 0.8));
        let explainer = LimeExplainer::new(
            model,
            vec!["a".into(), "b".into()],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        )
        .unwrap()
        .with_config(small_config())
        .unwrap();

        let exp = explainer.explain(&array![0.0, 0.0].view(), 5).unwrap();
        assert!(exp.low_confidence);
        for fw in &exp.feature_weights {
            assert!(fw.weight.abs() < 1e-3);
        }
    }

    #[test]
    fn top_k_truncates_the_ranking() {
        let means = vec![0.0; 5];
        let stds = vec![1.0; 5];
        let model = linear_model(
            means.clone(),
            stds.clone(),
            vec![0.5, 0.4, 0.3, 0.2, 0.1],
            0.0,
        );
        let explainer = LimeExplainer::new(
            model,
            (0..5).map(|i| format!("f{}", i)).collect(),
            means,
            stds,
        )
        .unwrap()
        .with_config(ExplainerConfig {
            num_samples: 800,
            kernel_width: None,
            top_k: 3,
        })
        .unwrap();

        let exp = explainer
            .explain(&Array1::zeros(5).view(), 3)
            .unwrap();
        assert_eq!(exp.feature_weights.len(), 3);
        assert_eq!(exp.feature_weights[0].feature, "f0");
    }

    #[test]
    fn missing_target_values_fall_back_to_the_mean() {
        let means = vec![1.0, 2.0];
        let stds = vec![1.0, 1.0];
        let model = linear_model(means.clone(), stds.clone(), vec![0.3, 0.3], 0.5);
        let explainer = LimeExplainer::new(
            model,
            vec!["a".into(), "b".into()],
            means,
            stds,
        )
        .unwrap()
        .with_config(small_config())
        .unwrap();

        let with_nan = explainer
            .explain(&array![f64::NAN, 2.0].view(), 7)
            .unwrap();
        let with_mean = explainer.explain(&array![1.0, 2.0].view(), 7).unwrap();
        assert_eq!(with_nan.prediction, with_mean.prediction);
    }

    #[test]
    fn invalid_config_values_are_rejected() {
        let build = |config: ExplainerConfig| {
            let model = |x: &Array2<f64>| Ok(Array1::from_elem(x.nrows(), 0.5));
            LimeExplainer::new(model, vec!["a".into()], vec![0.0], vec![1.0])
                .unwrap()
                .with_config(config)
        };

        for bad_width in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let result = build(ExplainerConfig {
                num_samples: 100,
                kernel_width: Some(bad_width),
                top_k: 1,
            });
            assert!(
                matches!(result, Err(Error::Config(_))),
                "width {} should be rejected",
                bad_width
            );
        }
        assert!(matches!(
            build(ExplainerConfig {
                num_samples: 0,
                kernel_width: None,
                top_k: 1,
            }),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            build(ExplainerConfig {
                num_samples: 100,
                kernel_width: None,
                top_k: 0,
            }),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn classifier_failure_propagates() {
        let model = |_: &Array2<f64>| -> Result<Array1<f64>> {
            Err(Error::Classifier("boom".to_string()))
        };
        let explainer = LimeExplainer::new(
            model,
            vec!["a".into()],
            vec![0.0],
            vec![1.0],
        )
        .unwrap();
        let err = explainer.explain(&array![0.0].view(), 1).unwrap_err();
        assert!(matches!(err, Error::Classifier(_)));
    }

    #[test]
    fn solver_handles_a_known_system() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let b = array![1.0, 2.0];
        let x = solve_linear_system(a, b).unwrap();
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-12);
    }
}
