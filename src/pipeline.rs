//! Fit/predict orchestration with strict train/test isolation.
//!
//! A `Pipeline` starts unfitted, is fitted exactly once on a training set,
//! and from then on applies the learned imputation medians, scaling
//! statistics and trained classifier to any input without ever recomputing
//! them. Prediction takes `&self`, so a fitted pipeline can be shared
//! across threads for concurrent scoring and explanation.

use ndarray::{Array1, Array2};

use crate::config::ModelConfig;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;
use crate::preprocessing::{fit_imputer, fit_scaler, Imputer, Scaler};

/// Probability threshold separating the predicted classes.
pub const DECISION_THRESHOLD: f64 = 0.5;

struct FittedState {
    imputer: Imputer,
    scaler: Scaler,
    model: Box<dyn ClassifierModel>,
    imbalance_weight: f64,
    feature_names: Vec<String>,
}

pub struct Pipeline {
    config: ModelConfig,
    /// Model injected in place of the factory-built default, if any.
    substitute: Option<Box<dyn ClassifierModel>>,
    fitted: Option<FittedState>,
}

impl Pipeline {
    pub fn new(config: ModelConfig) -> Self {
        Pipeline {
            config,
            substitute: None,
            fitted: None,
        }
    }

    /// Use a caller-supplied classifier instead of the configured default.
    /// Any implementation of the capability trait is substitutable.
    pub fn with_model(model: Box<dyn ClassifierModel>) -> Self {
        Pipeline {
            config: ModelConfig::default(),
            substitute: Some(model),
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn state(&self) -> Result<&FittedState> {
        self.fitted
            .as_ref()
            .ok_or(Error::State("pipeline is not fitted"))
    }

    /// Fit imputer, scaler and classifier on the training set, in that
    /// order, each stage consuming the previous stage's full output.
    ///
    /// The transition is irreversible: refitting an already-fitted pipeline
    /// is a state error, so learned artifacts can never drift after the
    /// initial training run.
    pub fn fit(&mut self, train: &Dataset) -> Result<()> {
        if self.fitted.is_some() {
            return Err(Error::State("pipeline is already fitted"));
        }

        let n_pos = train.count_label(1);
        let n_neg = train.count_label(0);
        if n_pos == 0 {
            return Err(Error::Config(
                "training set contains no positive examples".to_string(),
            ));
        }
        let imbalance_weight = n_neg as f64 / n_pos as f64;
        log::info!(
            "fitting on {} records ({} positive, {} negative), positive class weight {:.3}",
            train.n_records(),
            n_pos,
            n_neg,
            imbalance_weight
        );

        let imputer = fit_imputer(&train.x, &train.feature_names)?;
        let imputed = imputer.transform(&train.x);
        let scaler = fit_scaler(&imputed);
        let scaled = scaler.transform(&imputed);

        let mut model = match self.substitute.take() {
            Some(model) => model,
            None => build_model(self.config.clone()),
        };
        let labels = train.y.to_vec();
        model.fit(&scaled, &labels, imbalance_weight)?;
        log::debug!("trained {} classifier", model.name());

        self.fitted = Some(FittedState {
            imputer,
            scaler,
            model,
            imbalance_weight,
            feature_names: train.feature_names.clone(),
        });
        Ok(())
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<&FittedState> {
        let state = self.state()?;
        if x.ncols() != state.imputer.medians.len() {
            return Err(Error::Config(format!(
                "input has {} features but the pipeline was fitted on {}",
                x.ncols(),
                state.imputer.medians.len()
            )));
        }
        Ok(state)
    }

    /// Positive-class probability for each input row. The stored imputation
    /// and scaling artifacts are reused as-is; inference data never updates
    /// them.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let state = self.check_width(x)?;
        let imputed = state.imputer.transform(x);
        let scaled = state.scaler.transform(&imputed);
        state.model.predict_proba(&scaled)
    }

    /// Binary label per input row: 1 iff probability >= 0.5.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| u8::from(p >= DECISION_THRESHOLD)))
    }

    /// The negative/positive count ratio used to weight the positive class.
    pub fn imbalance_weight(&self) -> Result<f64> {
        Ok(self.state()?.imbalance_weight)
    }

    /// Training medians learned by the imputer, one per feature.
    pub fn medians(&self) -> Result<&[f64]> {
        Ok(&self.state()?.imputer.medians)
    }

    /// Training means learned by the scaler, one per feature.
    pub fn feature_means(&self) -> Result<&[f64]> {
        Ok(&self.state()?.scaler.mean)
    }

    /// Training standard deviations learned by the scaler, one per feature.
    pub fn feature_stds(&self) -> Result<&[f64]> {
        Ok(&self.state()?.scaler.std)
    }

    pub fn feature_names(&self) -> Result<&[String]> {
        Ok(&self.state()?.feature_names)
    }

    /// The probability capability handed to the explanation engine. The
    /// returned closure borrows the fitted pipeline and is `Sync`, so the
    /// engine may query it from parallel workers.
    pub fn probability_fn(&self) -> impl Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync + '_ {
        move |x: &Array2<f64>| self.predict_proba(x)
    }
}
