use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::error::{Error, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Gradient Boosting Decision Tree classifier.
///
/// Uses the log-likelihood loss, so `predict` on the underlying model
/// already yields positive-class probabilities. The imbalance-correction
/// weight is injected as a per-sample training weight on positive rows.
pub struct GbdtClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
}

impl GbdtClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GbdtClassifier {
            model: None,
            params,
        }
    }
}

impl ClassifierModel for GbdtClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8], positive_class_weight: f64) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::Config(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }

        let ModelType::Gbdt {
            max_depth,
            num_boost_round,
            debug,
            training_optimization_level,
        } = self.params.model_type;

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(max_depth);
        config.set_iterations(num_boost_round as usize);
        config.set_debug(debug);
        config.set_training_optimization_level(training_optimization_level);
        // Binary log-likelihood loss: labels are -1/+1, predictions are
        // logistic-transformed probabilities.
        config.set_loss("LogLikelyhood");

        let mut gbdt = GBDT::new(&config);

        let mut train_x = DataVec::with_capacity(x.nrows());
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let (target, weight) = if label == 1 {
                (1.0f32, positive_class_weight as f32)
            } else {
                (-1.0f32, 1.0f32)
            };
            train_x.push(Data::new_training_data(features, weight, target, None));
        }

        gbdt.fit(&mut train_x);
        self.model = Some(gbdt);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or(Error::State("predict_proba called before fit"))?;

        let mut test_x = DataVec::with_capacity(x.nrows());
        for row in x.rows() {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            test_x.push(Data::new_test_data(features, None));
        }

        let predictions = model.predict(&test_x);
        Ok(predictions
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect())
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}
