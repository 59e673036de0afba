use ndarray::{Array1, Array2};

use crate::error::Result;

/// Capability contract for the opaque binary classifier behind the
/// pipeline. Any implementation satisfying `fit` and `predict_proba` is
/// substitutable; the pipeline never looks inside the model.
///
/// `Send + Sync` is required so a fitted pipeline can serve concurrent
/// explanation requests without locking.
pub trait ClassifierModel: Send + Sync {
    /// Train on feature matrix `x` and labels `y` (0 or 1, one per row).
    ///
    /// `positive_class_weight` scales the training loss of positive
    /// (minority) rows, substituting for resampling under class imbalance.
    fn fit(&mut self, x: &Array2<f64>, y: &[u8], positive_class_weight: f64) -> Result<()>;

    /// Probability of the positive class for each input row, in [0, 1].
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Human readable name for the model.
    fn name(&self) -> &str {
        "classifier"
    }
}
