use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Central configuration for classifier models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum ModelType {
    Gbdt {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Gbdt {
            max_depth: 4,
            num_boost_round: 50,
            debug: false,
            training_optimization_level: 2,
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Tuning knobs for the local explanation engine.
///
/// `kernel_width` is expressed in standardized feature space; when `None`
/// the engine falls back to `0.75 * sqrt(n_features)`, which keeps the
/// effective neighborhood size stable as dimensionality grows. `num_samples`
/// bounds both explanation latency and surrogate stability.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExplainerConfig {
    /// Number of synthetic neighbors drawn around the target instance.
    pub num_samples: usize,
    /// Exponential kernel width, finite and strictly positive; `None`
    /// selects the dimension-based default.
    pub kernel_width: Option<f64>,
    /// Number of top-ranked features retained in the explanation.
    pub top_k: usize,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            num_samples: 5000,
            kernel_width: None,
            top_k: 10,
        }
    }
}
