mod common;

use clinrisk::config::{ExplainerConfig, ModelConfig};
use clinrisk::error::Result;
use clinrisk::explain::LimeExplainer;
use clinrisk::models::classifier_trait::ClassifierModel;
use clinrisk::pipeline::Pipeline;
use common::{generate_cohort, CohortSpec};
use ndarray::{Array1, Array2};

/// Deterministic substitute classifier: logistic in the scaled lactate and
/// wbc_count features, blind to the rest. Exercises the capability trait
/// boundary end to end.
struct LogisticStub {
    fitted: bool,
}

impl ClassifierModel for LogisticStub {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8], _positive_class_weight: f64) -> Result<()> {
        assert_eq!(x.nrows(), y.len());
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        assert!(self.fitted);
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let logit = 1.5 * row[0] + 1.0 * row[1];
                1.0 / (1.0 + (-logit).exp())
            })
            .collect())
    }

    fn name(&self) -> &str {
        "logistic-stub"
    }
}

fn explainer_for<'a>(
    pipeline: &'a Pipeline,
    config: ExplainerConfig,
) -> LimeExplainer<impl Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync + 'a> {
    LimeExplainer::new(
        pipeline.probability_fn(),
        pipeline.feature_names().unwrap().to_vec(),
        pipeline.feature_means().unwrap().to_vec(),
        pipeline.feature_stds().unwrap().to_vec(),
    )
    .unwrap()
    .with_config(config)
    .unwrap()
}

#[test]
fn high_lactate_and_wbc_drive_a_positive_explanation() {
    let cohort = generate_cohort(&CohortSpec::default());
    let (train, _) = cohort.stratified_split(0.3, 2).unwrap();

    let mut pipeline = Pipeline::with_model(Box::new(LogisticStub { fitted: false }));
    pipeline.fit(&train).unwrap();

    // A septic record: elevated lactate and white-cell count, high enough
    // to be predicted positive while keeping the neighborhood inside the
    // model's responsive region.
    let target = Array1::from_vec(vec![2.2, 12.0, 100.0, 38.2]);
    let row = target
        .clone()
        .into_shape((1, 4))
        .unwrap();
    assert_eq!(pipeline.predict(&row).unwrap()[0], 1);

    // A widened kernel keeps enough effective neighbors for a stable
    // surrogate around this off-center target.
    let explainer = explainer_for(
        &pipeline,
        ExplainerConfig {
            num_samples: 5000,
            kernel_width: Some(3.0),
            top_k: 10,
        },
    );
    let exp = explainer.explain(&target.view(), 4242).unwrap();

    assert!(!exp.low_confidence, "r_squared = {}", exp.r_squared);
    let top3: Vec<&str> = exp
        .feature_weights
        .iter()
        .take(3)
        .map(|fw| fw.feature.as_str())
        .collect();
    assert!(top3.contains(&"lactate"));
    assert!(top3.contains(&"wbc_count"));
    for fw in &exp.feature_weights {
        if fw.feature == "lactate" || fw.feature == "wbc_count" {
            assert!(
                fw.weight > 0.0,
                "{} should push toward sepsis, got {}",
                fw.feature,
                fw.weight
            );
        }
    }
}

#[test]
fn explanations_are_deterministic_under_a_fixed_seed() {
    let cohort = generate_cohort(&CohortSpec::default());
    let (train, test) = cohort.stratified_split(0.3, 11).unwrap();

    let mut pipeline = Pipeline::new(ModelConfig::default());
    pipeline.fit(&train).unwrap();

    let explainer = explainer_for(
        &pipeline,
        ExplainerConfig {
            num_samples: 1500,
            kernel_width: None,
            top_k: 4,
        },
    );

    let target = test.x.row(0);
    let first = explainer.explain(&target, 7).unwrap();
    let second = explainer.explain(&target, 7).unwrap();

    assert_eq!(first.intercept, second.intercept);
    assert_eq!(first.r_squared, second.r_squared);
    assert_eq!(first.prediction, second.prediction);
    assert_eq!(first.feature_weights.len(), second.feature_weights.len());
    for (a, b) in first
        .feature_weights
        .iter()
        .zip(second.feature_weights.iter())
    {
        assert_eq!(a.feature, b.feature);
        assert_eq!(a.weight, b.weight);
    }
}

#[test]
fn gbdt_pipeline_explanations_are_well_formed() {
    let cohort = generate_cohort(&CohortSpec {
        n_records: 800,
        prevalence: 0.1,
        missing_rate: 0.1,
        seed: 31,
    });
    let (train, _) = cohort.stratified_split(0.25, 13).unwrap();

    let mut pipeline = Pipeline::new(ModelConfig::default());
    pipeline.fit(&train).unwrap();

    let explainer = explainer_for(
        &pipeline,
        ExplainerConfig {
            num_samples: 2000,
            kernel_width: None,
            top_k: 3,
        },
    );

    let target = Array1::from_vec(vec![4.2, 19.0, 125.0, 39.2]);
    let exp = explainer.explain(&target.view(), 101).unwrap();

    assert!(exp.feature_weights.len() <= 3);
    assert!((0.0..=1.0).contains(&exp.prediction));
    assert!(exp.r_squared.is_finite());
    // Ranking is by absolute magnitude, descending.
    for pair in exp.feature_weights.windows(2) {
        assert!(pair[0].weight.abs() >= pair[1].weight.abs());
    }
}
