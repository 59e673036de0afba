use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

use clinrisk::config::{ExplainerConfig, ModelConfig};
use clinrisk::dataset::Dataset;
use clinrisk::explain::LimeExplainer;
use clinrisk::metrics::evaluate;
use clinrisk::pipeline::Pipeline;

const FEATURES: [&str; 4] = ["lactate", "wbc_count", "heart_rate", "temperature"];

/// Per-class (mean, std) for each feature; positives run hot and acidotic.
fn class_profile(positive: bool) -> [(f64, f64); 4] {
    if positive {
        [(3.5, 0.8), (17.0, 3.0), (118.0, 12.0), (38.9, 0.7)]
    } else {
        [(1.2, 0.4), (8.0, 2.0), (82.0, 10.0), (37.0, 0.5)]
    }
}

/// Synthetic sepsis cohort with configurable prevalence and missingness.
fn generate_cohort(n: usize, prevalence: f64, missing_rate: f64, seed: u64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_pos = ((n as f64) * prevalence).round() as usize;

    let mut data = Vec::with_capacity(n * FEATURES.len());
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let positive = i < n_pos;
        labels.push(u8::from(positive));
        for &(mean, std) in class_profile(positive).iter() {
            let value = Normal::new(mean, std)?.sample(&mut rng);
            if rng.gen::<f64>() < missing_rate {
                data.push(f64::NAN);
            } else {
                data.push(value);
            }
        }
    }

    let x = Array2::from_shape_vec((n, FEATURES.len()), data)?;
    let y = Array1::from_vec(labels);
    Ok(Dataset::new(
        FEATURES.iter().map(|s| s.to_string()).collect(),
        x,
        y,
    )?)
}

fn main() -> Result<()> {
    env_logger::init();

    // 5% prevalence, 15% of cells missing: the regime the pipeline is for.
    let cohort = generate_cohort(2000, 0.05, 0.15, 42)?;
    cohort.log_summary();

    let (train, test) = cohort.stratified_split(0.3, 7)?;

    let mut pipeline = Pipeline::new(ModelConfig::default());
    pipeline.fit(&train)?;

    let probs = pipeline.predict_proba(&test.x)?;
    let preds = pipeline.predict(&test.x)?;
    let report = evaluate(&test.y, &preds, &probs)?;
    println!("{}\n", report);

    // Explain the highest-scoring test record.
    let (best_idx, _) = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .expect("test set is non-empty");

    let explainer = LimeExplainer::new(
        pipeline.probability_fn(),
        pipeline.feature_names()?.to_vec(),
        pipeline.feature_means()?.to_vec(),
        pipeline.feature_stds()?.to_vec(),
    )?
    .with_config(ExplainerConfig::default())?;

    let explanation = explainer.explain(&test.x.row(best_idx), 1234)?;
    println!(
        "explaining test record {} (p = {:.3}, r_squared = {:.3}{})",
        best_idx,
        explanation.prediction,
        explanation.r_squared,
        if explanation.low_confidence {
            ", LOW CONFIDENCE"
        } else {
            ""
        }
    );
    for fw in &explanation.feature_weights {
        println!("  {:>12}  {:+.4}", fw.feature, fw.weight);
    }

    Ok(())
}
