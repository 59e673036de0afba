//! Synthetic sepsis cohort generator shared by the integration tests.
//!
//! Plays the role of the external data source: a labeled tabular dataset
//! with configurable class prevalence and missingness. Positive records
//! draw lactate and white-cell counts from elevated distributions.

use clinrisk::dataset::Dataset;
use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

pub const FEATURES: [&str; 4] = ["lactate", "wbc_count", "heart_rate", "temperature"];

pub struct CohortSpec {
    pub n_records: usize,
    pub prevalence: f64,
    pub missing_rate: f64,
    pub seed: u64,
}

impl Default for CohortSpec {
    fn default() -> Self {
        Self {
            n_records: 1000,
            prevalence: 0.05,
            missing_rate: 0.15,
            seed: 20240817,
        }
    }
}

/// Per-class feature distributions (mean, std) for
/// lactate, wbc_count, heart_rate, temperature.
fn class_profile(positive: bool) -> [(f64, f64); 4] {
    if positive {
        [(3.5, 0.8), (17.0, 3.0), (118.0, 12.0), (38.9, 0.7)]
    } else {
        [(1.2, 0.4), (8.0, 2.0), (82.0, 10.0), (37.0, 0.5)]
    }
}

pub fn generate_cohort(spec: &CohortSpec) -> Dataset {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let n = spec.n_records;
    let n_pos = ((n as f64) * spec.prevalence).round() as usize;

    let mut data = Vec::with_capacity(n * FEATURES.len());
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let positive = i < n_pos;
        labels.push(u8::from(positive));
        for &(mean, std) in class_profile(positive).iter() {
            let value = Normal::new(mean, std).unwrap().sample(&mut rng);
            if rng.gen::<f64>() < spec.missing_rate {
                data.push(f64::NAN);
            } else {
                data.push(value);
            }
        }
    }

    let x = Array2::from_shape_vec((n, FEATURES.len()), data).unwrap();
    let y = Array1::from_vec(labels);
    Dataset::new(
        FEATURES.iter().map(|s| s.to_string()).collect(),
        x,
        y,
    )
    .unwrap()
}
