//! Tabular patient dataset with explicit missing values.
//!
//! A `Dataset` holds one row per patient record, one named column per
//! feature, and a binary outcome label per row. Missing feature values are
//! stored as `f64::NAN` cells so the matrix stays dense; the imputer is the
//! only component that interprets them.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    /// Feature matrix, shape (n_records, n_features). NaN marks a missing cell.
    pub x: Array2<f64>,
    /// Binary outcome per record, 0 or 1.
    pub y: Array1<u8>,
}

impl Dataset {
    /// Build a dataset from a dense matrix, validating shapes and labels.
    pub fn new(feature_names: Vec<String>, x: Array2<f64>, y: Array1<u8>) -> Result<Self> {
        if x.ncols() != feature_names.len() {
            return Err(Error::Config(format!(
                "feature matrix has {} columns but {} feature names were given",
                x.ncols(),
                feature_names.len()
            )));
        }
        if x.nrows() != y.len() {
            return Err(Error::Config(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&v| v > 1) {
            return Err(Error::Config(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self {
            feature_names,
            x,
            y,
        })
    }

    /// Build a dataset from per-record rows where `None` marks a missing value.
    pub fn from_records(
        feature_names: Vec<String>,
        rows: &[Vec<Option<f64>>],
        labels: &[u8],
    ) -> Result<Self> {
        let n_features = feature_names.len();
        let mut data = Vec::with_capacity(rows.len() * n_features);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(Error::Config(format!(
                    "record {} has {} values but {} features are declared",
                    i,
                    row.len(),
                    n_features
                )));
            }
            data.extend(row.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        let x = Array2::from_shape_vec((rows.len(), n_features), data)
            .map_err(|e| Error::Config(e.to_string()))?;
        let y = Array1::from_vec(labels.to_vec());
        Self::new(feature_names, x, y)
    }

    pub fn n_records(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn count_label(&self, label: u8) -> usize {
        self.y.iter().filter(|&&v| v == label).count()
    }

    /// Select a row-subset of the dataset.
    fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
        }
    }

    /// Partition into disjoint train/test subsets, each preserving the
    /// original class proportion.
    ///
    /// Records are shuffled within each class with an explicitly seeded RNG,
    /// so splits are reproducible and independent of process-wide state.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(Error::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for class in [0u8, 1u8] {
            let mut members: Vec<usize> = (0..self.n_records())
                .filter(|&i| self.y[i] == class)
                .collect();
            members.shuffle(&mut rng);
            let n_test = (members.len() as f64 * test_fraction).round() as usize;
            test_idx.extend_from_slice(&members[..n_test]);
            train_idx.extend_from_slice(&members[n_test..]);
        }

        // Restore record order within each side so the split is a partition,
        // not a reordering.
        train_idx.sort_unstable();
        test_idx.sort_unstable();

        if train_idx.is_empty() || test_idx.is_empty() {
            return Err(Error::Config(format!(
                "split produced an empty side ({} train, {} test records)",
                train_idx.len(),
                test_idx.len()
            )));
        }

        Ok((self.select(&train_idx), self.select(&test_idx)))
    }

    pub fn log_summary(&self) {
        log::info!(
            "dataset: {} records ({} positive, {} negative), {} features",
            self.n_records(),
            self.count_label(1),
            self.count_label(0),
            self.n_features()
        );
    }
}
