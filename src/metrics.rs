//! Imbalance-aware evaluation metrics for held-out predictions.
//!
//! Under a ~5% positive prevalence plain accuracy is near-meaningless, so
//! the report centers on per-class precision/recall/F1, the confusion
//! matrix, ROC-AUC and precision-recall AUC.

use std::fmt;

use ndarray::Array1;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<u8>, y_pred: &Array1<u8>) -> Self {
        let mut cm = ConfusionMatrix {
            tp: 0,
            fp: 0,
            tn: 0,
            fn_: 0,
        };
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == 1, p == 1) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn class_metrics(tp: usize, fp: usize, fn_: usize) -> ClassMetrics {
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassMetrics {
        precision,
        recall,
        f1,
    }
}

/// Metrics computed from held-out test predictions.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub confusion: ConfusionMatrix,
    pub positive: ClassMetrics,
    pub negative: ClassMetrics,
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub prevalence: f64,
    pub n_records: usize,
}

fn validate_probs(y_true: &Array1<u8>, y_prob: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_prob.len() {
        return Err(Error::Config(format!(
            "got {} labels but {} probabilities",
            y_true.len(),
            y_prob.len()
        )));
    }
    if y_prob.iter().any(|p| p.is_nan()) {
        return Err(Error::Config("probabilities contain NaN".to_string()));
    }
    let n_pos = y_true.iter().filter(|&&v| v == 1).count();
    if n_pos == 0 || n_pos == y_true.len() {
        return Err(Error::Config(
            "ranking metrics need both classes present".to_string(),
        ));
    }
    Ok(())
}

/// ROC-AUC via the Mann-Whitney rank statistic, with average ranks for
/// tied scores.
pub fn roc_auc(y_true: &Array1<u8>, y_prob: &Array1<f64>) -> Result<f64> {
    validate_probs(y_true, y_prob)?;
    let n = y_prob.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_prob[a].partial_cmp(&y_prob[b]).unwrap());

    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && y_prob[order[j + 1]] == y_prob[order[i]] {
            j += 1;
        }
        // ranks are 1-based; ties share the average rank of their block
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let n_pos = y_true.iter().filter(|&&v| v == 1).count() as f64;
    let n_neg = n as f64 - n_pos;
    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(y_true.iter())
        .filter(|(_, &t)| t == 1)
        .map(|(r, _)| *r)
        .sum();

    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Precision-recall AUC in its average-precision form: the sum of
/// precision at each recall step, stepping over descending score groups so
/// tied scores are treated as a single threshold.
pub fn pr_auc(y_true: &Array1<u8>, y_prob: &Array1<f64>) -> Result<f64> {
    validate_probs(y_true, y_prob)?;
    let n = y_prob.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_prob[b].partial_cmp(&y_prob[a]).unwrap());

    let total_pos = y_true.iter().filter(|&&v| v == 1).count() as f64;
    let mut tp = 0.0;
    let mut seen = 0.0;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;

    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && y_prob[order[j + 1]] == y_prob[order[i]] {
            j += 1;
        }
        for &idx in &order[i..=j] {
            seen += 1.0;
            if y_true[idx] == 1 {
                tp += 1.0;
            }
        }
        let precision = tp / seen;
        let recall = tp / total_pos;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
        i = j + 1;
    }

    Ok(ap)
}

/// Score held-out predictions against their true labels.
pub fn evaluate(
    y_true: &Array1<u8>,
    y_pred: &Array1<u8>,
    y_prob: &Array1<f64>,
) -> Result<EvaluationReport> {
    if y_true.len() != y_pred.len() {
        return Err(Error::Config(format!(
            "got {} labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    let confusion = ConfusionMatrix::from_labels(y_true, y_pred);
    let positive = class_metrics(confusion.tp, confusion.fp, confusion.fn_);
    // For the negative class the roles of the confusion counts swap.
    let negative = class_metrics(confusion.tn, confusion.fn_, confusion.fp);
    let n_records = y_true.len();
    let prevalence = y_true.iter().filter(|&&v| v == 1).count() as f64 / n_records as f64;

    Ok(EvaluationReport {
        confusion,
        positive,
        negative,
        roc_auc: roc_auc(y_true, y_prob)?,
        pr_auc: pr_auc(y_true, y_prob)?,
        prevalence,
        n_records,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "evaluation over {} records (prevalence {:.1}%)",
            self.n_records,
            self.prevalence * 100.0
        )?;
        writeln!(
            f,
            "confusion: tp={} fp={} tn={} fn={}",
            self.confusion.tp, self.confusion.fp, self.confusion.tn, self.confusion.fn_
        )?;
        writeln!(
            f,
            "positive class: precision={:.3} recall={:.3} f1={:.3}",
            self.positive.precision, self.positive.recall, self.positive.f1
        )?;
        writeln!(
            f,
            "negative class: precision={:.3} recall={:.3} f1={:.3}",
            self.negative.precision, self.negative.recall, self.negative.f1
        )?;
        write!(
            f,
            "roc_auc={:.3} pr_auc={:.3}",
            self.roc_auc, self.pr_auc
        )
    }
}
