pub mod classification;
pub mod temporal;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

pub use classification::{
    ConfusionMatrix, InvalidPrediction, Normalize, confusion_matrix, get_weighted_score, invalid_pred_info,
    mean_average_precision, mean_class_accuracy, mean_top_k_accuracy,
    ranking_mean_average_precision, softmax, top_k_accuracy,
};
pub use temporal::{
    AverageRecall, Detection, DetectionMap, GroundTruth, GroundTruthSegment, Proposal, Proposals,
    average_precision_at_temporal_iou, average_recall_at_avg_proposals,
    interpolated_precision_recall, mean_average_precision_at_temporal_iou,
    pairwise_temporal_iou, pairwise_temporal_overlap,
};

/// Value produced by one named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Scalar(value)
    }
}

pub type EvalResults = BTreeMap<String, MetricValue>;

/// Checks that every row has the same width and returns it.
pub(crate) fn matrix_width(rows: &[Vec<f64>], what: &str) -> Result<usize> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(EvalError::shape(format!(
                "{what} row {idx} has {} columns, expected {width}",
                row.len()
            )));
        }
    }
    Ok(width)
}

/// Indices of `values` ordered by descending value. Equal values keep the
/// reverse of their stable ascending order, so the later index ranks first.
pub(crate) fn rank_descending(values: &[f64]) -> Vec<usize> {
    let mut order = (0..values.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order.reverse();
    order
}

/// Fails with `InvalidInput` naming the first non-finite entry.
pub(crate) fn check_finite<'a>(values: impl IntoIterator<Item = &'a f64>, what: &str) -> Result<()> {
    match values.into_iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(EvalError::invalid(format!("{what} entry {idx} is not finite"))),
        None => Ok(()),
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/mod.rs"]
mod tests;
