use std::path::Path;

use crate::config::EvalOptions;
use crate::dataset::{EvaluableDataset, Metric};
use crate::error::{EvalError, Result};
use crate::input::{RecognitionRecord, load_recognition_annotations};
use crate::metrics::classification::argmax;
use crate::metrics::{
    EvalResults, MetricValue, confusion_matrix, mean_class_accuracy, mean_top_k_accuracy,
    matrix_width, ranking_mean_average_precision, top_k_accuracy,
};

/// Clip-level recognition dataset. Results are one class-score row per
/// record, in record order.
#[derive(Debug, Clone)]
pub struct RecognitionDataset {
    records: Vec<RecognitionRecord>,
}

impl RecognitionDataset {
    pub fn new(records: Vec<RecognitionRecord>) -> Self {
        Self { records }
    }

    pub fn from_annotation_file(path: &Path) -> Result<Self> {
        Ok(Self::new(load_recognition_annotations(path)?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, idx: usize) -> Option<&RecognitionRecord> {
        self.records.get(idx)
    }

    pub fn labels(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.label).collect()
    }
}

impl EvaluableDataset for RecognitionDataset {
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "RecognitionDataset"
    }

    fn allowed_metrics(&self) -> &'static [Metric] {
        &[
            Metric::TopKAccuracy,
            Metric::MeanTopKAccuracy,
            Metric::MeanClassAccuracy,
            Metric::RankingMeanAveragePrecision,
            Metric::ConfusionMatrix,
        ]
    }

    fn evaluate(
        &self,
        results: &[Vec<f64>],
        metrics: &[Metric],
        options: &EvalOptions,
    ) -> Result<EvalResults> {
        self.check_metrics(metrics)?;
        if results.len() != self.records.len() {
            return Err(EvalError::shape(format!(
                "{} score rows for {} records",
                results.len(),
                self.records.len()
            )));
        }
        let labels = self.labels();

        let mut eval_results = EvalResults::new();
        for metric in metrics {
            match metric {
                Metric::TopKAccuracy => {
                    let acc = top_k_accuracy(results, &labels, &options.topk)?;
                    for (k, value) in options.topk.iter().zip(acc) {
                        eval_results.insert(format!("top{k}_acc"), MetricValue::Scalar(value));
                    }
                }
                Metric::MeanTopKAccuracy => {
                    for &k in &options.topk {
                        let value = mean_top_k_accuracy(results, &labels, k)?;
                        eval_results.insert(format!("mean_top{k}_acc"), MetricValue::Scalar(value));
                    }
                }
                Metric::MeanClassAccuracy => {
                    let value = mean_class_accuracy(results, &labels)?;
                    eval_results.insert(
                        "mean_class_accuracy".to_string(),
                        MetricValue::Scalar(value),
                    );
                }
                Metric::RankingMeanAveragePrecision => {
                    let value = ranking_mean_average_precision(results, &labels)?;
                    eval_results.insert("rank_mAP".to_string(), MetricValue::Scalar(value));
                }
                Metric::ConfusionMatrix => {
                    matrix_width(results, "scores")?;
                    let pred = results.iter().map(|row| argmax(row)).collect::<Vec<_>>();
                    let cf = confusion_matrix(&pred, &labels, None)?;
                    eval_results.insert(
                        "confusion_matrix_labels".to_string(),
                        MetricValue::Vector(cf.labels.iter().map(|&l| l as f64).collect()),
                    );
                    eval_results.insert(
                        "confusion_matrix".to_string(),
                        MetricValue::Matrix(cf.matrix),
                    );
                }
                other => return Err(EvalError::UnsupportedMetric(other.to_string())),
            }
        }
        Ok(eval_results)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/dataset/recognition.rs"]
mod tests;
