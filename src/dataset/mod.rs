pub mod activitynet;
pub mod pipeline;
pub mod recognition;

use std::fmt;
use std::str::FromStr;

use crate::config::EvalOptions;
use crate::error::{EvalError, Result};
use crate::metrics::EvalResults;

pub use activitynet::{ActivityNetDataset, DumpPayload, OutputFormat, video_id};
pub use pipeline::{GenerateLocalizationLabels, Pipeline, Sample, SecondsToFrames, Transform};
pub use recognition::RecognitionDataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    ArAn,
    DetectionMap,
    TopKAccuracy,
    MeanTopKAccuracy,
    MeanClassAccuracy,
    RankingMeanAveragePrecision,
    ConfusionMatrix,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ArAn => "AR@AN",
            Metric::DetectionMap => "mAP",
            Metric::TopKAccuracy => "top_k_accuracy",
            Metric::MeanTopKAccuracy => "mean_top_k_accuracy",
            Metric::MeanClassAccuracy => "mean_class_accuracy",
            Metric::RankingMeanAveragePrecision => "ranking_mean_average_precision",
            Metric::ConfusionMatrix => "confusion_matrix",
        }
    }

    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Metric>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let metric = name.as_ref().parse::<Metric>()?;
            if !out.contains(&metric) {
                out.push(metric);
            }
        }
        Ok(out)
    }
}

impl FromStr for Metric {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AR@AN" => Ok(Metric::ArAn),
            "mAP" => Ok(Metric::DetectionMap),
            "top_k_accuracy" => Ok(Metric::TopKAccuracy),
            "mean_top_k_accuracy" => Ok(Metric::MeanTopKAccuracy),
            "mean_class_accuracy" => Ok(Metric::MeanClassAccuracy),
            "ranking_mean_average_precision" => Ok(Metric::RankingMeanAveragePrecision),
            "confusion_matrix" => Ok(Metric::ConfusionMatrix),
            other => Err(EvalError::UnsupportedMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset that can score a buffer of inference outputs.
pub trait EvaluableDataset {
    type Output;

    fn name(&self) -> &'static str;

    fn allowed_metrics(&self) -> &'static [Metric];

    fn evaluate(
        &self,
        results: &[Self::Output],
        metrics: &[Metric],
        options: &EvalOptions,
    ) -> Result<EvalResults>;

    fn check_metrics(&self, metrics: &[Metric]) -> Result<()> {
        let allowed = self.allowed_metrics();
        match metrics.iter().find(|m| !allowed.contains(m)) {
            Some(metric) => Err(EvalError::UnsupportedMetric(format!(
                "{metric} (allowed for {}: {})",
                self.name(),
                allowed
                    .iter()
                    .map(Metric::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/dataset/mod.rs"]
mod tests;
