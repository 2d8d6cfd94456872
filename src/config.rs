use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::Metric;
use crate::error::{EvalError, Result};
use crate::hook::Rule;
use crate::input::read_json;

/// `0.50, 0.55, ..., 0.95`.
pub fn default_temporal_iou_thresholds() -> Vec<f64> {
    (0..10).map(|i| 0.5 + i as f64 * 0.05).collect()
}

/// Knobs shared by every metric function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    pub max_avg_proposals: Option<f64>,
    pub temporal_iou_thresholds: Vec<f64>,
    pub topk: Vec<usize>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_avg_proposals: Some(100.0),
            temporal_iou_thresholds: default_temporal_iou_thresholds(),
            topk: vec![1, 5],
        }
    }
}

impl EvalOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_avg_proposals
            && !(max.is_finite() && max > 0.0)
        {
            return Err(EvalError::config(format!(
                "max_avg_proposals must be positive, got {max}"
            )));
        }
        if self.temporal_iou_thresholds.is_empty() {
            return Err(EvalError::config("temporal_iou_thresholds is empty"));
        }
        if let Some(t) = self
            .temporal_iou_thresholds
            .iter()
            .find(|t| !(0.0..=1.0).contains(*t))
        {
            return Err(EvalError::config(format!(
                "temporal IoU threshold {t} is outside [0, 1]"
            )));
        }
        if self.topk.contains(&0) {
            return Err(EvalError::config("topk entries must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub interval: usize,
    pub by_epoch: bool,
    pub start: Option<usize>,
    pub save_best: Option<String>,
    pub rule: Option<Rule>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            interval: 1,
            by_epoch: true,
            start: None,
            save_best: None,
            rule: None,
        }
    }
}

/// On-disk evaluation configuration. Every field has a default so partial
/// files are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub metrics: Vec<String>,
    pub options: EvalOptions,
    pub hook: HookConfig,
}

impl EvalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: EvalConfig = read_json(path)?;
        config.options.validate()?;
        tracing::info!("loaded evaluation config from {}", path.display());
        Ok(config)
    }

    /// Parsed metric names, or `fallback` when none are configured.
    pub fn metrics_or(&self, fallback: &[Metric]) -> Result<Vec<Metric>> {
        if self.metrics.is_empty() {
            Ok(fallback.to_vec())
        } else {
            Metric::parse_list(&self.metrics)
        }
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
