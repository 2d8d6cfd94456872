//! Periodic evaluation during training.
//!
//! The training loop calls `after_train_epoch` / `after_train_iter` with a
//! closure that runs inference over the held-out set. When the schedule says
//! an evaluation is due, the hook evaluates the outputs, logs every scalar
//! metric and merges it into the loop's `LogBuffer`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{EvalOptions, HookConfig};
use crate::dataset::{EvaluableDataset, Metric};
use crate::error::{EvalError, Result};
use crate::metrics::EvalResults;

const GREATER_KEYS: [&str; 6] = ["acc", "top", "AR@", "auc", "precision", "mAP"];
const LESS_KEYS: [&str; 1] = ["loss"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    Greater,
    Less,
}

impl Rule {
    /// Guesses the comparison rule from the metric name.
    pub fn infer(key: &str) -> Option<Rule> {
        if GREATER_KEYS.iter().any(|k| key.contains(k)) {
            Some(Rule::Greater)
        } else if LESS_KEYS.iter().any(|k| key.contains(k)) {
            Some(Rule::Less)
        } else {
            None
        }
    }

    pub fn improves(self, candidate: f64, best: f64) -> bool {
        match self {
            Rule::Greater => candidate > best,
            Rule::Less => candidate < best,
        }
    }
}

/// Scalars the training loop writes to its log stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBuffer {
    pub output: BTreeMap<String, f64>,
    pub ready: bool,
}

impl LogBuffer {
    pub fn clear(&mut self) {
        self.output.clear();
        self.ready = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestScore {
    pub value: f64,
    /// 1-based epoch or iteration the value was reached at.
    pub progress: usize,
}

pub struct EvalHook<D: EvaluableDataset> {
    dataset: D,
    metrics: Vec<Metric>,
    options: EvalOptions,
    config: HookConfig,
    rule: Option<Rule>,
    best: Option<BestScore>,
}

impl<D: EvaluableDataset> EvalHook<D> {
    pub fn new(
        dataset: D,
        metrics: Vec<Metric>,
        options: EvalOptions,
        config: HookConfig,
    ) -> Result<Self> {
        if config.interval == 0 {
            return Err(EvalError::config("evaluation interval must be positive"));
        }
        if config.start == Some(0) {
            return Err(EvalError::config("evaluation start is 1-based"));
        }
        options.validate()?;
        dataset.check_metrics(&metrics)?;

        let rule = match (&config.save_best, config.rule) {
            (None, _) => None,
            (Some(_), Some(rule)) => Some(rule),
            (Some(key), None) => Some(Rule::infer(key).ok_or_else(|| {
                EvalError::config(format!(
                    "cannot infer a comparison rule for {key}; set rule to greater or less"
                ))
            })?),
        };

        Ok(Self {
            dataset,
            metrics,
            options,
            config,
            rule,
            best: None,
        })
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn best(&self) -> Option<BestScore> {
        self.best
    }

    /// Whether an evaluation is due after the 0-based epoch/iteration
    /// `progress` has finished.
    pub fn is_due(&self, progress: usize) -> bool {
        let current = progress + 1;
        match self.config.start {
            None => current % self.config.interval == 0,
            Some(start) => current >= start && (current - start) % self.config.interval == 0,
        }
    }

    pub fn after_train_epoch<F>(
        &mut self,
        epoch: usize,
        infer: F,
        log: &mut LogBuffer,
    ) -> Result<Option<EvalResults>>
    where
        F: FnOnce() -> Result<Vec<D::Output>>,
    {
        if !self.config.by_epoch || !self.is_due(epoch) {
            return Ok(None);
        }
        let results = infer()?;
        self.evaluate(epoch + 1, &results, log).map(Some)
    }

    pub fn after_train_iter<F>(
        &mut self,
        iter: usize,
        infer: F,
        log: &mut LogBuffer,
    ) -> Result<Option<EvalResults>>
    where
        F: FnOnce() -> Result<Vec<D::Output>>,
    {
        if self.config.by_epoch || !self.is_due(iter) {
            return Ok(None);
        }
        let results = infer()?;
        self.evaluate(iter + 1, &results, log).map(Some)
    }

    fn evaluate(
        &mut self,
        progress: usize,
        results: &[D::Output],
        log: &mut LogBuffer,
    ) -> Result<EvalResults> {
        let eval_results = self
            .dataset
            .evaluate(results, &self.metrics, &self.options)?;

        let unit = if self.config.by_epoch { "epoch" } else { "iter" };
        for (name, value) in &eval_results {
            if let Some(v) = value.as_scalar() {
                tracing::info!("{} {unit} {progress}: {name} = {v:.4}", self.dataset.name());
                log.output.insert(name.clone(), v);
            }
        }
        log.ready = true;

        self.update_best(progress, &eval_results);
        Ok(eval_results)
    }

    fn update_best(&mut self, progress: usize, eval_results: &EvalResults) {
        let (Some(key), Some(rule)) = (&self.config.save_best, self.rule) else {
            return;
        };
        let Some(value) = eval_results.get(key).and_then(|v| v.as_scalar()) else {
            tracing::warn!("save_best key {key} is not among the evaluated scalar metrics");
            return;
        };
        let improved = self
            .best
            .is_none_or(|best| rule.improves(value, best.value));
        if improved {
            self.best = Some(BestScore { value, progress });
            tracing::info!("new best {key} = {value:.4} at {progress}");
        }
    }
}

/// Communication primitive used to collect inference outputs from workers.
pub trait Collective {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Gathers every worker's outputs; only rank 0 receives `Some`.
    fn gather<T>(&self, local: Vec<T>) -> Result<Option<Vec<T>>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Collective for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn gather<T>(&self, local: Vec<T>) -> Result<Option<Vec<T>>> {
        Ok(Some(local))
    }
}

/// Distributed variant: every worker runs inference, rank 0 alone evaluates
/// and logs.
pub struct DistEvalHook<D: EvaluableDataset, C: Collective> {
    inner: EvalHook<D>,
    collective: C,
}

impl<D: EvaluableDataset, C: Collective> DistEvalHook<D, C> {
    pub fn new(inner: EvalHook<D>, collective: C) -> Self {
        Self { inner, collective }
    }

    pub fn inner(&self) -> &EvalHook<D> {
        &self.inner
    }

    pub fn after_train_epoch<F>(
        &mut self,
        epoch: usize,
        infer: F,
        log: &mut LogBuffer,
    ) -> Result<Option<EvalResults>>
    where
        F: FnOnce() -> Result<Vec<D::Output>>,
    {
        if !self.inner.config.by_epoch || !self.inner.is_due(epoch) {
            return Ok(None);
        }
        self.run(epoch, infer, log)
    }

    pub fn after_train_iter<F>(
        &mut self,
        iter: usize,
        infer: F,
        log: &mut LogBuffer,
    ) -> Result<Option<EvalResults>>
    where
        F: FnOnce() -> Result<Vec<D::Output>>,
    {
        if self.inner.config.by_epoch || !self.inner.is_due(iter) {
            return Ok(None);
        }
        self.run(iter, infer, log)
    }

    fn run<F>(&mut self, progress: usize, infer: F, log: &mut LogBuffer) -> Result<Option<EvalResults>>
    where
        F: FnOnce() -> Result<Vec<D::Output>>,
    {
        let local = infer()?;
        let gathered = self.collective.gather(local)?;
        match gathered {
            Some(results) if self.collective.rank() == 0 => {
                tracing::debug!(
                    "gathered {} results from {} workers",
                    results.len(),
                    self.collective.world_size()
                );
                self.inner.evaluate(progress + 1, &results, log).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/hook.rs"]
mod tests;
