//! Recognition metrics over per-sample class score matrices.
//!
//! Score matrices are `&[Vec<f64>]` with one row per sample. Every function
//! checks that rows share a width and that the label vector lines up with the
//! rows before doing any arithmetic.

use std::collections::BTreeMap;

use crate::error::{EvalError, Result};
use crate::metrics::{check_finite, matrix_width, mean, rank_descending};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    /// Divide each row (ground-truth class) by its total.
    True,
    /// Divide each column (predicted class) by its total.
    Pred,
    /// Divide every cell by the number of samples.
    All,
}

impl std::str::FromStr for Normalize {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "true" => Ok(Normalize::True),
            "pred" => Ok(Normalize::Pred),
            "all" => Ok(Normalize::All),
            other => Err(EvalError::invalid(format!(
                "normalize must be one of true|pred|all, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    /// Sorted union of predicted and real labels; indexes rows and columns.
    pub labels: Vec<usize>,
    /// `matrix[real][pred]`.
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidPrediction {
    pub sample: usize,
    pub label: usize,
    pub top_k: Vec<usize>,
    pub top_k_scores: Vec<f64>,
}

fn check_scores(scores: &[Vec<f64>], labels: &[usize]) -> Result<usize> {
    if scores.len() != labels.len() {
        return Err(EvalError::shape(format!(
            "{} score rows but {} labels",
            scores.len(),
            labels.len()
        )));
    }
    if scores.is_empty() {
        return Err(EvalError::invalid("no samples to evaluate"));
    }
    let num_classes = matrix_width(scores, "scores")?;
    if num_classes == 0 {
        return Err(EvalError::invalid("score rows have no classes"));
    }
    check_finite(scores.iter().flatten(), "score")?;
    if let Some((idx, label)) = labels
        .iter()
        .enumerate()
        .find(|(_, label)| **label >= num_classes)
    {
        return Err(EvalError::invalid(format!(
            "label {label} of sample {idx} is outside 0..{num_classes}"
        )));
    }
    Ok(num_classes)
}

fn top_k_indices(row: &[f64], k: usize) -> Vec<usize> {
    let mut order = rank_descending(row);
    order.truncate(k);
    order
}

/// Index of the first maximum.
pub(crate) fn argmax(row: &[f64]) -> usize {
    let mut best = 0usize;
    for (idx, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = idx;
        }
    }
    best
}

/// Row-wise softmax.
pub fn softmax(scores: &[Vec<f64>]) -> Vec<Vec<f64>> {
    scores
        .iter()
        .map(|row| {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps = row.iter().map(|v| (v - max).exp()).collect::<Vec<_>>();
            let sum: f64 = exps.iter().sum();
            exps.into_iter().map(|v| v / sum).collect()
        })
        .collect()
}

/// Fraction of samples whose label is among the `k` best scores, for every
/// `k` in `topk`.
pub fn top_k_accuracy(scores: &[Vec<f64>], labels: &[usize], topk: &[usize]) -> Result<Vec<f64>> {
    let num_classes = check_scores(scores, labels)?;
    let mut out = Vec::with_capacity(topk.len());
    for &k in topk {
        if k == 0 {
            return Err(EvalError::invalid("top-k requires k >= 1"));
        }
        let k = k.min(num_classes);
        let hits = scores
            .iter()
            .zip(labels)
            .filter(|(row, label)| top_k_indices(row, k).contains(label))
            .count();
        out.push(hits as f64 / scores.len() as f64);
    }
    Ok(out)
}

/// Top-k accuracy computed per ground-truth class and averaged uniformly.
pub fn mean_top_k_accuracy(scores: &[Vec<f64>], labels: &[usize], k: usize) -> Result<f64> {
    let num_classes = check_scores(scores, labels)?;
    if k == 0 {
        return Err(EvalError::invalid("top-k requires k >= 1"));
    }
    let k = k.min(num_classes);

    let mut per_class: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for (row, &label) in scores.iter().zip(labels) {
        let entry = per_class.entry(label).or_insert((0, 0));
        entry.1 += 1;
        if top_k_indices(row, k).contains(&label) {
            entry.0 += 1;
        }
    }

    let accuracies = per_class
        .values()
        .map(|&(hits, total)| hits as f64 / total as f64)
        .collect::<Vec<_>>();
    Ok(mean(&accuracies))
}

pub fn confusion_matrix(
    y_pred: &[usize],
    y_real: &[usize],
    normalize: Option<Normalize>,
) -> Result<ConfusionMatrix> {
    if y_pred.len() != y_real.len() {
        return Err(EvalError::shape(format!(
            "{} predictions but {} labels",
            y_pred.len(),
            y_real.len()
        )));
    }

    let mut labels = y_pred.iter().chain(y_real).copied().collect::<Vec<_>>();
    labels.sort_unstable();
    labels.dedup();
    let index: BTreeMap<usize, usize> = labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();

    let n = labels.len();
    let mut matrix = vec![vec![0.0f64; n]; n];
    for (pred, real) in y_pred.iter().zip(y_real) {
        matrix[index[real]][index[pred]] += 1.0;
    }

    match normalize {
        None => {}
        Some(Normalize::True) => {
            for row in matrix.iter_mut() {
                let total: f64 = row.iter().sum();
                for v in row.iter_mut() {
                    *v = if total > 0.0 { *v / total } else { 0.0 };
                }
            }
        }
        Some(Normalize::Pred) => {
            for col in 0..n {
                let total: f64 = matrix.iter().map(|row| row[col]).sum();
                for row in matrix.iter_mut() {
                    row[col] = if total > 0.0 { row[col] / total } else { 0.0 };
                }
            }
        }
        Some(Normalize::All) => {
            let total = y_real.len() as f64;
            for row in matrix.iter_mut() {
                for v in row.iter_mut() {
                    *v = if total > 0.0 { *v / total } else { 0.0 };
                }
            }
        }
    }

    Ok(ConfusionMatrix { labels, matrix })
}

/// Per-class recall of argmax predictions, macro-averaged. Classes with no
/// ground-truth samples do not take part in the average.
pub fn mean_class_accuracy(scores: &[Vec<f64>], labels: &[usize]) -> Result<f64> {
    check_scores(scores, labels)?;
    let pred = scores.iter().map(|row| argmax(row)).collect::<Vec<_>>();
    let cf = confusion_matrix(&pred, labels, None)?;

    let mut recalls = Vec::with_capacity(cf.labels.len());
    for (i, row) in cf.matrix.iter().enumerate() {
        let count: f64 = row.iter().sum();
        if count > 0.0 {
            recalls.push(row[i] / count);
        }
    }
    Ok(mean(&recalls))
}

/// Weighted element-wise sum of several score matrices.
pub fn get_weighted_score(score_list: &[Vec<Vec<f64>>], coeff_list: &[f64]) -> Result<Vec<Vec<f64>>> {
    if score_list.len() != coeff_list.len() {
        return Err(EvalError::shape(format!(
            "{} score matrices but {} coefficients",
            score_list.len(),
            coeff_list.len()
        )));
    }
    let Some(first) = score_list.first() else {
        return Ok(Vec::new());
    };
    let width = matrix_width(first, "scores")?;

    let mut out = vec![vec![0.0f64; width]; first.len()];
    for (scores, &coeff) in score_list.iter().zip(coeff_list) {
        if scores.len() != first.len() || matrix_width(scores, "scores")? != width {
            return Err(EvalError::shape(
                "all score matrices must share the same shape",
            ));
        }
        for (acc_row, row) in out.iter_mut().zip(scores) {
            for (acc, v) in acc_row.iter_mut().zip(row) {
                *acc += v * coeff;
            }
        }
    }
    Ok(out)
}

/// AP of one binary ranking problem, summing `(R_n - R_{n-1}) * P_n` over
/// distinct score thresholds. `None` when there are no positives.
fn binary_average_precision(scores: &[f64], targets: &[bool]) -> Option<f64> {
    let positives = targets.iter().filter(|t| **t).count();
    if positives == 0 {
        return None;
    }

    let order = rank_descending(scores);
    let mut tps = 0usize;
    let mut fps = 0usize;
    let mut prev_recall = 0.0f64;
    let mut ap = 0.0f64;
    for (pos, &idx) in order.iter().enumerate() {
        if targets[idx] {
            tps += 1;
        } else {
            fps += 1;
        }
        let group_end = order
            .get(pos + 1)
            .is_none_or(|&next| scores[next] != scores[idx]);
        if !group_end {
            continue;
        }
        let precision = tps as f64 / (tps + fps) as f64;
        let recall = tps as f64 / positives as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
        if tps == positives {
            break;
        }
    }
    Some(ap)
}

/// Multi-label mean average precision. `labels` is a 0/1 matrix with the same
/// shape as `scores`. Classes without positives are skipped; `None` when no
/// class has any.
pub fn mean_average_precision(scores: &[Vec<f64>], labels: &[Vec<f64>]) -> Result<Option<f64>> {
    if scores.len() != labels.len() {
        return Err(EvalError::shape(format!(
            "{} score rows but {} label rows",
            scores.len(),
            labels.len()
        )));
    }
    let num_classes = matrix_width(scores, "scores")?;
    if matrix_width(labels, "labels")? != num_classes {
        return Err(EvalError::shape("scores and labels differ in class count"));
    }
    check_finite(scores.iter().flatten(), "score")?;

    let mut aps = Vec::with_capacity(num_classes);
    for class in 0..num_classes {
        let column = scores.iter().map(|row| row[class]).collect::<Vec<_>>();
        let targets = labels.iter().map(|row| row[class] > 0.0).collect::<Vec<_>>();
        if let Some(ap) = binary_average_precision(&column, &targets) {
            aps.push(ap);
        }
    }

    if aps.is_empty() {
        Ok(None)
    } else {
        Ok(Some(mean(&aps)))
    }
}

/// Single-label ranking mAP: for each class present in `labels`, rank the
/// samples by that class's score and average the precision at every positive.
pub fn ranking_mean_average_precision(scores: &[Vec<f64>], labels: &[usize]) -> Result<f64> {
    check_scores(scores, labels)?;

    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let mut aps = Vec::with_capacity(classes.len());
    for class in classes {
        let column = scores.iter().map(|row| row[class]).collect::<Vec<_>>();
        let order = rank_descending(&column);

        let mut seen = 0usize;
        let mut precisions = Vec::new();
        for (rank, &idx) in order.iter().enumerate() {
            if labels[idx] == class {
                seen += 1;
                precisions.push(seen as f64 / (rank + 1) as f64);
            }
        }
        aps.push(mean(&precisions));
    }
    Ok(mean(&aps))
}

/// Samples whose label is not among their top-k predictions.
pub fn invalid_pred_info(
    scores: &[Vec<f64>],
    labels: &[usize],
    k: usize,
) -> Result<Vec<InvalidPrediction>> {
    let num_classes = check_scores(scores, labels)?;
    let k = k.clamp(1, num_classes);

    let mut out = Vec::new();
    for (sample, (row, &label)) in scores.iter().zip(labels).enumerate() {
        let top_k = top_k_indices(row, k);
        if top_k.contains(&label) {
            continue;
        }
        let top_k_scores = top_k.iter().map(|&c| row[c]).collect();
        out.push(InvalidPrediction {
            sample,
            label,
            top_k,
            top_k_scores,
        });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/classification.rs"]
mod tests;
