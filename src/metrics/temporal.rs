//! Temporal localization metrics: segment IoU, AR@AN and AP at temporal IoU.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::metrics::{check_finite, mean, rank_descending};

/// Number of proposal budgets sampled along the AR@AN curve.
const RECALL_POINTS: usize = 100;

/// Guards the `floor` of budget products such as `0.29 * 100`.
const BUDGET_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthSegment {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub start: f64,
    pub end: f64,
    pub score: f64,
}

/// A labelled, scored segment of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub video_id: String,
    pub start: f64,
    pub end: f64,
    pub label: String,
    pub score: f64,
}

pub type GroundTruth = BTreeMap<String, Vec<GroundTruthSegment>>;
pub type Proposals = BTreeMap<String, Vec<Proposal>>;

#[derive(Debug, Clone, PartialEq)]
pub struct AverageRecall {
    /// `recall[threshold][budget]`.
    pub recall: Vec<Vec<f64>>,
    pub avg_recall: Vec<f64>,
    pub proposals_per_video: Vec<f64>,
    pub auc: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionMap {
    /// AP per threshold for every ground-truth class.
    pub per_class: BTreeMap<String, Vec<f64>>,
    /// mAP over classes, one entry per threshold.
    pub per_threshold: Vec<f64>,
    pub mean: f64,
}

/// `|a| x |b|` matrix of temporal IoU.
pub fn pairwise_temporal_iou(a: &[[f64; 2]], b: &[[f64; 2]]) -> Vec<Vec<f64>> {
    a.iter()
        .map(|sa| {
            b.iter()
                .map(|sb| {
                    let inter = intersection(sa, sb);
                    let union = (sa[1] - sa[0]) + (sb[1] - sb[0]) - inter;
                    if union > 0.0 { inter / union } else { 0.0 }
                })
                .collect()
        })
        .collect()
}

/// `|candidates| x |targets|` matrix of intersection over candidate length.
pub fn pairwise_temporal_overlap(candidates: &[[f64; 2]], targets: &[[f64; 2]]) -> Vec<Vec<f64>> {
    candidates
        .iter()
        .map(|c| {
            let length = c[1] - c[0];
            targets
                .iter()
                .map(|t| {
                    if length > 0.0 {
                        intersection(c, t) / length
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn intersection(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[1].min(b[1]) - a[0].max(b[0])).max(0.0)
}

struct VideoScore {
    /// `ious[gt][proposal]`, proposals in rank order.
    ious: Vec<Vec<f64>>,
    retrieved: usize,
}

/// For each ground-truth segment, the rank of the proposal that claims it.
/// Proposals are visited in rank order and take the unmatched ground truth
/// with the highest IoU at or above `threshold`.
fn greedy_match_ranks(ious: &[Vec<f64>], num_proposals: usize, threshold: f64) -> Vec<Option<usize>> {
    let mut ranks: Vec<Option<usize>> = vec![None; ious.len()];
    for p in 0..num_proposals {
        let mut best: Option<(usize, f64)> = None;
        for (g, row) in ious.iter().enumerate() {
            if ranks[g].is_some() || row[p] < threshold {
                continue;
            }
            if best.is_none_or(|(_, iou)| row[p] > iou) {
                best = Some((g, row[p]));
            }
        }
        if let Some((g, _)) = best {
            ranks[g] = Some(p);
        }
    }
    ranks
}

fn trapz(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Average recall as a function of the average number of proposals per
/// video (AR@AN).
pub fn average_recall_at_avg_proposals(
    ground_truth: &GroundTruth,
    proposals: &Proposals,
    total_num_proposals: usize,
    max_avg_proposals: Option<f64>,
    temporal_iou_thresholds: &[f64],
) -> Result<AverageRecall> {
    let num_videos = ground_truth.len();
    if num_videos == 0 {
        return Err(EvalError::invalid("ground truth has no videos"));
    }
    if temporal_iou_thresholds.is_empty() {
        return Err(EvalError::invalid("no temporal IoU thresholds given"));
    }
    let max_avg_proposals = match max_avg_proposals {
        Some(v) if v > 0.0 => v,
        Some(v) => {
            return Err(EvalError::invalid(format!(
                "max_avg_proposals must be positive, got {v}"
            )));
        }
        None => total_num_proposals as f64 / num_videos as f64,
    };
    check_finite(
        proposals
            .values()
            .flatten()
            .flat_map(|p| [&p.start, &p.end, &p.score]),
        "proposal value",
    )?;

    let proposals_per_video = (1..=RECALL_POINTS)
        .map(|j| j as f64 / RECALL_POINTS as f64 * max_avg_proposals)
        .collect::<Vec<_>>();

    if total_num_proposals == 0 || max_avg_proposals == 0.0 {
        return Ok(AverageRecall {
            recall: vec![vec![0.0; RECALL_POINTS]; temporal_iou_thresholds.len()],
            avg_recall: vec![0.0; RECALL_POINTS],
            proposals_per_video,
            auc: 0.0,
        });
    }

    let ratio = max_avg_proposals * num_videos as f64 / total_num_proposals as f64;

    let mut scores = Vec::with_capacity(num_videos);
    let mut positives = 0usize;
    let mut total_retrieved = 0usize;
    for (video_id, gts) in ground_truth {
        positives += gts.len();
        let video_proposals = proposals.get(video_id).map(Vec::as_slice).unwrap_or(&[]);
        if video_proposals.is_empty() {
            tracing::debug!("no proposals for video {video_id}");
        }

        let order = rank_descending(
            &video_proposals
                .iter()
                .map(|p| p.score)
                .collect::<Vec<_>>(),
        );
        let n = video_proposals.len();
        let retrieved = ((n as f64 * ratio + BUDGET_EPS).floor() as usize).min(n);
        total_retrieved += retrieved;

        let ranked = order[..retrieved]
            .iter()
            .map(|&i| [video_proposals[i].start, video_proposals[i].end])
            .collect::<Vec<_>>();
        let gt_segments = gts.iter().map(|g| [g.start, g.end]).collect::<Vec<_>>();
        scores.push(VideoScore {
            ious: pairwise_temporal_iou(&gt_segments, &ranked),
            retrieved,
        });
    }

    // Fraction of each video's retrieved proposals kept at every budget.
    let pcn = proposals_per_video
        .iter()
        .map(|ppv| {
            if total_retrieved == 0 {
                0.0
            } else {
                ppv * num_videos as f64 / total_retrieved as f64
            }
        })
        .collect::<Vec<_>>();

    let mut recall = Vec::with_capacity(temporal_iou_thresholds.len());
    for &threshold in temporal_iou_thresholds {
        let mut matches = vec![0usize; RECALL_POINTS];
        for video in &scores {
            let ranks = greedy_match_ranks(&video.ious, video.retrieved, threshold);
            for (j, &fraction) in pcn.iter().enumerate() {
                let budget = ((video.retrieved as f64 * fraction + BUDGET_EPS).floor() as usize)
                    .min(video.retrieved);
                matches[j] += ranks.iter().filter(|r| r.is_some_and(|p| p < budget)).count();
            }
        }
        recall.push(
            matches
                .iter()
                .map(|&m| {
                    if positives == 0 {
                        0.0
                    } else {
                        m as f64 / positives as f64
                    }
                })
                .collect::<Vec<_>>(),
        );
    }

    let avg_recall = (0..RECALL_POINTS)
        .map(|j| mean(&recall.iter().map(|row| row[j]).collect::<Vec<_>>()))
        .collect::<Vec<_>>();
    let auc = 100.0 * trapz(&avg_recall, &proposals_per_video) / max_avg_proposals;

    Ok(AverageRecall {
        recall,
        avg_recall,
        proposals_per_video,
        auc,
    })
}

/// VOC-style AP: integrate the monotone precision envelope over recall.
pub fn interpolated_precision_recall(precision: &[f64], recall: &[f64]) -> Result<f64> {
    if precision.len() != recall.len() {
        return Err(EvalError::shape(format!(
            "{} precision values but {} recall values",
            precision.len(),
            recall.len()
        )));
    }

    let mut mprecision = Vec::with_capacity(precision.len() + 2);
    mprecision.push(0.0);
    mprecision.extend_from_slice(precision);
    mprecision.push(0.0);

    let mut mrecall = Vec::with_capacity(recall.len() + 2);
    mrecall.push(0.0);
    mrecall.extend_from_slice(recall);
    mrecall.push(1.0);

    for i in (0..mprecision.len() - 1).rev() {
        mprecision[i] = mprecision[i].max(mprecision[i + 1]);
    }

    let mut ap = 0.0;
    for i in 1..mrecall.len() {
        if mrecall[i] != mrecall[i - 1] {
            ap += (mrecall[i] - mrecall[i - 1]) * mprecision[i];
        }
    }
    Ok(ap)
}

/// AP of one class at every threshold. Predictions are visited by
/// decreasing score; each claims the highest-IoU ground truth of its video
/// not yet claimed at that threshold, otherwise it counts as a false positive.
pub fn average_precision_at_temporal_iou(
    ground_truth: &BTreeMap<String, Vec<[f64; 2]>>,
    predictions: &[Detection],
    temporal_iou_thresholds: &[f64],
) -> Result<Vec<f64>> {
    let n_thr = temporal_iou_thresholds.len();
    check_finite(
        predictions.iter().flat_map(|p| [&p.start, &p.end, &p.score]),
        "prediction value",
    )?;
    let num_gts: usize = ground_truth.values().map(Vec::len).sum();
    if predictions.is_empty() || num_gts == 0 {
        return Ok(vec![0.0; n_thr]);
    }

    let mut locked: BTreeMap<&str, Vec<Vec<bool>>> = ground_truth
        .iter()
        .map(|(k, v)| (k.as_str(), vec![vec![false; v.len()]; n_thr]))
        .collect();

    let order = rank_descending(&predictions.iter().map(|p| p.score).collect::<Vec<_>>());
    let mut tp = vec![vec![0u32; order.len()]; n_thr];
    let mut fp = vec![vec![0u32; order.len()]; n_thr];

    for (idx, &pred_idx) in order.iter().enumerate() {
        let pred = &predictions[pred_idx];
        let (Some(gts), Some(locks)) = (
            ground_truth.get(&pred.video_id),
            locked.get_mut(pred.video_id.as_str()),
        ) else {
            for row in fp.iter_mut() {
                row[idx] = 1;
            }
            continue;
        };

        let ious = pairwise_temporal_iou(&[[pred.start, pred.end]], gts)
            .pop()
            .unwrap_or_default();
        let sorted = rank_descending(&ious);

        for (t_idx, &threshold) in temporal_iou_thresholds.iter().enumerate() {
            for &jdx in &sorted {
                if ious[jdx] < threshold {
                    break;
                }
                if locks[t_idx][jdx] {
                    continue;
                }
                tp[t_idx][idx] = 1;
                locks[t_idx][jdx] = true;
                break;
            }
            if tp[t_idx][idx] == 0 {
                fp[t_idx][idx] = 1;
            }
        }
    }

    let mut ap = Vec::with_capacity(n_thr);
    for t_idx in 0..n_thr {
        let mut tp_cum = 0.0f64;
        let mut fp_cum = 0.0f64;
        let mut precision = Vec::with_capacity(order.len());
        let mut recall = Vec::with_capacity(order.len());
        for idx in 0..order.len() {
            tp_cum += tp[t_idx][idx] as f64;
            fp_cum += fp[t_idx][idx] as f64;
            recall.push(tp_cum / num_gts as f64);
            precision.push(tp_cum / (tp_cum + fp_cum));
        }
        ap.push(interpolated_precision_recall(&precision, &recall)?);
    }
    Ok(ap)
}

/// Detection mAP: AP per ground-truth class and threshold, averaged over
/// classes. Detections with labels absent from the ground truth are ignored.
pub fn mean_average_precision_at_temporal_iou(
    ground_truth: &GroundTruth,
    detections: &[Detection],
    temporal_iou_thresholds: &[f64],
) -> Result<DetectionMap> {
    let mut by_class: BTreeMap<&str, BTreeMap<String, Vec<[f64; 2]>>> = BTreeMap::new();
    for (video_id, segments) in ground_truth {
        for seg in segments {
            by_class
                .entry(seg.label.as_str())
                .or_default()
                .entry(video_id.clone())
                .or_default()
                .push([seg.start, seg.end]);
        }
    }
    if by_class.is_empty() {
        return Err(EvalError::invalid("ground truth has no labelled segments"));
    }

    let ignored = detections
        .iter()
        .filter(|d| !by_class.contains_key(d.label.as_str()))
        .count();
    if ignored > 0 {
        tracing::warn!("{ignored} detections carry labels absent from the ground truth");
    }

    let mut per_class = BTreeMap::new();
    for (label, class_gt) in &by_class {
        let class_dets = detections
            .iter()
            .filter(|d| d.label == *label)
            .cloned()
            .collect::<Vec<_>>();
        let ap = average_precision_at_temporal_iou(class_gt, &class_dets, temporal_iou_thresholds)?;
        per_class.insert(label.to_string(), ap);
    }

    let per_threshold = (0..temporal_iou_thresholds.len())
        .map(|t| mean(&per_class.values().map(|ap| ap[t]).collect::<Vec<_>>()))
        .collect::<Vec<_>>();
    let mean_ap = mean(&per_threshold);

    Ok(DetectionMap {
        per_class,
        per_threshold,
        mean: mean_ap,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/temporal.rs"]
mod tests;
