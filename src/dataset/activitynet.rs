//! ActivityNet-style temporal action localization dataset.
//!
//! The annotation file maps every video name to its duration, frame counts
//! and labelled segments:
//!
//! ```json
//! {
//!     "v_--1DO2V4K74": {
//!         "duration_second": 211.53,
//!         "duration_frame": 6337,
//!         "annotations": [{"segment": [30.02, 205.23], "label": "Rock climbing"}],
//!         "feature_frame": 6336,
//!         "fps": 30.0,
//!         "rfps": 29.95
//!     }
//! }
//! ```
//!
//! Evaluation keys videos by their id, i.e. the name without the `v_` prefix.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::config::EvalOptions;
use crate::dataset::pipeline::{Pipeline, Sample};
use crate::dataset::{EvaluableDataset, Metric};
use crate::error::{EvalError, Result};
use crate::input::{
    ProposalDump, ProposalEntry, ProposalResult, TemporalScores, VideoRecord,
    load_localization_annotations,
};
use crate::metrics::{
    Detection, EvalResults, GroundTruth, GroundTruthSegment, MetricValue, Proposal, Proposals,
    average_recall_at_avg_proposals, mean, mean_average_precision_at_temporal_iou,
};

pub const DEFAULT_DUMP_VERSION: &str = "VERSION 1.3";

const CSV_HEADER: &str = "action,start,end,tmin,tmax";

/// Recall columns reported under `AR@{n}`; column `n - 1` of the curve.
const REPORTED_RECALLS: [usize; 4] = [1, 5, 10, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(EvalError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// What `dump_results` writes: proposals go to JSON, temporal score rows
/// to per-video CSV files.
#[derive(Debug, Clone, Copy)]
pub enum DumpPayload<'a> {
    Proposals(&'a [ProposalResult]),
    TemporalScores(&'a [TemporalScores]),
}

pub fn video_id(video_name: &str) -> &str {
    video_name.strip_prefix("v_").unwrap_or(video_name)
}

/// Finite segment with `start <= end` and a finite score.
fn is_valid_entry(video_name: &str, idx: usize, entry: &ProposalEntry) -> bool {
    let [start, end] = entry.segment;
    let valid = start.is_finite() && end.is_finite() && entry.score.is_finite() && start <= end;
    if !valid {
        tracing::warn!(
            "skipping proposal {idx} of {video_name}: segment [{start}, {end}], score {}",
            entry.score
        );
    }
    valid
}

#[derive(Debug)]
pub struct ActivityNetDataset {
    records: Vec<VideoRecord>,
    pipeline: Pipeline,
    test_mode: bool,
}

impl ActivityNetDataset {
    pub fn new(records: Vec<VideoRecord>, pipeline: Pipeline, test_mode: bool) -> Self {
        Self {
            records,
            pipeline,
            test_mode,
        }
    }

    pub fn from_annotation_file(path: &Path, pipeline: Pipeline, test_mode: bool) -> Result<Self> {
        let records = load_localization_annotations(path)?;
        Ok(Self::new(records, pipeline, test_mode))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn records(&self) -> &[VideoRecord] {
        &self.records
    }

    pub fn record(&self, idx: usize) -> Option<&VideoRecord> {
        self.records.get(idx)
    }

    /// Runs a copy of record `idx` through the pipeline. Training and
    /// testing share the same path.
    pub fn prepare_frames(&self, idx: usize) -> Result<Sample> {
        let record = self.records.get(idx).ok_or_else(|| {
            EvalError::invalid(format!(
                "index {idx} out of range for {} records",
                self.records.len()
            ))
        })?;
        self.pipeline.run(Sample::new(record.clone()))
    }

    pub fn import_ground_truth(&self) -> GroundTruth {
        let mut ground_truth = GroundTruth::new();
        for record in &self.records {
            let segments = record
                .annotations
                .iter()
                .map(|ann| GroundTruthSegment {
                    start: ann.segment[0],
                    end: ann.segment[1],
                    label: ann.label.clone(),
                })
                .collect();
            ground_truth.insert(video_id(&record.video_name).to_string(), segments);
        }
        ground_truth
    }

    /// Builds the proposal mapping and counts every proposal kept. Entries
    /// with a reversed or non-finite segment or score are skipped.
    pub fn import_proposals(&self, results: &[ProposalResult]) -> (Proposals, usize) {
        let mut proposals = Proposals::new();
        let mut num_proposals = 0usize;
        for result in results {
            let list = result
                .proposal_list
                .iter()
                .enumerate()
                .filter(|(idx, p)| is_valid_entry(&result.video_name, *idx, p))
                .map(|(_, p)| Proposal {
                    start: p.segment[0],
                    end: p.segment[1],
                    score: p.score,
                })
                .collect::<Vec<_>>();
            num_proposals += list.len();
            proposals.insert(video_id(&result.video_name).to_string(), list);
        }
        self.warn_unknown_videos(proposals.keys().map(String::as_str));
        (proposals, num_proposals)
    }

    /// Labelled proposals as detections. Unlabelled and invalid proposals
    /// are skipped.
    pub fn import_detections(&self, results: &[ProposalResult]) -> Vec<Detection> {
        results
            .iter()
            .flat_map(|result| {
                let id = video_id(&result.video_name);
                result
                    .proposal_list
                    .iter()
                    .enumerate()
                    .filter(move |(idx, p)| is_valid_entry(&result.video_name, *idx, p))
                    .filter_map(move |(_, p)| {
                        p.label.as_ref().map(|label| Detection {
                            video_id: id.to_string(),
                            start: p.segment[0],
                            end: p.segment[1],
                            label: label.clone(),
                            score: p.score,
                        })
                    })
            })
            .collect()
    }

    pub fn proposals_to_json(
        &self,
        results: &[ProposalResult],
    ) -> BTreeMap<String, Vec<ProposalEntry>> {
        tracing::info!("converting {} proposal results to json", results.len());
        results
            .iter()
            .map(|r| (video_id(&r.video_name).to_string(), r.proposal_list.clone()))
            .collect()
    }

    pub fn dump_results(
        &self,
        results: DumpPayload<'_>,
        out: &Path,
        format: OutputFormat,
        version: &str,
    ) -> Result<()> {
        match (format, results) {
            (OutputFormat::Json, DumpPayload::Proposals(results)) => {
                let dump = ProposalDump {
                    version: version.to_string(),
                    results: self.proposals_to_json(results),
                    external_data: serde_json::Map::new(),
                };
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut w = BufWriter::new(File::create(out)?);
                serde_json::to_writer(&mut w, &dump)?;
                w.flush()?;
                tracing::info!("dumped {} videos to {}", dump.results.len(), out.display());
                Ok(())
            }
            (OutputFormat::Csv, DumpPayload::TemporalScores(results)) => {
                fs::create_dir_all(out)?;
                for result in results {
                    let path = out.join(format!("{}.csv", result.video_name));
                    let mut w = BufWriter::new(File::create(&path)?);
                    writeln!(w, "{CSV_HEADER}")?;
                    for row in &result.rows {
                        writeln!(
                            w,
                            "{},{},{},{},{}",
                            row.action, row.start, row.end, row.tmin, row.tmax
                        )?;
                    }
                    w.flush()?;
                }
                tracing::info!("dumped {} csv files to {}", results.len(), out.display());
                Ok(())
            }
            (OutputFormat::Json, DumpPayload::TemporalScores(_)) => Err(
                EvalError::UnsupportedFormat("json for temporal score rows".to_string()),
            ),
            (OutputFormat::Csv, DumpPayload::Proposals(_)) => Err(EvalError::UnsupportedFormat(
                "csv for proposal lists".to_string(),
            )),
        }
    }

    fn warn_unknown_videos<'a>(&self, ids: impl Iterator<Item = &'a str>) {
        let known = self
            .records
            .iter()
            .map(|r| video_id(&r.video_name))
            .collect::<BTreeSet<_>>();
        let unknown = ids.filter(|id| !known.contains(id)).count();
        if unknown > 0 {
            tracing::warn!("{unknown} result videos are absent from the annotations");
        }
    }

    fn evaluate_average_recall(
        &self,
        results: &[ProposalResult],
        options: &EvalOptions,
        eval_results: &mut EvalResults,
    ) -> Result<()> {
        let ground_truth = self.import_ground_truth();
        let (proposals, num_proposals) = self.import_proposals(results);
        let curve = average_recall_at_avg_proposals(
            &ground_truth,
            &proposals,
            num_proposals,
            options.max_avg_proposals,
            &options.temporal_iou_thresholds,
        )?;

        eval_results.insert("auc".to_string(), MetricValue::Scalar(curve.auc));
        for n in REPORTED_RECALLS {
            let column = curve
                .recall
                .iter()
                .map(|row| row[n - 1])
                .collect::<Vec<_>>();
            eval_results.insert(format!("AR@{n}"), MetricValue::Scalar(mean(&column)));
        }
        Ok(())
    }

    fn evaluate_detection_map(
        &self,
        results: &[ProposalResult],
        options: &EvalOptions,
        eval_results: &mut EvalResults,
    ) -> Result<()> {
        let detections = self.import_detections(results);
        if detections.is_empty() {
            return Err(EvalError::invalid(
                "mAP needs proposals that carry a label",
            ));
        }
        let map = mean_average_precision_at_temporal_iou(
            &self.import_ground_truth(),
            &detections,
            &options.temporal_iou_thresholds,
        )?;

        eval_results.insert("mAP".to_string(), MetricValue::Scalar(map.mean));
        for (threshold, value) in options.temporal_iou_thresholds.iter().zip(&map.per_threshold) {
            eval_results.insert(
                format!("mAP@{threshold:.2}"),
                MetricValue::Scalar(*value),
            );
        }
        Ok(())
    }
}

impl EvaluableDataset for ActivityNetDataset {
    type Output = ProposalResult;

    fn name(&self) -> &'static str {
        "ActivityNetDataset"
    }

    fn allowed_metrics(&self) -> &'static [Metric] {
        &[Metric::ArAn, Metric::DetectionMap]
    }

    fn evaluate(
        &self,
        results: &[ProposalResult],
        metrics: &[Metric],
        options: &EvalOptions,
    ) -> Result<EvalResults> {
        self.check_metrics(metrics)?;
        let mut eval_results = EvalResults::new();
        for metric in metrics {
            tracing::debug!("evaluating {metric} over {} results", results.len());
            match metric {
                Metric::ArAn => self.evaluate_average_recall(results, options, &mut eval_results)?,
                Metric::DetectionMap => {
                    self.evaluate_detection_map(results, options, &mut eval_results)?
                }
                other => return Err(EvalError::UnsupportedMetric(other.to_string())),
            }
        }
        Ok(eval_results)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/dataset/activitynet.rs"]
mod tests;
