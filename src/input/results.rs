use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input::read_json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalEntry {
    pub segment: [f64; 2],
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Inference output of a proposal generator for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalResult {
    pub video_name: String,
    pub proposal_list: Vec<ProposalEntry>,
}

/// The JSON dump layout: `{version, results, external_data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDump {
    pub version: String,
    pub results: BTreeMap<String, Vec<ProposalEntry>>,
    #[serde(default)]
    pub external_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalScoreRow {
    pub action: f64,
    pub start: f64,
    pub end: f64,
    pub tmin: f64,
    pub tmax: f64,
}

/// Per-location action/start/end probabilities of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalScores {
    pub video_name: String,
    pub rows: Vec<TemporalScoreRow>,
}

pub fn load_proposal_results(path: &Path) -> Result<Vec<ProposalResult>> {
    read_json(path)
}

pub fn load_proposal_dump(path: &Path) -> Result<ProposalDump> {
    read_json(path)
}

pub fn load_temporal_scores(path: &Path) -> Result<Vec<TemporalScores>> {
    read_json(path)
}

/// One row of class scores per sample.
pub fn load_score_matrix(path: &Path) -> Result<Vec<Vec<f64>>> {
    read_json(path)
}
