use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub mod annotations;
pub mod results;

pub use annotations::{
    RecognitionRecord, SegmentAnnotation, VideoRecord, load_localization_annotations,
    load_recognition_annotations,
};
pub use results::{
    ProposalDump, ProposalEntry, ProposalResult, TemporalScoreRow, TemporalScores,
    load_proposal_dump, load_proposal_results, load_score_matrix, load_temporal_scores,
};

/// Opens `path` for reading, decompressing on the fly when it ends in `.gz`.
pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = open_maybe_gz(path)?;
    let value = serde_json::from_reader(reader)?;
    tracing::debug!("loaded {}", path.display());
    Ok(value)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
