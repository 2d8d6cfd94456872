use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::input::read_json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnnotation {
    pub segment: [f64; 2],
    pub label: String,
}

/// One entry of a localization annotation file. `video_name` is the key the
/// entry was stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(default)]
    pub video_name: String,
    pub duration_second: f64,
    #[serde(default)]
    pub duration_frame: Option<u64>,
    #[serde(default)]
    pub annotations: Vec<SegmentAnnotation>,
    #[serde(default)]
    pub feature_frame: Option<u64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub rfps: Option<f64>,
}

impl VideoRecord {
    fn validate(&self) -> Result<()> {
        if !self.duration_second.is_finite() || self.duration_second < 0.0 {
            return Err(EvalError::annotation(
                &self.video_name,
                format!("invalid duration_second {}", self.duration_second),
            ));
        }
        if let Some(fps) = self.fps
            && (!fps.is_finite() || fps <= 0.0)
        {
            return Err(EvalError::annotation(
                &self.video_name,
                format!("invalid fps {fps}"),
            ));
        }
        for (idx, ann) in self.annotations.iter().enumerate() {
            let [start, end] = ann.segment;
            if !start.is_finite() || !end.is_finite() {
                return Err(EvalError::annotation(
                    &self.video_name,
                    format!("annotation {idx} has a non-finite segment"),
                ));
            }
            if end < start {
                return Err(EvalError::annotation(
                    &self.video_name,
                    format!("annotation {idx} ends at {end} before it starts at {start}"),
                ));
            }
        }
        Ok(())
    }
}

/// Loads a `video_name -> record` annotation file. Records come back ordered
/// by video name.
pub fn load_localization_annotations(path: &Path) -> Result<Vec<VideoRecord>> {
    let database: BTreeMap<String, VideoRecord> = read_json(path)?;
    let mut records = Vec::with_capacity(database.len());
    for (video_name, mut record) in database {
        record.video_name = video_name;
        record.validate()?;
        records.push(record);
    }
    tracing::info!(
        "loaded {} localization records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRecord {
    pub filename: String,
    pub label: usize,
}

pub fn load_recognition_annotations(path: &Path) -> Result<Vec<RecognitionRecord>> {
    let records: Vec<RecognitionRecord> = read_json(path)?;
    tracing::info!(
        "loaded {} recognition records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}
