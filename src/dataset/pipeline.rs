use crate::error::{EvalError, Result};
use crate::input::VideoRecord;

/// A record on its way through the transform pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub record: VideoRecord,
    /// Segments normalised to `[0, 1]` of the feature-covered duration.
    pub gt_bbox: Option<Vec<[f64; 2]>>,
    /// Segments as frame indices.
    pub frame_segments: Option<Vec<[u64; 2]>>,
}

impl Sample {
    pub fn new(record: VideoRecord) -> Self {
        Self {
            record,
            gt_bbox: None,
            frame_segments: None,
        }
    }
}

pub trait Transform {
    fn name(&self) -> &'static str;

    fn apply(&self, sample: Sample) -> Result<Sample>;
}

#[derive(Default)]
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn run(&self, mut sample: Sample) -> Result<Sample> {
        for transform in &self.transforms {
            tracing::trace!(
                "applying {} to {}",
                transform.name(),
                sample.record.video_name
            );
            sample = transform.apply(sample)?;
        }
        Ok(sample)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.transforms.iter().map(|t| t.name()))
            .finish()
    }
}

/// Normalises annotation segments over the duration actually covered by
/// features (`feature_frame / duration_frame * duration_second`), clamped to
/// `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateLocalizationLabels;

impl Transform for GenerateLocalizationLabels {
    fn name(&self) -> &'static str {
        "GenerateLocalizationLabels"
    }

    fn apply(&self, mut sample: Sample) -> Result<Sample> {
        let record = &sample.record;
        let corrected_second = match (record.feature_frame, record.duration_frame) {
            (Some(feature), Some(duration)) if duration > 0 => {
                feature as f64 / duration as f64 * record.duration_second
            }
            _ => record.duration_second,
        };
        if corrected_second <= 0.0 {
            return Err(EvalError::annotation(
                &record.video_name,
                "cannot normalise segments of a zero-length video",
            ));
        }

        let bbox = record
            .annotations
            .iter()
            .map(|ann| {
                [
                    (ann.segment[0] / corrected_second).clamp(0.0, 1.0),
                    (ann.segment[1] / corrected_second).clamp(0.0, 1.0),
                ]
            })
            .collect();
        sample.gt_bbox = Some(bbox);
        Ok(sample)
    }
}

/// Converts annotation segments from seconds to frame indices using the
/// record's `fps`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondsToFrames;

impl Transform for SecondsToFrames {
    fn name(&self) -> &'static str {
        "SecondsToFrames"
    }

    fn apply(&self, mut sample: Sample) -> Result<Sample> {
        let Some(fps) = sample.record.fps else {
            return Err(EvalError::annotation(
                &sample.record.video_name,
                "fps is required to convert segments to frames",
            ));
        };
        let frames = sample
            .record
            .annotations
            .iter()
            .map(|ann| {
                [
                    (ann.segment[0] * fps).floor().max(0.0) as u64,
                    (ann.segment[1] * fps).ceil().max(0.0) as u64,
                ]
            })
            .collect();
        sample.frame_segments = Some(frames);
        Ok(sample)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/dataset/pipeline.rs"]
mod tests;
