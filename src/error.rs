use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid annotation for {video}: {reason}")]
    InvalidAnnotation { video: String, reason: String },

    #[error("metric {0} is not supported")]
    UnsupportedMetric(String),

    #[error("the output format {0} is not supported")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn shape(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch(reason.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn annotation(video: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAnnotation {
            video: video.into(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
#[path = "../tests/src_inline/error.rs"]
mod tests;
