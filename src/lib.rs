//! Evaluation of video action recognition and temporal action localization
//! results: metric functions, dataset wrappers, a training-loop hook and the
//! evaluation-time aligner embedding.

pub mod config;
pub mod dataset;
pub mod error;
pub mod hook;
pub mod input;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod report;

pub use error::{EvalError, Result};
