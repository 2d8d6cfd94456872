pub mod json;
pub mod text;

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::EvalOptions;
use crate::dataset::Metric;
use crate::error::Result;
use crate::metrics::EvalResults;

pub use json::render_summary_json;
pub use text::render_report_text;

#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    pub tool: String,
    pub version: String,
    /// `localization` or `recognition`.
    pub task: String,
    pub dataset: String,
    pub n_samples: usize,
    pub metrics: Vec<String>,
    pub options: EvalOptions,
    pub results: EvalResults,
}

impl EvalSummary {
    pub fn new(
        task: &str,
        dataset: &str,
        n_samples: usize,
        metrics: &[Metric],
        options: &EvalOptions,
        results: EvalResults,
    ) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            task: task.to_string(),
            dataset: dataset.to_string(),
            n_samples,
            metrics: metrics.iter().map(|m| m.as_str().to_string()).collect(),
            options: options.clone(),
            results,
        }
    }

    /// Scalar results in key order.
    pub fn scalars(&self) -> Vec<(&str, f64)> {
        self.results
            .iter()
            .filter_map(|(k, v)| v.as_scalar().map(|s| (k.as_str(), s)))
            .collect()
    }
}

pub fn format_f64_6(v: f64) -> String {
    format!("{:.6}", v)
}

/// Writes `summary.json` and `report.txt` into `out_dir`.
pub fn write_reports(summary: &EvalSummary, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;

    let summary_path = out_dir.join("summary.json");
    write_text(&summary_path, &render_summary_json(summary)?)?;

    let report_path = out_dir.join("report.txt");
    write_text(&report_path, &render_report_text(summary))?;

    tracing::info!("reports written to {}", out_dir.display());
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    let mut w = BufWriter::new(fs::File::create(path)?);
    w.write_all(text.as_bytes())?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
