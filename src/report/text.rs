use crate::metrics::MetricValue;
use crate::report::{EvalSummary, format_f64_6};

pub fn render_report_text(summary: &EvalSummary) -> String {
    let mut out = String::new();

    out.push_str("Action Evaluation Report\n");
    out.push_str("========================\n\n");

    out.push_str("1. Run\n");
    out.push_str(&format!("Tool: {} {}\n", summary.tool, summary.version));
    out.push_str(&format!("Task: {}\n", summary.task));
    out.push_str(&format!(
        "Dataset: {} ({} samples)\n",
        summary.dataset, summary.n_samples
    ));
    out.push_str(&format!("Metrics: {}\n\n", summary.metrics.join(", ")));

    out.push_str("2. Options\n");
    match summary.options.max_avg_proposals {
        Some(max) => out.push_str(&format!("Max avg proposals: {}\n", format_f64_6(max))),
        None => out.push_str("Max avg proposals: proposals per video\n"),
    }
    out.push_str(&format!(
        "Temporal IoU thresholds: {}\n",
        join_values(&summary.options.temporal_iou_thresholds)
    ));
    out.push_str(&format!(
        "Top-k: {}\n\n",
        summary
            .options
            .topk
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));

    out.push_str("3. Scalar metrics\n");
    let scalars = summary.scalars();
    if scalars.is_empty() {
        out.push_str("(none)\n");
    }
    for (name, value) in scalars {
        out.push_str(&format!("{name}: {}\n", format_f64_6(value)));
    }

    let mut header = false;
    for (name, value) in &summary.results {
        let rows = match value {
            MetricValue::Scalar(_) => continue,
            MetricValue::Vector(v) => vec![v.clone()],
            MetricValue::Matrix(m) => m.clone(),
        };
        if !header {
            out.push_str("\n4. Vector and matrix metrics\n");
            header = true;
        }
        let width = rows.first().map_or(0, Vec::len);
        out.push_str(&format!("{name} ({}x{width}):\n", rows.len()));
        for row in rows {
            out.push_str(&format!("  {}\n", join_values(&row)));
        }
    }

    out
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_f64_6(*v))
        .collect::<Vec<_>>()
        .join(" ")
}
