use crate::error::Result;
use crate::report::EvalSummary;

/// Pretty-printed summary. Matrix and vector metrics keep their nesting.
pub fn render_summary_json(summary: &EvalSummary) -> Result<String> {
    let mut out = serde_json::to_string_pretty(summary)?;
    out.push('\n');
    Ok(out)
}
