//! Rendering of a finished run for standard output.
use crate::bundle::Bundle;
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};

/// One labeled block per step output, in step order.
pub fn render_text(pipeline: &Pipeline, bundle: &Bundle) -> String {
    let mut out = String::new();
    for step in pipeline.steps() {
        let body = bundle.get(step.output_key()).unwrap_or_default();
        out.push_str(&format!("\n-------- {} --------\n\n", step.label()));
        out.push_str(body);
        out.push('\n');
    }
    out
}

/// The whole bundle, inputs included, as pretty JSON.
pub fn render_json(bundle: &Bundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).context("serialize result bundle")
}

/// Human-readable listing of every step's template.
pub fn render_prompts(pipeline: &Pipeline) -> String {
    let mut out = format!("inputs: {}\n", pipeline.required_inputs().join(", "));
    for (idx, step) in pipeline.steps().iter().enumerate() {
        let template = step.template();
        out.push_str(&format!(
            "\n== step {}: {} ({} -> {})\n\n",
            idx + 1,
            template.name(),
            template.required_fields().join(", "),
            step.output_key()
        ));
        out.push_str(template.pattern().trim_end());
        out.push('\n');
    }
    out
}
