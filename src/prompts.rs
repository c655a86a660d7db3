//! Built-in prompts and the two-agent crisis pipeline.
use crate::pipeline::{Pipeline, Step};
use crate::template::PromptTemplate;
use anyhow::{Context, Result};

pub const ISSUE_FIELD: &str = "issue";
pub const CRISIS_RESPONSE_KEY: &str = "crisis_response";
pub const LEGAL_RESPONSE_KEY: &str = "legal_response";

/// Crisis used when the caller supplies none.
pub const DEFAULT_ISSUE: &str =
    "Kia recalls 80,000 vehicles due to faulty wiring, improper air bag deployment";

// Prompt templates loaded at compile time
const CRISIS_STATEMENT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/crisis_statement.md"
));
const LEGAL_REVIEW: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/legal_review.md"
));

/// Crisis-management agent: drafts a press statement for `{issue}`.
pub fn crisis_drafting() -> Result<PromptTemplate> {
    PromptTemplate::new("crisis_drafting", CRISIS_STATEMENT, &[ISSUE_FIELD])
        .context("build crisis drafting template")
}

/// Legal agent: revises `{crisis_response}` to avoid admissions of liability.
///
/// The revised statement and the note on what changed share one output.
pub fn legal_review() -> Result<PromptTemplate> {
    PromptTemplate::new("legal_review", LEGAL_REVIEW, &[CRISIS_RESPONSE_KEY])
        .context("build legal review template")
}

/// Draft, then legally revise: `issue` -> `crisis_response` -> `legal_response`.
pub fn crisis_pipeline() -> Result<Pipeline> {
    let steps = vec![
        Step::new(crisis_drafting()?, CRISIS_RESPONSE_KEY)
            .with_label("Crisis Management Statement"),
        Step::new(legal_review()?, LEGAL_RESPONSE_KEY)
            .with_label("Final Legal-Safe Press Statement"),
    ];
    Pipeline::new(&[ISSUE_FIELD], steps).context("assemble crisis pipeline")
}
