//! Sequential step orchestration.
//!
//! A pipeline is an ordered list of steps, each rendering one template against
//! the running bundle and storing the model's completion under its output key.
//! Field wiring between steps is checked when the pipeline is built, so `run`
//! can only fail on missing initial inputs or backend errors.
use crate::backend::ModelBackend;
use crate::bundle::Bundle;
use crate::error::{ChainError, PipelineError};
use crate::template::PromptTemplate;
use std::collections::BTreeSet;
use std::time::Instant;

/// One template-render-then-invoke unit.
#[derive(Debug, Clone)]
pub struct Step {
    template: PromptTemplate,
    output_key: String,
    label: Option<String>,
    overwrite: bool,
}

impl Step {
    pub fn new(template: PromptTemplate, output_key: impl Into<String>) -> Self {
        Self {
            template,
            output_key: output_key.into(),
            label: None,
            overwrite: false,
        }
    }

    /// A step allowed to replace an existing bundle key.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn overwriting(template: PromptTemplate, output_key: impl Into<String>) -> Self {
        Self {
            overwrite: true,
            ..Self::new(template, output_key)
        }
    }

    /// Human-readable heading used when printing this step's output.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    /// Label for display, falling back to the output key.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.output_key)
    }
}

/// Validated, ordered chain of steps.
#[derive(Debug, Clone)]
pub struct Pipeline {
    required_inputs: Vec<String>,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Build a pipeline, checking that every step's fields are provided by the
    /// initial inputs or an earlier step and that no output key collides.
    pub fn new(required_inputs: &[&str], steps: Vec<Step>) -> Result<Self, PipelineError> {
        if steps.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut available: BTreeSet<&str> = required_inputs.iter().copied().collect();
        for (idx, step) in steps.iter().enumerate() {
            let number = idx + 1;
            if let Some(field) = step
                .template
                .required_fields()
                .iter()
                .find(|field| !available.contains(field.as_str()))
            {
                return Err(PipelineError::UnboundField {
                    step: number,
                    template: step.template.name().to_string(),
                    field: field.clone(),
                });
            }
            if step.output_key.trim().is_empty() {
                return Err(PipelineError::EmptyOutputKey { step: number });
            }
            if !available.insert(step.output_key.as_str()) && !step.overwrite {
                return Err(PipelineError::OutputCollision {
                    step: number,
                    key: step.output_key.clone(),
                });
            }
        }

        Ok(Self {
            required_inputs: required_inputs.iter().map(|s| s.to_string()).collect(),
            steps,
        })
    }

    pub fn required_inputs(&self) -> &[String] {
        &self.required_inputs
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Output keys in step order.
    pub fn output_keys(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(Step::output_key)
    }

    /// Run every step in order against `initial`.
    ///
    /// Returns the initial fields plus every step output. Initial fields that a
    /// non-overwriting step would replace are rejected before any model call.
    /// The first error aborts the run; no partial bundle is returned.
    pub fn run(&self, backend: &dyn ModelBackend, initial: Bundle) -> Result<Bundle, ChainError> {
        if let Some(missing) = self
            .required_inputs
            .iter()
            .find(|field| !initial.contains(field))
        {
            return Err(ChainError::MissingField {
                field: missing.clone(),
                context: "pipeline inputs".to_string(),
            });
        }

        if let Some((idx, step)) = self
            .steps
            .iter()
            .enumerate()
            .find(|(_, step)| !step.overwrite && initial.contains(&step.output_key))
        {
            return Err(ChainError::OutputCollision {
                step: idx + 1,
                key: step.output_key.clone(),
            });
        }

        let mut bundle = initial;
        let total = self.steps.len();
        for (idx, step) in self.steps.iter().enumerate() {
            let prompt = step.template.render(&bundle)?;
            tracing::debug!(step = idx + 1, prompt = %prompt, "rendered prompt");

            let start = Instant::now();
            let response = backend.generate(&prompt)?;
            tracing::info!(
                step = idx + 1,
                total,
                template = step.template.name(),
                output_key = step.output_key(),
                prompt_bytes = prompt.len(),
                response_bytes = response.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "step complete"
            );

            bundle.insert(step.output_key.clone(), response);
        }
        Ok(bundle)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
