//! Typed prompt templates.
//!
//! A template is parsed once, at construction, into literal and field
//! segments. The set of `{field}` placeholders must match the declared field
//! list exactly, so a template that builds can only fail to render when the
//! bundle lacks one of its fields.
use crate::bundle::Bundle;
use crate::error::{ChainError, TemplateError};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Immutable prompt pattern with a declared set of required fields.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    pattern: String,
    fields: Vec<String>,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `pattern` and check its placeholders against `fields`.
    ///
    /// `{{` and `}}` produce literal braces.
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        fields: &[&str],
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        let pattern = pattern.into();

        let mut declared = BTreeSet::new();
        for field in fields {
            if !declared.insert(*field) {
                return Err(TemplateError::DuplicateField {
                    template: name,
                    field: field.to_string(),
                });
            }
        }

        let segments = parse_segments(&name, &pattern)?;
        let mut used = BTreeSet::new();
        for segment in &segments {
            if let Segment::Field(field) = segment {
                if !declared.contains(field.as_str()) {
                    return Err(TemplateError::UndeclaredPlaceholder {
                        template: name,
                        field: field.clone(),
                    });
                }
                used.insert(field.as_str());
            }
        }
        if let Some(unused) = fields.iter().find(|field| !used.contains(**field)) {
            return Err(TemplateError::UnusedField {
                template: name,
                field: unused.to_string(),
            });
        }

        Ok(Self {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            name,
            pattern,
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Declared fields, in declaration order.
    pub fn required_fields(&self) -> &[String] {
        &self.fields
    }

    /// Substitute every placeholder from `bundle`.
    ///
    /// Substituted values are copied verbatim and never re-scanned.
    pub fn render(&self, bundle: &Bundle) -> Result<String, ChainError> {
        if let Some(missing) = self.fields.iter().find(|field| !bundle.contains(field)) {
            return Err(ChainError::MissingField {
                field: missing.clone(),
                context: format!("template '{}'", self.name),
            });
        }

        let mut rendered = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field(field) => rendered.push_str(bundle.get(field).unwrap_or_default()),
            }
        }
        Ok(rendered)
    }
}

fn parse_segments(name: &str, pattern: &str) -> Result<Vec<Segment>, TemplateError> {
    let malformed = |offset: usize, reason: &'static str| TemplateError::Malformed {
        template: name.to_string(),
        offset,
        reason,
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '{' => {
                if chars.next_if(|(_, next)| *next == '{').is_some() {
                    literal.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    field.push(inner);
                }
                if !closed {
                    return Err(malformed(idx, "unclosed placeholder"));
                }
                if !is_identifier(&field) {
                    return Err(malformed(idx, "placeholder is not an identifier"));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(field));
            }
            '}' => {
                if chars.next_if(|(_, next)| *next == '}').is_none() {
                    return Err(malformed(idx, "unmatched '}'"));
                }
                literal.push('}');
            }
            _ => literal.push(ch),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
