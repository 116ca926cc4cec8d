//! Locates the JSON object a model embedded in its free-form completion.
//!
//! The primary locator is deliberately permissive: everything from the first
//! `{` to the last `}`. When that span does not parse (prose with stray braces
//! around the payload, several objects), each balanced top-level object is
//! tried in order instead.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::AnalysisResult;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no JSON found in completion")]
    NoJson { raw: String },

    #[error("malformed JSON in completion: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn extract_result(completion: &str) -> Result<AnalysisResult, ExtractionError> {
    let span = greedy_span(completion).ok_or_else(|| ExtractionError::NoJson {
        raw: completion.to_string(),
    })?;

    let source = match serde_json::from_str::<Map<String, Value>>(span) {
        Ok(object) => return Ok(AnalysisResult(object)),
        Err(e) => e,
    };

    tracing::debug!("Greedy JSON span did not parse, scanning balanced objects");
    balanced_objects(completion)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Map<String, Value>>(candidate).ok())
        .map(AnalysisResult)
        .ok_or_else(|| ExtractionError::Malformed {
            raw: completion.to_string(),
            source,
        })
}

/// First `{` through last `}`, inclusive.
fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Top-level `{...}` fragments with balanced braces, skipping braces inside
/// JSON string literals.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    objects
}
