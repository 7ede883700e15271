//! Extraction of JSON values and numbers from free-form responses.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::Value;

static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"```(?:json)?\s*([\s\S]*?)\s*```")
        .case_insensitive(true)
        .build()
        .unwrap()
});

static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?").unwrap()
});

/// Why no JSON value could be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonExtractError {
    /// The response is empty.
    #[error("empty response")]
    Empty,
    /// No `{` or `[` starts a valid document.
    #[error("no JSON value found")]
    NotFound,
}

/// First parseable JSON value, preferring a fenced code block.
///
/// Every `{` or `[` of a candidate is tried left to right; the first one
/// that starts a complete document wins. Trailing text is ignored.
pub fn extract_first_json(text: &str) -> Result<Value, JsonExtractError> {
    if text.is_empty() {
        return Err(JsonExtractError::Empty);
    }

    let mut candidates = Vec::with_capacity(2);
    if let Some(fenced) = FENCE_REGEX.captures(text).and_then(|c| c.get(1)) {
        candidates.push(fenced.as_str().trim());
    }
    candidates.push(text);

    for candidate in candidates {
        for (start, _) in candidate.match_indices(|c: char| c == '{' || c == '[') {
            let mut stream =
                serde_json::Deserializer::from_str(&candidate[start..]).into_iter::<Value>();
            if let Some(Ok(value)) = stream.next() {
                return Ok(value);
            }
        }
    }
    Err(JsonExtractError::NotFound)
}

/// First number in `text`, commas ignored.
///
/// With `scope`, only the first match of that pattern is searched. Returns
/// `Ok(None)` when no number is found and `Err` when `scope` is invalid.
pub fn extract_first_number(text: &str, scope: Option<&str>) -> Result<Option<f64>, regex::Error> {
    if text.is_empty() {
        return Ok(None);
    }
    let source = match scope {
        Some(pattern) => {
            let re = RegexBuilder::new(pattern).multi_line(true).build()?;
            match re.find(text) {
                Some(m) => m.as_str(),
                None => return Ok(None),
            }
        }
        None => text,
    };

    let cleaned = source.replace(',', "");
    Ok(NUMBER_REGEX
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok()))
}
