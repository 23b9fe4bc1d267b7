//! Structured parsing of generation responses
//!
//! Models tend to wrap JSON in markdown fences or surround it with prose.
//! The first fenced block is tried first, then the outermost `{...}` and
//! `[...]` spans. A response none of whose candidates parses into the shape
//! a stage expects is an error; nothing is defaulted.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("no JSON payload found in response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected {expected}, got {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Candidate payloads in the order they are tried: the first fenced block,
/// then the outermost `{...}` and `[...]` spans by position.
fn candidates(response: &str) -> Vec<&str> {
    let trimmed = response.trim();
    let mut found = Vec::new();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            found.push(after_fence[..end].trim());
        }
    } else if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') || block.starts_with('[') {
                found.push(block);
            }
        }
    }

    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| match (trimmed.find(open), trimmed.rfind(close)) {
            (Some(start), Some(end)) if start < end => Some((start, &trimmed[start..=end])),
            _ => None,
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    found.extend(spans.into_iter().map(|(_, span)| span));

    found
}

/// Locate the most likely JSON payload inside a model response
pub fn extract_json_block(response: &str) -> Result<&str, ResponseError> {
    candidates(response)
        .into_iter()
        .next()
        .ok_or(ResponseError::NoJson)
}

/// Parse candidates until one is accepted.
///
/// Prose around the payload may itself contain brackets (`see [1]`), so a
/// span that fails to parse or has the wrong shape does not end the search.
/// The first error seen is reported when nothing is accepted.
fn parse_first<T>(
    response: &str,
    accept: impl Fn(Value) -> Result<T, ResponseError>,
) -> Result<T, ResponseError> {
    let mut first_err = None;

    for candidate in candidates(response) {
        let outcome = serde_json::from_str::<Value>(candidate)
            .map_err(ResponseError::from)
            .and_then(&accept);
        match outcome {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }

    Err(first_err.unwrap_or(ResponseError::NoJson))
}

/// Parse the payload of a response as JSON
pub fn parse_value(response: &str) -> Result<Value, ResponseError> {
    parse_first(response, Ok)
}

/// Expect a JSON object
pub fn parse_object(response: &str) -> Result<Map<String, Value>, ResponseError> {
    parse_first(response, |value| match value {
        Value::Object(map) => Ok(map),
        other => Err(ResponseError::UnexpectedShape {
            expected: "object",
            found: shape_name(&other),
        }),
    })
}

/// Expect a JSON array.
///
/// An object whose only field is an array (`{"queries": [...]}`), as
/// produced by backends that force object output, is unwrapped.
pub fn parse_array(response: &str) -> Result<Vec<Value>, ResponseError> {
    parse_first(response, |value| match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
            Some((_, Value::Array(items))) => Ok(items),
            _ => Err(ResponseError::UnexpectedShape {
                expected: "array",
                found: "object",
            }),
        },
        other => Err(ResponseError::UnexpectedShape {
            expected: "array",
            found: shape_name(&other),
        }),
    })
}

/// Expect an array of strings
pub fn parse_string_list(response: &str) -> Result<Vec<String>, ResponseError> {
    parse_array(response)?
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(ResponseError::UnexpectedShape {
                expected: "string",
                found: shape_name(&other),
            }),
        })
        .collect()
}

/// Expect an array of objects
pub fn parse_object_list(response: &str) -> Result<Vec<Value>, ResponseError> {
    let items = parse_array(response)?;
    if let Some(bad) = items.iter().find(|item| !item.is_object()) {
        return Err(ResponseError::UnexpectedShape {
            expected: "object",
            found: shape_name(bad),
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_block_from_fenced() {
        let text = "Here is the result:\n```json\n{\"key\": \"value\"}\n```\nDone.";
        assert_eq!(extract_json_block(text).unwrap(), "{\"key\": \"value\"}");
    }

    #[test]
    fn extract_json_block_from_plain_fence() {
        let text = "```\n[\"a\", \"b\"]\n```";
        assert_eq!(extract_json_block(text).unwrap(), "[\"a\", \"b\"]");
    }

    #[test]
    fn extract_json_block_from_bare() {
        let text = "Result: {\"key\": [1, 2]} thanks";
        assert_eq!(extract_json_block(text).unwrap(), "{\"key\": [1, 2]}");

        let text = "Queries: [\"水库调度 {模型}\"]";
        assert_eq!(extract_json_block(text).unwrap(), "[\"水库调度 {模型}\"]");
    }

    #[test]
    fn extract_json_block_no_json() {
        assert!(matches!(
            extract_json_block("No JSON here at all."),
            Err(ResponseError::NoJson)
        ));
        assert!(matches!(extract_json_block("} {"), Err(ResponseError::NoJson)));
    }

    #[test]
    fn test_bracketed_prose_before_object() {
        let text = "Based on the text [1], here is the result: {\"description\": \"水库调度\", \"aliases\": []}";
        let map = parse_object(text).unwrap();
        assert_eq!(map["description"], "水库调度");
        assert_eq!(map["aliases"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_braced_prose_before_array() {
        let text = "Queries for {水库调度}: [\"水库调度 原理\", \"reservoir operation\"]";
        assert_eq!(
            parse_string_list(text).unwrap(),
            vec!["水库调度 原理".to_string(), "reservoir operation".to_string()]
        );
    }

    #[test]
    fn test_parse_object_rejects_array() {
        let err = parse_object("[1]").unwrap_err();
        assert!(matches!(
            err,
            ResponseError::UnexpectedShape {
                expected: "object",
                found: "array"
            }
        ));
    }

    #[test]
    fn test_parse_malformed_json() {
        assert!(matches!(
            parse_object("{\"description\": }"),
            Err(ResponseError::Json(_))
        ));
    }

    #[test]
    fn test_parse_string_list() {
        assert_eq!(
            parse_string_list("[\"a\", \"b\"]").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            parse_string_list("{\"queries\": [\"a\"]}").unwrap(),
            vec!["a".to_string()]
        );
        assert!(parse_string_list("[\"a\", 1]").is_err());
        assert!(parse_string_list("{\"a\": [], \"b\": []}").is_err());
    }

    #[test]
    fn test_parse_object_list() {
        let items = parse_object_list("[{\"target_label\": \"x\"}]").unwrap();
        assert_eq!(items.len(), 1);
        assert!(parse_object_list("[{}, \"x\"]").is_err());
        assert!(parse_object_list("[]").unwrap().is_empty());
    }
}
