//! Response sanitizer and roadmap schema validator
//!
//! Two policies live here on purpose side by side: `clean_model_text` is lenient and
//! never fails (used by goal classification), while `parse_roadmap` is strict and
//! rejects the whole batch on the first malformed item.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::roadmap::RoadmapItem;

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("fence regex is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("roadmap payload is not valid JSON: {0}")]
    Parse(String),
    #[error("roadmap payload must be an array, found {found}")]
    NotAnArray { found: &'static str },
    #[error("item at index {index} is not an object")]
    ItemNotObject { index: usize },
    #[error("item at index {index}: field `{field}` {reason}")]
    InvalidItem {
        index: usize,
        field: &'static str,
        reason: String,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Remove a surrounding ```lang ... ``` fence if present
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match FENCED.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Lenient cleanup of free-text model output: fences, enclosing quotes, escapes
pub fn clean_model_text(raw: &str) -> String {
    let text = strip_code_fences(raw);

    let quoted = text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')));
    if !quoted {
        return text.to_string();
    }

    // A JSON string literal decodes exactly; anything else gets a best-effort pass
    if let Ok(decoded) = serde_json::from_str::<String>(text) {
        return strip_code_fences(&decoded).to_string();
    }
    let inner = &text[1..text.len() - 1];
    unescape(inner).trim().to_string()
}

fn text_field(
    obj: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, SchemaError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SchemaError::InvalidItem {
            index,
            field,
            reason: format!("must be a string, found {}", kind_of(other)),
        }),
        None => Err(SchemaError::InvalidItem {
            index,
            field,
            reason: "is missing".to_string(),
        }),
    }
}

fn year_field(obj: &serde_json::Map<String, Value>, index: usize) -> Result<i64, SchemaError> {
    match obj.get("year") {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| SchemaError::InvalidItem {
            index,
            field: "year",
            reason: format!("must be an integer, found {}", n),
        }),
        Some(other) => Err(SchemaError::InvalidItem {
            index,
            field: "year",
            reason: format!("must be an integer, found {}", kind_of(other)),
        }),
        None => Err(SchemaError::InvalidItem {
            index,
            field: "year",
            reason: "is missing".to_string(),
        }),
    }
}

/// Strict parse of the conversion stage output into milestones
pub fn parse_roadmap(raw: &str) -> Result<Vec<RoadmapItem>, SchemaError> {
    let body = strip_code_fences(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| SchemaError::Parse(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(SchemaError::NotAnArray {
                found: kind_of(&other),
            });
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let obj = item
                .as_object()
                .ok_or(SchemaError::ItemNotObject { index })?;
            Ok(RoadmapItem {
                title: text_field(obj, index, "title")?,
                year: year_field(obj, index)?,
                description: text_field(obj, index, "description")?,
            })
        })
        .collect()
}
