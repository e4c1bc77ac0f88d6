//! Turning free-form model output into a [`FixCandidate`].
//!
//! Models wrap JSON in prose or code fences, embed fences inside string
//! values, and emit raw newlines inside strings. Extraction therefore uses
//! string-aware brace matching rather than fence detection, and a failed
//! parse is retried once after escaping bare control characters.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::models::{Confidence, FixCandidate};

/// Responses longer than this are cut before parsing.
pub const MAX_RESPONSE_CHARS: usize = 500_000;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("no JSON object in response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("suspicious file path: {0:?}")]
    SuspiciousPath(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFixResponse {
    found_bug: Option<bool>,
    file_path: Option<String>,
    bug_description: Option<String>,
    fix_description: Option<String>,
    original_code: Option<String>,
    fixed_code: Option<String>,
    pr_title: Option<String>,
    pr_body: Option<String>,
    confidence: Option<String>,
    related_issue: Value,
}

/// Parse a model response. `Ok(None)` means the model reported no bug.
pub fn parse_fix_response(response: &str) -> Result<Option<FixCandidate>, ResponseError> {
    let response = truncate_chars(response, MAX_RESPONSE_CHARS);
    let json = extract_json(response).ok_or(ResponseError::NoJson)?;

    let raw: RawFixResponse = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(_) => serde_json::from_str(&fix_json_newlines(json))?,
    };

    if !raw.found_bug.unwrap_or(false) {
        return Ok(None);
    }

    let file_path = required(raw.file_path, "file_path")?;
    if is_suspicious_path(&file_path) {
        return Err(ResponseError::SuspiciousPath(file_path));
    }

    // Unknown tiers are treated as the lowest; the pipeline decides eligibility.
    let confidence = raw
        .confidence
        .as_deref()
        .and_then(|c| c.parse().ok())
        .unwrap_or(Confidence::Low);

    Ok(Some(FixCandidate {
        file_path,
        bug_description: required(raw.bug_description, "bug_description")?,
        fix_description: required(raw.fix_description, "fix_description")?,
        original: required(raw.original_code, "original_code")?,
        replacement: required(raw.fixed_code, "fixed_code")?,
        title: required(raw.pr_title, "pr_title")?,
        rationale: required(raw.pr_body, "pr_body")?,
        confidence,
        related_issue: coerce_issue_number(&raw.related_issue),
    }))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ResponseError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ResponseError::MissingField(field)),
    }
}

fn is_suspicious_path(path: &str) -> bool {
    path.contains('\0')
        || path.starts_with('/')
        || path.split(['/', '\\']).any(|component| component == "..")
}

/// Models return issue numbers as numbers, strings, floats or `false`.
fn coerce_issue_number(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 1.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim().trim_start_matches('#');
            s.parse::<u64>().ok()
        }
        _ => None,
    };
    number.filter(|n| *n > 0)
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => {
            tracing::warn!(limit, "analysis response too large, truncating");
            &text[..idx]
        }
        None => text,
    }
}

/// The first balanced `{...}` object in `text`, ignoring braces inside
/// JSON strings.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Escape raw newlines, carriage returns and tabs that appear inside JSON
/// string values.
pub fn fix_json_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "found_bug": true,
        "file_path": "src/app.py",
        "bug_description": "Divides by zero on empty input",
        "fix_description": "Guard the empty case",
        "original_code": "return total / len(items)",
        "fixed_code": "return total / len(items) if items else 0",
        "pr_title": "Guard against empty item list",
        "pr_body": "Avoids ZeroDivisionError",
        "confidence": "High",
        "related_issue": "12"
    }"#;

    #[test]
    fn test_extract_json_from_fenced_prose() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```\nThanks";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_json_ignores_braces_and_fences_in_strings() {
        let text = r#"{"pr_body": "```\nfn x() { }\n``` and \"}\"", "n": 1} trailing }"#;
        let json = extract_json(text).unwrap();
        assert!(json.ends_with(r#""n": 1}"#));
        assert!(extract_json("no object here").is_none());
        assert!(extract_json("{\"unterminated\": 1").is_none());
    }

    #[test]
    fn test_fix_json_newlines_only_touches_strings() {
        let raw = "{\n\"a\": \"line1\nline2\"\n}";
        let fixed = fix_json_newlines(raw);
        assert_eq!(fixed, "{\n\"a\": \"line1\\nline2\"\n}");
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["a"], "line1\nline2");
    }

    #[test]
    fn test_parse_full_response() {
        let fix = parse_fix_response(FULL).unwrap().unwrap();
        assert_eq!(fix.file_path, "src/app.py");
        assert_eq!(fix.original, "return total / len(items)");
        assert_eq!(fix.confidence, Confidence::High);
        assert_eq!(fix.related_issue, Some(12));
        assert_eq!(fix.title, "Guard against empty item list");
    }

    #[test]
    fn test_parse_repairs_raw_newlines() {
        let raw = FULL.replace(
            r#""original_code": "return total / len(items)""#,
            "\"original_code\": \"x = 1\nreturn total / len(items)\"",
        );
        let fix = parse_fix_response(&raw).unwrap().unwrap();
        assert_eq!(fix.original, "x = 1\nreturn total / len(items)");
    }

    #[test]
    fn test_no_bug_is_none() {
        assert!(parse_fix_response(r#"{"found_bug": false, "file_path": ""}"#)
            .unwrap()
            .is_none());
        assert!(parse_fix_response("{}").unwrap().is_none());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let raw = FULL.replace(r#""pr_title": "Guard against empty item list""#, r#""pr_title": "  ""#);
        assert!(matches!(
            parse_fix_response(&raw),
            Err(ResponseError::MissingField("pr_title"))
        ));
    }

    #[test]
    fn test_suspicious_paths_are_rejected() {
        for path in ["/etc/passwd", "../outside.py", "a/../../b.py", "a\\\\..\\\\b.py"] {
            let raw = FULL.replace("src/app.py", path);
            assert!(
                matches!(parse_fix_response(&raw), Err(ResponseError::SuspiciousPath(_))),
                "{path}"
            );
        }
    }

    #[test]
    fn test_medium_and_unknown_confidence_pass_through() {
        let medium = FULL.replace("\"High\"", "\"medium\"");
        assert_eq!(
            parse_fix_response(&medium).unwrap().unwrap().confidence,
            Confidence::Medium
        );
        let unknown = FULL.replace("\"High\"", "\"certain\"");
        assert_eq!(
            parse_fix_response(&unknown).unwrap().unwrap().confidence,
            Confidence::Low
        );
    }

    #[test]
    fn test_issue_number_coercion() {
        assert_eq!(coerce_issue_number(&serde_json::json!(7)), Some(7));
        assert_eq!(coerce_issue_number(&serde_json::json!(7.0)), Some(7));
        assert_eq!(coerce_issue_number(&serde_json::json!("#9")), Some(9));
        assert_eq!(coerce_issue_number(&serde_json::json!(0)), None);
        assert_eq!(coerce_issue_number(&serde_json::json!(-3)), None);
        assert_eq!(coerce_issue_number(&serde_json::json!(false)), None);
        assert_eq!(coerce_issue_number(&serde_json::json!("")), None);
        assert_eq!(coerce_issue_number(&Value::Null), None);
    }

    #[test]
    fn test_garbage_is_no_json() {
        assert!(matches!(
            parse_fix_response("I could not find anything."),
            Err(ResponseError::NoJson)
        ));
    }
}
