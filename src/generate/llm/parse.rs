//! Turning a model's free-text reply into validated test cases

use crate::error::{GenerationError, Result};
use crate::model::{Priority, TestCase, DEFAULT_CATEGORY};
use crate::util::truncate;
use serde_json::{Map, Value};

const FENCE: &str = "```";

/// Pull the JSON payload out of a reply.
///
/// A fence wraps the payload when the text after it (and its optional
/// `json` tag) opens an array. The first such fence starts the payload and
/// the last fence after it ends it. Fences anywhere else, such as code spans
/// inside string values, are left alone, and without a wrapping fence the
/// input comes back untouched.
pub fn extract_json_array(raw: &str) -> &str {
    let Some(body_start) = wrapping_fence_body(raw) else {
        return raw;
    };
    let close = raw.rfind(FENCE).filter(|&close| close >= body_start);
    match close {
        Some(close) => raw[body_start..close].trim(),
        None => raw[body_start..].trim(),
    }
}

/// Byte offset just past the first fence (and tag) whose body opens an array
fn wrapping_fence_body(raw: &str) -> Option<usize> {
    raw.match_indices(FENCE).find_map(|(open, _)| {
        let mut body_start = open + FENCE.len();
        if raw[body_start..]
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            body_start += 4;
        }
        raw[body_start..]
            .trim_start()
            .starts_with('[')
            .then_some(body_start)
    })
}

/// Extract a JSON fragment between matching delimiters
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn parse_json_value(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    let fragment = extract_json_fragment(text, '[', ']')?;
    serde_json::from_str(fragment)
        .or_else(|_| serde_json::from_str(&fix_json_issues(fragment)))
        .ok()
}

/// Validate a JSON array of test-case objects.
///
/// Elements that fail validation are logged and skipped. The call fails only
/// when the text is not a JSON array, or when a non-empty array yields no
/// valid element at all.
pub fn parse_test_cases(json_text: &str) -> Result<Vec<TestCase>> {
    let Some(Value::Array(items)) = parse_json_value(json_text) else {
        return Err(GenerationError::malformed(json_text));
    };

    let total = items.len();
    let mut cases = Vec::with_capacity(total);
    for (index, item) in items.iter().enumerate() {
        match validate_element(item) {
            Ok(case) => cases.push(case),
            Err(reason) => {
                tracing::warn!(
                    index,
                    reason = %reason,
                    element = %truncate(&item.to_string(), 200),
                    "skipping malformed test case"
                );
            }
        }
    }

    if total > 0 && cases.is_empty() {
        return Err(GenerationError::malformed(json_text));
    }
    Ok(cases)
}

/// Extract and parse a raw provider reply. A malformed reply error carries
/// the reply exactly as received.
pub fn parse_reply(raw: &str) -> Result<Vec<TestCase>> {
    let extracted = extract_json_array(raw);
    parse_test_cases(extracted)
        .or_else(|err| match err {
            GenerationError::MalformedAiResponse { .. } if extracted.len() != raw.len() => {
                parse_test_cases(raw)
            }
            other => Err(other),
        })
        .map_err(|err| match err {
            GenerationError::MalformedAiResponse { .. } => GenerationError::malformed(raw),
            other => other,
        })
}

fn required_string(obj: &Map<String, Value>, field: &str) -> std::result::Result<String, String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(format!("missing '{}'", field)),
        Some(_) => Err(format!("'{}' is not a string", field)),
    }
}

fn validate_element(item: &Value) -> std::result::Result<TestCase, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| "element is not an object".to_string())?;

    let title = required_string(obj, "title")?;
    if title.trim().is_empty() {
        return Err("'title' is blank".to_string());
    }
    let description = required_string(obj, "description")?;
    let preconditions = required_string(obj, "preconditions")?;
    let expected_result = required_string(obj, "expected_result")?;

    let steps = match obj.get("steps") {
        Some(Value::Array(raw_steps)) => raw_steps
            .iter()
            .map(|s| s.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| "'steps' contains a non-string entry".to_string())?,
        Some(_) => return Err("'steps' is not an array".to_string()),
        None => return Err("missing 'steps'".to_string()),
    };
    if steps.is_empty() {
        return Err("'steps' is empty".to_string());
    }

    let priority = obj
        .get("priority")
        .and_then(Value::as_str)
        .map(Priority::parse_lenient)
        .unwrap_or_default();

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CATEGORY);

    Ok(
        TestCase::new(title, description, preconditions, steps, expected_result)
            .with_priority(priority)
            .with_category(category),
    )
}
