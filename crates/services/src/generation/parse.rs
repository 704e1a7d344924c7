//! Lenient parsing of model output into questions.
//!
//! Models wrap JSON in code fences, rename fields, send numbers where strings
//! are expected and flatten option lists into one string. Everything here
//! normalizes those shapes into validated [`Question`]s; items that cannot be
//! salvaged are skipped, and only a response with no usable item fails.

use std::collections::BTreeMap;

use quiz_core::model::{Question, QuestionSource, ShapeParams};
use serde_json::{Map, Value};

use crate::error::GenerationError;

const TEXT_KEYS: [&str; 4] = ["question", "text", "q", "prompt"];
const ANSWER_KEYS: [&str; 4] = ["answer", "correct_answer", "correctAnswer", "solution"];
const OPTION_KEYS: [&str; 2] = ["options", "choices"];
const EXPLANATION_KEYS: [&str; 2] = ["explanation", "rationale"];
const LIST_KEYS: [&str; 3] = ["questions", "items", "data"];
const OPTION_TEXT_KEYS: [&str; 3] = ["text", "value", "label"];
const SHAPE_KIND_KEYS: [&str; 3] = ["kind", "type", "name"];
const OPTION_DELIMITERS: [char; 4] = ['\n', '|', ';', ','];

/// Parse raw model output into generated questions.
///
/// # Errors
///
/// Returns `GenerationError::Parse` (carrying the raw text) when the output
/// holds no JSON or none of its items is a usable question.
pub fn parse_questions(raw: &str) -> Result<Vec<Question>, GenerationError> {
    let fail = |reason: String| GenerationError::Parse {
        raw: raw.to_owned(),
        reason,
    };

    let body = strip_code_fences(raw);
    let json = extract_json(body).ok_or_else(|| fail("no JSON found in response".into()))?;
    let value: Value = serde_json::from_str(json).map_err(|err| fail(err.to_string()))?;

    let items: Vec<&Value> = match &value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map_or_else(|| vec![&value], |items| items.iter().collect()),
        _ => return Err(fail("expected a JSON array or object".into())),
    };

    let questions: Vec<Question> = items
        .into_iter()
        .filter_map(|item| match question_from_value(item) {
            Ok(question) => Some(question),
            Err(reason) => {
                tracing::debug!(%reason, "skipping unusable generated item");
                None
            }
        })
        .collect();

    if questions.is_empty() {
        return Err(fail("response contained no usable questions".into()));
    }
    Ok(questions)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // Drop the language tag line (```json).
    let body = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
    body.find("```").map_or(body, |end| &body[..end]).trim()
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let end = text.rfind([']', '}'])?;
    (end > start).then(|| &text[start..=end])
}

fn question_from_value(item: &Value) -> Result<Question, String> {
    let map = item
        .as_object()
        .ok_or_else(|| format!("item is not an object: {item}"))?;

    let text = first_value(map, &TEXT_KEYS)
        .and_then(scalar_to_string)
        .ok_or("item has no question text")?;
    let mut answer = first_value(map, &ANSWER_KEYS).and_then(scalar_to_string);
    let options = first_value(map, &OPTION_KEYS).and_then(normalize_options);

    let resolved = match (answer.as_deref(), options.as_deref()) {
        (Some(raw_answer), Some(opts)) => resolve_letter_answer(raw_answer, opts),
        _ => None,
    };
    if resolved.is_some() {
        answer = resolved;
    }

    let explanation = first_value(map, &EXPLANATION_KEYS).and_then(scalar_to_string);
    let shape = map.get("shape").and_then(shape_from_value);

    Question::new(text, answer, options, QuestionSource::Generated)
        .map(|q| q.with_explanation(explanation).with_shape(shape))
        .map_err(|err| err.to_string())
}

fn first_value<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn option_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => first_value(map, &OPTION_TEXT_KEYS).and_then(scalar_to_string),
        other => scalar_to_string(other),
    }
}

/// Normalize an options field. Fewer than two usable entries means the
/// question is not multiple choice.
fn normalize_options(value: &Value) -> Option<Vec<String>> {
    let options: Vec<String> = match value {
        Value::Array(items) => {
            let mut options: Vec<String> = items.iter().filter_map(option_text).collect();
            // `["a | b | c"]`: one entry holding the whole list.
            if let [only] = options.as_slice() {
                options = split_delimited(only);
            }
            options
        }
        Value::String(joined) => split_delimited(joined),
        Value::Object(map) => map.values().filter_map(option_text).collect(),
        _ => Vec::new(),
    };
    let options = strip_labels(options);
    (options.len() >= 2).then_some(options)
}

fn split_delimited(joined: &str) -> Vec<String> {
    let Some(delimiter) = OPTION_DELIMITERS.into_iter().find(|d| joined.contains(*d)) else {
        return vec![joined.trim().to_owned()];
    };
    joined
        .split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Remove `A.` / `B)` style prefixes when every option carries one.
fn strip_labels(options: Vec<String>) -> Vec<String> {
    if options.is_empty() || !options.iter().all(|o| label_len(o).is_some()) {
        return options;
    }
    options
        .into_iter()
        .map(|o| {
            let skip = label_len(&o).unwrap_or(0);
            o[skip..].trim().to_owned()
        })
        .collect()
}

fn label_len(option: &str) -> Option<usize> {
    let mut chars = option.chars();
    let letter = chars.next()?;
    let mark = chars.next()?;
    let rest = chars.as_str();
    let labelled = letter.is_ascii_uppercase()
        && matches!(mark, '.' | ')' | ':')
        && rest.starts_with(char::is_whitespace)
        && !rest.trim().is_empty();
    labelled.then_some(2)
}

/// Map a bare option letter (`"B"`) to the option text it points at.
fn resolve_letter_answer(answer: &str, options: &[String]) -> Option<String> {
    let mut chars = answer.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !letter.is_ascii_uppercase() {
        return None;
    }
    if options.iter().any(|o| o.eq_ignore_ascii_case(answer)) {
        return None;
    }
    let index = usize::from(u8::try_from(letter).ok()? - b'A');
    options.get(index).cloned()
}

fn shape_from_value(value: &Value) -> Option<ShapeParams> {
    let map = value.as_object()?;
    let kind = first_value(map, &SHAPE_KIND_KEYS).and_then(scalar_to_string)?;

    let source = map
        .get("dimensions")
        .and_then(Value::as_object)
        .unwrap_or(map);
    let dimensions: BTreeMap<String, f64> = source
        .iter()
        .filter(|(key, _)| !SHAPE_KIND_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
        .collect();

    Some(ShapeParams { kind, dimensions })
}
