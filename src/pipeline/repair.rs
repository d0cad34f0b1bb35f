use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::de::{DeserializeOwned, IgnoredAny};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RepairError {
    #[error("empty model response")]
    Empty,
    #[error("model response is not valid JSON after repair: {0}")]
    Unrecoverable(String),
    #[error("repaired JSON has unexpected shape: {0}")]
    Shape(String),
}

lazy_static! {
    static ref FENCE_OPEN: Regex = Regex::new(r"^```(?:json|JSON)?\s*").unwrap();
    static ref FENCE_CLOSE: Regex = Regex::new(r"\s*```\s*$").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",(\s*[}\]])").unwrap();
    static ref SURROGATE_ESCAPE: Regex =
        Regex::new(r"(?i)(\\ud[89ab][0-9a-f]{2}\\ud[c-f][0-9a-f]{2})|\\ud[89a-f][0-9a-f]{2}")
            .unwrap();
    static ref DOORDASH_URL: Regex =
        Regex::new(r#"(https://www\.doordash\.com/store/[^"&?]+)[^"]*"#).unwrap();
}

fn is_private_use(c: char) -> bool {
    matches!(c, '\u{E000}'..='\u{F8FF}' | '\u{FFF0}'..='\u{FFFF}')
}

fn is_valid(text: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(text).is_ok()
}

/// Text-level cleanup applied before any parse attempt.
fn clean(raw: &str) -> String {
    let text = raw.trim();
    let text = FENCE_OPEN.replace(text, "");
    let text = FENCE_CLOSE.replace(&text, "");
    let text = TRAILING_COMMA.replace_all(&text, "$1");
    // paired escapes form a valid code point, lone halves do not
    let text = SURROGATE_ESCAPE.replace_all(&text, |caps: &Captures| {
        caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()
    });
    let text = DOORDASH_URL.replace_all(&text, "$1");
    text.chars()
        .filter(|c| !is_private_use(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn cut_to_last_closer(text: &str) -> &str {
    if text.ends_with('}') || text.ends_with(']') {
        return text;
    }
    match text.rfind(|c| c == '}' || c == ']') {
        Some(idx) => &text[..=idx],
        None => text,
    }
}

/// First balanced top-level object or array, ignoring brackets inside
/// string literals.
fn first_balanced(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

/// Turns a raw model reply into parseable JSON text.
pub fn repair_json(raw: &str) -> Result<String, RepairError> {
    let text = clean(raw);
    if text.is_empty() {
        return Err(RepairError::Empty);
    }
    if is_valid(&text) {
        return Ok(text);
    }

    let cut = cut_to_last_closer(&text);
    if is_valid(cut) {
        return Ok(cut.to_string());
    }

    match first_balanced(&text) {
        Some(balanced) if is_valid(balanced) => Ok(balanced.to_string()),
        _ => Err(RepairError::Unrecoverable(preview(&text))),
    }
}

pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, RepairError> {
    let text = repair_json(raw)?;
    serde_json::from_str(&text).map_err(|e| RepairError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parsed(raw: &str) -> Value {
        parse_model_json::<Value>(raw).unwrap()
    }

    #[test]
    fn strips_fences_and_trailing_commas() {
        let raw = "```json\n{\"meals\": [1, 2, 3,], \"ok\": true,}\n```";
        assert_eq!(parsed(raw), json!({ "meals": [1, 2, 3], "ok": true }));
    }

    #[test]
    fn cuts_trailing_prose() {
        let raw = "{\"day\": \"monday\"}\n\nLet me know if you want changes.";
        assert_eq!(parsed(raw), json!({ "day": "monday" }));
    }

    #[test]
    fn finds_first_balanced_value_after_preamble() {
        let raw = "Here you go: {\"a\": {\"b\": \"curly } inside\"}} and then {\"c\": 1}";
        assert_eq!(parsed(raw), json!({ "a": { "b": "curly } inside" } }));
    }

    #[test]
    fn drops_lone_surrogates_and_private_use_chars() {
        let raw = "{\"dish\": \"Caf\\ud83e bowl\u{E001}\", \"emoji\": \"\\ud83d\\ude00\"}";
        let v = parsed(raw);
        assert_eq!(v["dish"], "Caf bowl");
        assert_eq!(v["emoji"], "\u{1F600}");
    }

    #[test]
    fn trims_doordash_tracking_parameters() {
        let raw = r#"{"url": "https://www.doordash.com/store/sweetgreen-123?utm_source=x&cursor=abc"}"#;
        assert_eq!(
            parsed(raw)["url"],
            "https://www.doordash.com/store/sweetgreen-123"
        );
    }

    #[test]
    fn reports_unrecoverable_input() {
        assert_eq!(repair_json("   "), Err(RepairError::Empty));
        assert!(matches!(
            repair_json("{\"truncated\": [1, 2"),
            Err(RepairError::Unrecoverable(_))
        ));
    }

    #[test]
    fn shape_errors_are_distinct() {
        #[derive(serde::Deserialize, Debug)]
        struct Needs {
            #[allow(dead_code)]
            id: u32,
        }
        assert!(matches!(
            parse_model_json::<Needs>("{\"other\": 1}"),
            Err(RepairError::Shape(_))
        ));
    }

    #[test]
    fn repair_is_idempotent() {
        let inputs = [
            "```json\n{\"a\": [1,], }\n```",
            "{\"u\": \"https://www.doordash.com/store/x-1?y=2\"} trailing",
            "noise {\"k\": \"v\"} more {\"z\": 0}",
            "[{\"a\": 1}, {\"b\": 2},]",
        ];
        for raw in inputs {
            let once = repair_json(raw).unwrap();
            let twice = repair_json(&once).unwrap();
            assert_eq!(once, twice, "input: {raw}");
        }
    }
}
