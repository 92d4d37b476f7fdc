//! Parsing of free-form oracle answers into boundary candidates.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use vscene_models::{parse_timestamp, BoundaryCandidate};

use crate::error::{OracleError, OracleResult};

#[derive(Debug, Deserialize)]
struct RawScene {
    start: Option<Value>,
    end: Option<Value>,
    #[serde(default, alias = "label", alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "summary")]
    description: Option<String>,
}

/// Body of the first fenced code block, without its language tag.
fn fenced_body(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after = &raw[open + 3..];
    let body = after.find('\n').map_or("", |nl| &after[nl + 1..]);
    Some(body.find("```").map_or(body, |close| &body[..close]))
}

/// First balanced array or object in `text` that parses as a scene payload.
///
/// Each `[`/`{` is tried as a start; the deserializer stops at the end of
/// the value, so prose after it is ignored. Arrays must hold only objects,
/// which skips bracketed asides such as `[approximate]` or `[+-1s]`.
fn first_payload(text: &str) -> Option<Value> {
    text.match_indices(['[', '{']).find_map(|(start, _)| {
        let value = serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()?
            .ok()?;
        let is_payload = match &value {
            Value::Object(_) => true,
            Value::Array(items) => items.iter().all(Value::is_object),
            _ => false,
        };
        is_payload.then_some(value)
    })
}

/// Pull the JSON payload out of an answer, dropping markdown fences and the
/// prose around them.
pub fn extract_json(raw: &str) -> Option<Value> {
    fenced_body(raw)
        .and_then(first_payload)
        .or_else(|| first_payload(raw))
}

fn seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_timestamp(s).ok(),
        _ => None,
    }
}

/// Parse an oracle answer into candidates, in the order given.
///
/// Accepts a bare array or an object holding a `scenes` array. Entries
/// without a readable start and end are skipped; a payload that is not
/// JSON at all is an error.
pub fn parse_boundaries(raw: &str) -> OracleResult<Vec<BoundaryCandidate>> {
    let value = extract_json(raw).ok_or_else(|| OracleError::parse("no JSON found in response"))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("scenes") {
            Some(Value::Array(items)) => items,
            _ => return Err(OracleError::parse("response object has no 'scenes' array")),
        },
        _ => return Err(OracleError::parse("response is neither an array nor an object")),
    };

    let total = items.len();
    let mut candidates = Vec::with_capacity(total);
    for (i, item) in items.into_iter().enumerate() {
        let scene: RawScene = match serde_json::from_value(item) {
            Ok(scene) => scene,
            Err(e) => {
                warn!("Skipping oracle scene {}: {}", i, e);
                continue;
            }
        };

        match (
            scene.start.as_ref().and_then(seconds),
            scene.end.as_ref().and_then(seconds),
        ) {
            (Some(start), Some(end)) => candidates.push(
                BoundaryCandidate::new(start, end).with_label(scene.title, scene.description),
            ),
            _ => warn!("Skipping oracle scene {} without readable timestamps", i),
        }
    }

    if total > 0 && candidates.is_empty() {
        return Err(OracleError::parse("no scene had readable timestamps"));
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_strips_wrapping() {
        let raw = "Sure! Here are the scenes:\n```json\n[{\"start\": 0, \"end\": 5}]\n```\nHope this helps.";
        assert_eq!(extract_json(raw), Some(serde_json::json!([{"start": 0, "end": 5}])));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_brackets_in_prose_before_fence() {
        let raw = "Scenes [approximate]:\n```json\n[{\"start\": 0, \"end\": 5}, {\"start\": 5, \"end\": 9}]\n```";
        let scenes = parse_boundaries(raw).unwrap();
        assert_eq!(
            scenes,
            vec![BoundaryCandidate::new(0.0, 5.0), BoundaryCandidate::new(5.0, 9.0)]
        );
    }

    #[test]
    fn test_brackets_in_trailing_note() {
        let raw = "[{\"start\": 0, \"end\": 5}]\nNote: times are approximate [+-1s].";
        let scenes = parse_boundaries(raw).unwrap();
        assert_eq!(scenes, vec![BoundaryCandidate::new(0.0, 5.0)]);
    }

    #[test]
    fn test_unfenced_answer_with_leading_aside() {
        let raw = "Found [2] scenes: {\"scenes\": [{\"start\": 1, \"end\": 4}]} (end)";
        let scenes = parse_boundaries(raw).unwrap();
        assert_eq!(scenes, vec![BoundaryCandidate::new(1.0, 4.0)]);
    }

    #[test]
    fn test_parse_array_with_mixed_timestamps() {
        let raw = r#"[
            {"start": "00:00:00", "end": "00:00:12.5", "title": "Intro"},
            {"start": 12.5, "end": "01:03", "description": "Walk"}
        ]"#;
        let scenes = parse_boundaries(raw).unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].end, 12.5);
        assert_eq!(scenes[0].title.as_deref(), Some("Intro"));
        assert_eq!(scenes[1].start, 12.5);
        assert_eq!(scenes[1].end, 63.0);
        assert_eq!(scenes[1].description.as_deref(), Some("Walk"));
    }

    #[test]
    fn test_parse_scenes_object() {
        let raw = r#"Result: {"scenes": [{"start": 1, "end": 4, "label": "Opening"}]}"#;
        let scenes = parse_boundaries(raw).unwrap();
        assert_eq!(
            scenes,
            vec![BoundaryCandidate::new(1.0, 4.0).with_label(Some("Opening".into()), None)]
        );
    }

    #[test]
    fn test_skips_unreadable_entries() {
        let raw = r#"[{"start": "soon", "end": 3}, {"start": 3, "end": 9}]"#;
        let scenes = parse_boundaries(raw).unwrap();
        assert_eq!(scenes, vec![BoundaryCandidate::new(3.0, 9.0)]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_boundaries("I could not watch the video."),
            Err(OracleError::Parse(_))
        ));
        assert!(matches!(parse_boundaries("{not json]"), Err(OracleError::Parse(_))));
        assert!(matches!(parse_boundaries(r#"{"clips": []}"#), Err(OracleError::Parse(_))));
        assert!(matches!(
            parse_boundaries(r#"[{"start": "x", "end": "y"}]"#),
            Err(OracleError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_array_is_no_scenes() {
        assert!(parse_boundaries("[]").unwrap().is_empty());
    }
}
