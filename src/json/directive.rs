use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Directives recognized inside a parsed JSON payload.
///
/// A single document may carry several. They are checked in a fixed order
/// (sequence invocation, click, wait) and are not mutually exclusive: the
/// sequence directive falls through to the others, while a click or wait
/// directive ends processing of the document once executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub sequence: Option<SequenceCall>,
    pub click: Option<ClickDirective>,
    pub wait_ms: Option<u64>,
}

/// Invoke another sequence by name, optionally injecting variables first.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceCall {
    pub name: String,
    pub variables: BTreeMap<String, String>,
}

/// Click at the given coordinates (the executing action adds its own offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickDirective {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Error, PartialEq)]
pub enum DirectiveError {
    #[error("document carries no recognized directive")]
    NoDirective,
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

fn malformed(field: &'static str, reason: impl Into<String>) -> DirectiveError {
    DirectiveError::Malformed {
        field,
        reason: reason.into(),
    }
}

/// Recognize the directives of a parsed document.
///
/// Accepted shape: an object optionally containing `sequenceName` (string)
/// plus a flat `variables` string map (scalar values are coerced),
/// `clickAction` (`{x, y}` integers), and/or `waitTime` (non-negative
/// integer). A document with none of the three keys is an error so callers
/// can retry until a proper payload shows up.
pub fn parse_directives(doc: &Value) -> Result<Directives, DirectiveError> {
    let Some(obj) = doc.as_object() else {
        return Err(DirectiveError::NoDirective);
    };
    let mut out = Directives::default();

    if let Some(value) = obj.get("sequenceName") {
        let name = value
            .as_str()
            .ok_or_else(|| malformed("sequenceName", "must be a string"))?
            .to_string();
        let mut variables = BTreeMap::new();
        if let Some(vars) = obj.get("variables") {
            let map = vars
                .as_object()
                .ok_or_else(|| malformed("variables", "must be an object"))?;
            for (key, value) in map {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => {
                        return Err(malformed(
                            "variables",
                            format!("value for '{key}' is not a scalar"),
                        ));
                    }
                };
                variables.insert(key.clone(), rendered);
            }
        }
        out.sequence = Some(SequenceCall { name, variables });
    }

    if let Some(value) = obj.get("clickAction") {
        let map = value
            .as_object()
            .ok_or_else(|| malformed("clickAction", "must be an object"))?;
        let x = coordinate(map.get("x"), "clickAction", "x")?;
        let y = coordinate(map.get("y"), "clickAction", "y")?;
        out.click = Some(ClickDirective { x, y });
    }

    if let Some(value) = obj.get("waitTime") {
        let ms = value
            .as_u64()
            .ok_or_else(|| malformed("waitTime", "must be a non-negative integer"))?;
        out.wait_ms = Some(ms);
    }

    if out.sequence.is_none() && out.click.is_none() && out.wait_ms.is_none() {
        return Err(DirectiveError::NoDirective);
    }
    Ok(out)
}

fn coordinate(
    value: Option<&Value>,
    field: &'static str,
    axis: &str,
) -> Result<i32, DirectiveError> {
    let raw = value
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed(field, format!("{axis} must be an integer")))?;
    i32::try_from(raw).map_err(|_| malformed(field, format!("{axis} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wait_only() {
        let parsed = parse_directives(&json!({"waitTime": 250})).unwrap();
        assert_eq!(parsed.wait_ms, Some(250));
        assert!(parsed.sequence.is_none());
        assert!(parsed.click.is_none());
    }

    #[test]
    fn test_all_three_directives_coexist() {
        let parsed = parse_directives(&json!({
            "sequenceName": "Login",
            "variables": {"user": "a", "attempts": 3, "fresh": true},
            "clickAction": {"x": 10, "y": 20},
            "waitTime": 100
        }))
        .unwrap();

        let call = parsed.sequence.unwrap();
        assert_eq!(call.name, "Login");
        assert_eq!(call.variables["user"], "a");
        assert_eq!(call.variables["attempts"], "3");
        assert_eq!(call.variables["fresh"], "true");
        assert_eq!(parsed.click, Some(ClickDirective { x: 10, y: 20 }));
        assert_eq!(parsed.wait_ms, Some(100));
    }

    #[test]
    fn test_missing_directives_is_an_error() {
        assert_eq!(
            parse_directives(&json!({"unrelated": 1})),
            Err(DirectiveError::NoDirective)
        );
        assert_eq!(
            parse_directives(&json!([1, 2, 3])),
            Err(DirectiveError::NoDirective)
        );
    }

    #[test]
    fn test_malformed_click_coordinates() {
        let err = parse_directives(&json!({"clickAction": {"x": "ten", "y": 20}})).unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::Malformed {
                field: "clickAction",
                ..
            }
        ));
    }

    #[test]
    fn test_nested_variable_values_rejected() {
        let err = parse_directives(&json!({
            "sequenceName": "S",
            "variables": {"bad": {"nested": true}}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::Malformed {
                field: "variables",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_wait_rejected() {
        let err = parse_directives(&json!({"waitTime": -5})).unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::Malformed {
                field: "waitTime",
                ..
            }
        ));
    }
}
