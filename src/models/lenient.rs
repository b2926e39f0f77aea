//! Field readers for stored records.
//!
//! Older form handlers saved numbers, flags and lists exactly as the form
//! sent them, so a stored project can carry `"orderIndex": "3"` or
//! `"isActive": "false"`. These readers accept either spelling so one such
//! record never makes its whole document unreadable.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
}

fn to_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Integer from a number or numeric string; anything else reads as 0.
pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(to_int(&Value::deserialize(deserializer)?).unwrap_or(0))
}

/// Boolean from a bool, a form flag (`"true"`, `"on"`, `"1"`) or a number.
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(to_flag(&Value::deserialize(deserializer)?))
}

/// String list from an array, a JSON-encoded array, or a single string.
pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) if s.trim_start().starts_with('[') => {
            serde_json::from_str(&s).unwrap_or_else(|_| vec![s])
        }
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_spellings() {
        assert_eq!(to_int(&json!(3)), Some(3));
        assert_eq!(to_int(&json!("3")), Some(3));
        assert_eq!(to_int(&json!(" 2.6 ")), Some(3));
        assert_eq!(to_int(&json!("NaN")), None);
        assert_eq!(to_int(&json!(null)), None);
    }

    #[test]
    fn test_flag_spellings() {
        assert!(to_flag(&json!(true)));
        assert!(to_flag(&json!("true")));
        assert!(to_flag(&json!("on")));
        assert!(!to_flag(&json!("false")));
        assert!(!to_flag(&json!("")));
        assert!(!to_flag(&json!(null)));
    }
}
