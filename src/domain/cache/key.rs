//! Tool-call cache keys
//!
//! A tool key is a pure function of the tool name and its arguments.
//! Arguments are canonicalized first: object keys sorted, integral
//! numbers written without a fraction, `-0` folded into `0`.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// Namespace prefix of every tool key
pub const TOOL_KEY_PREFIX: &str = "tool";

/// Deterministic key of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolKey {
    tool: String,
    key: String,
}

impl ToolKey {
    /// Build the key for `tool` called with `args`
    pub fn new(tool: &str, args: &Value) -> Result<Self, DomainError> {
        validate_tool_name(tool)?;

        let canonical = canonical_json(args);
        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));

        Ok(Self {
            tool: tool.to_string(),
            key: format!("{}:{}:{}", TOOL_KEY_PREFIX, tool, digest),
        })
    }

    /// Build the key from any serializable argument struct
    pub fn from_serializable<T: Serialize>(tool: &str, args: &T) -> Result<Self, DomainError> {
        let value = serde_json::to_value(args).map_err(|e| {
            DomainError::validation(format!("Tool arguments are not serializable: {}", e))
        })?;
        Self::new(tool, &value)
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Glob matching every key of one tool
    pub fn tool_pattern(tool: &str) -> String {
        format!("{}:{}:*", TOOL_KEY_PREFIX, tool)
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn validate_tool_name(tool: &str) -> Result<(), DomainError> {
    if tool.is_empty() {
        return Err(DomainError::malformed_input("tool name is empty"));
    }

    let valid = tool
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if !valid {
        return Err(DomainError::malformed_input(format!(
            "tool name '{}' may only contain ASCII letters, digits, '_', '-' and '.'",
            tool
        )));
    }

    Ok(())
}

/// Render `value` as canonical JSON
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_number(n: &serde_json::Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        // 14.0 and 14 must hash the same
        if f.fract() == 0.0 && f.abs() < 9.0e15 {
            out.push_str(&(f as i64).to_string());
        } else {
            out.push_str(&n.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ordering_does_not_matter() {
        let a = ToolKey::new("rsi", &json!({"ticker": "AAPL", "period": 14})).unwrap();
        let b = ToolKey::new("rsi", &json!({"period": 14, "ticker": "AAPL"})).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_integral_floats_match_integers() {
        let a = ToolKey::new("rsi", &json!({"period": 14})).unwrap();
        let b = ToolKey::new("rsi", &json!({"period": 14.0})).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_negative_zero_folds() {
        assert_eq!(canonical_json(&json!(-0.0)), "0");
    }

    #[test]
    fn test_different_args_differ() {
        let a = ToolKey::new("rsi", &json!({"ticker": "AAPL", "period": 14})).unwrap();
        let b = ToolKey::new("rsi", &json!({"ticker": "AAPL", "period": 21})).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_tool_name_is_part_of_key() {
        let args = json!({"ticker": "AAPL"});
        let a = ToolKey::new("quote", &args).unwrap();
        let b = ToolKey::new("news", &args).unwrap();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("tool:quote:"));
    }

    #[test]
    fn test_nested_canonical_form() {
        let value = json!({"b": [1.5, {"z": true, "a": null}], "a": "x\"y"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"x\"y","b":[1.5,{"a":null,"z":true}]}"#
        );
    }

    #[test]
    fn test_invalid_tool_name() {
        assert!(ToolKey::new("", &json!({})).is_err());
        assert!(ToolKey::new("get price", &json!({})).is_err());
        assert!(ToolKey::new("a:b", &json!({})).is_err());
    }

    #[test]
    fn test_from_serializable() {
        #[derive(Serialize)]
        struct RsiArgs {
            ticker: String,
            period: u32,
        }

        let typed = ToolKey::from_serializable(
            "rsi",
            &RsiArgs {
                ticker: "AAPL".to_string(),
                period: 14,
            },
        )
        .unwrap();
        let untyped = ToolKey::new("rsi", &json!({"period": 14, "ticker": "AAPL"})).unwrap();

        assert_eq!(typed, untyped);
    }

    #[test]
    fn test_tool_pattern() {
        assert_eq!(ToolKey::tool_pattern("rsi"), "tool:rsi:*");
    }
}
