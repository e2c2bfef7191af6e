//! Lossless handling of numeric values from index payloads
//!
//! Payload floats are turned into their decimal text before anything else
//! reads them, so values persisted on different days compare exactly.

use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;

/// Replace float values in `value` with their decimal text.
///
/// Recurses through nested objects; arrays are left untouched.
pub fn coerce_floats(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };

    for field in map.values_mut() {
        if field.is_object() {
            coerce_floats(field);
            continue;
        }
        let text = match field {
            Value::Number(n) if is_float(n) => n.to_string(),
            _ => continue,
        };
        *field = Value::String(text);
    }
}

/// Parse a numeric or textual JSON value as an exact decimal
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(text) => parse_decimal(text),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn is_float(n: &Number) -> bool {
    !n.is_i64() && !n.is_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_floats_become_text() {
        let mut value: Value =
            serde_json::from_str(r#"{"size": 4500.0, "iops": 3000, "ratio": 0.10}"#).unwrap();

        coerce_floats(&mut value);

        assert_eq!(value["size"], json!("4500.0"));
        assert_eq!(value["iops"], json!(3000));
        assert_eq!(value["ratio"], json!("0.10"));
    }

    #[test]
    fn test_nested_objects_are_coerced_but_arrays_are_not() {
        let mut value: Value = serde_json::from_str(
            r#"{"configuration": {"size": 8.5, "inner": {"speed": 2.5}}, "list": [1.5]}"#,
        )
        .unwrap();

        coerce_floats(&mut value);

        assert_eq!(value["configuration"]["size"], json!("8.5"));
        assert_eq!(value["configuration"]["inner"]["speed"], json!("2.5"));
        assert!(value["list"][0].is_number());
    }

    #[test]
    fn test_decimal_from_value() {
        assert_eq!(
            decimal_from_value(&json!("4500.0")).unwrap().to_string(),
            "4500.0"
        );
        assert_eq!(decimal_from_value(&json!(125)).unwrap().to_string(), "125");
        assert_eq!(decimal_from_value(&json!("1e3")).unwrap(), Decimal::from(1000));
        assert!(decimal_from_value(&json!(null)).is_none());
        assert!(decimal_from_value(&json!("n/a")).is_none());
    }
}
