//! Best-effort structured decoding of attribute and text values.

use serde_json::Value;

/// Decode a raw attribute or text value.
///
/// Anything that parses as JSON becomes the structured value; everything else
/// comes back unchanged as a string. Never fails.
pub fn decode(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Encode a value in the structured (JSON) format.
pub fn encode(value: &Value) -> String {
    value.to_string()
}

/// Textual content for a value rendered without a template.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => encode(other),
    }
}

/// Attribute form: strings are written verbatim so that declarations such as
/// `data-reaction` stay readable by the scanner.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => encode(other),
    }
}

/// JavaScript-style truthiness, used by the expression evaluator.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Build a number value, keeping integral results as integers so that
/// `1 + 1` renders as `2` rather than `2.0`.
pub fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_structured_values() {
        assert_eq!(decode("42"), json!(42));
        assert_eq!(decode(" 3.5 "), json!(3.5));
        assert_eq!(decode("true"), json!(true));
        assert_eq!(decode("null"), Value::Null);
        assert_eq!(decode(r#"{"a":[1,2]}"#), json!({"a": [1, 2]}));
        assert_eq!(decode(r#""quoted""#), json!("quoted"));
    }

    #[test]
    fn falls_back_to_raw_string() {
        assert_eq!(decode("Ada"), json!("Ada"));
        assert_eq!(decode("{broken"), json!("{broken"));
        assert_eq!(decode(""), json!(""));
    }

    #[test]
    fn structured_values_round_trip() {
        let values = [
            json!(0),
            json!(-12.25),
            json!(false),
            Value::Null,
            json!("dark"),
            json!({"nested": {"list": [1, "two", null]}}),
        ];
        for value in values {
            assert_eq!(decode(&encode(&value)), value);
        }
    }

    #[test]
    fn display_and_stringify_forms() {
        assert_eq!(display(&Value::Null), "");
        assert_eq!(display(&json!("x")), "x");
        assert_eq!(display(&json!(3)), "3");
        assert_eq!(stringify(&Value::Null), "null");
        assert_eq!(stringify(&json!("count")), "count");
        assert_eq!(stringify(&json!([1])), "[1]");
    }

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(number(2.0), json!(2));
        assert_eq!(number(0.5), json!(0.5));
        assert_eq!(number(f64::NAN), Value::Null);
    }
}
