//! Conversion between pipeline values and `serde_json` values, used by
//! the CLI and handy for tests that build documents from JSON literals.

use serde_json::Value as JsonValue;

use crate::value::Value;

/// Maps a JSON document into a pipeline value.
pub fn from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        JsonValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

/// Maps a pipeline value back to JSON. Records render as objects through
/// their field list; non-finite floats become null.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(n) => JsonValue::from(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), to_json(v));
            }
            JsonValue::Object(out)
        }
        Value::Record(record) => {
            let record = record.borrow();
            let mut out = serde_json::Map::new();
            for name in record.field_names() {
                let field = record.get_field(name).unwrap_or(Value::Null);
                out.insert(name.to_string(), to_json(&field));
            }
            JsonValue::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let doc = json!({"n": 3, "x": 1.5, "ok": true, "tags": ["a", null]});
        let value = from_json(&doc);
        let Value::Object(map) = value else {
            panic!("expected an object");
        };
        assert_eq!(map["n"], Value::Integer(3));
        assert_eq!(map["x"], Value::Float(1.5));
        assert_eq!(map["ok"], Value::Boolean(true));
        assert_eq!(
            map["tags"],
            Value::Array(vec![Value::String("a".into()), Value::Null])
        );
    }

    #[test]
    fn test_to_json() {
        let value = Value::Array(vec![
            Value::Integer(1),
            Value::Float(2.5),
            Value::String("x".into()),
            Value::Null,
        ]);
        assert_eq!(to_json(&value), json!([1, 2.5, "x", null]));
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(to_json(&Value::Float(f64::NAN)), JsonValue::Null);
    }
}
