//! Conversion between runtime values and JSON.
//!
//! Dict insertion order round-trips: `serde_json` is built with
//! `preserve_order`, so decoded objects iterate in document order and
//! encoded objects keep dict order.

use serde_json::{Map, Number, Value as JsonValue};

use crate::{
    exception::{ExcType, Exception},
    value::{Dict, Value, format_float},
};

/// Guards against self-referential containers during encoding.
const MAX_JSON_DEPTH: usize = 64;

/// Decodes a JSON document into runtime values.
#[must_use]
pub fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::None,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Value::str(s),
        JsonValue::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        JsonValue::Object(map) => {
            let mut dict = Dict::new();
            for (key, value) in map {
                dict.insert_str(key, json_to_value(value));
            }
            Value::dict(dict)
        }
    }
}

/// Encodes a runtime value as JSON.
pub fn value_to_json(value: &Value) -> Result<JsonValue, Exception> {
    value_to_json_depth(value, 0)
}

fn value_to_json_depth(value: &Value, depth: usize) -> Result<JsonValue, Exception> {
    if depth > MAX_JSON_DEPTH {
        return Err(Exception::value_error("value is too deeply nested to serialize"));
    }
    match value {
        Value::None => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(i) => Ok(JsonValue::Number(Number::from(*i))),
        Value::Float(f) => Number::from_f64(*f).map(JsonValue::Number).ok_or_else(|| {
            Exception::value_error(format!(
                "out of range float value is not JSON compliant: {}",
                format_float(*f)
            ))
        }),
        Value::Str(s) => Ok(JsonValue::String(s.to_string())),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.borrow().len());
            for item in items.borrow().iter() {
                out.push(value_to_json_depth(item, depth + 1)?);
            }
            Ok(JsonValue::Array(out))
        }
        Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(value_to_json_depth(item, depth + 1)?);
            }
            Ok(JsonValue::Array(out))
        }
        Value::Dict(dict) => {
            let mut map = Map::new();
            for (key, value) in dict.borrow().iter() {
                map.insert(json_key(key)?, value_to_json_depth(value, depth + 1)?);
            }
            Ok(JsonValue::Object(map))
        }
        other => Err(Exception::new(
            ExcType::TypeError,
            format!("object of type '{}' is not JSON serializable", other.type_name()),
        )),
    }
}

/// Dict keys coerce to strings the way Python's `json.dumps` does.
fn json_key(key: &Value) -> Result<String, Exception> {
    match key {
        Value::Str(s) => Ok(s.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(format_float(*f)),
        Value::Bool(true) => Ok("true".to_string()),
        Value::Bool(false) => Ok("false".to_string()),
        Value::None => Ok("null".to_string()),
        other => Err(Exception::type_error(format!(
            "keys must be str, int, float, bool or None, not '{}'",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_object_order() {
        let doc: JsonValue = serde_json::from_str(r#"{"z": 1, "a": [true, null, 2.5], "m": "s"}"#).unwrap();
        let value = json_to_value(&doc);
        let back = value_to_json(&value).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), serde_json::to_string(&doc).unwrap());
    }

    #[test]
    fn tuple_encodes_as_array() {
        let value = Value::tuple(vec![Value::Int(1), Value::str("x")]);
        assert_eq!(value_to_json(&value).unwrap(), serde_json::json!([1, "x"]));
    }

    #[test]
    fn non_string_keys_coerce() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(3), Value::str("x")).unwrap();
        dict.insert(Value::Bool(true), Value::str("y")).unwrap();
        let json = value_to_json(&Value::dict(dict)).unwrap();
        assert_eq!(json, serde_json::json!({"3": "x", "true": "y"}));
    }

    #[test]
    fn nan_is_rejected() {
        assert!(value_to_json(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn set_is_not_serializable() {
        let value = Value::set(crate::value::Set::new());
        assert!(value_to_json(&value).is_err());
    }
}
