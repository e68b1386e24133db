//! TOON encoding: a compact, indentation-based serialisation used as an
//! alternative to JSON for tool responses.
//!
//! Shapes produced:
//!
//! ```text
//! name: demo
//! count: 3
//! tags[2]: alpha,beta
//! users[2]{id,name}:
//!   1,Alice
//!   2,Bob
//! nested:
//!   inner: 1
//! items[2]:
//!   - 1
//!   - text
//! ```
//!
//! Uniform arrays of flat objects render in tabular form; arrays of scalars
//! inline; anything else falls back to `- ` list items.

use std::fmt::Write as _;

use crate::{
    exception::Exception,
    value::{Value, format_float},
};

/// Encodes `value` as TOON text.
pub fn encode(value: &Value) -> Result<String, Exception> {
    let mut out = String::new();
    match value {
        Value::Dict(dict) => {
            for (key, item) in dict.borrow().iter() {
                encode_field(&mut out, &scalar_key(key)?, item, 0)?;
            }
        }
        Value::List(items) => encode_array(&mut out, "", &items.borrow(), 0)?,
        Value::Tuple(items) => encode_array(&mut out, "", items, 0)?,
        other => {
            let _ = writeln!(out, "{}", scalar(other)?);
        }
    }
    Ok(out)
}

fn encode_field(out: &mut String, key: &str, value: &Value, indent: usize) -> Result<(), Exception> {
    let pad = " ".repeat(indent);
    match value {
        Value::Dict(dict) => {
            let _ = writeln!(out, "{pad}{key}:");
            for (k, item) in dict.borrow().iter() {
                encode_field(out, &scalar_key(k)?, item, indent + 2)?;
            }
            Ok(())
        }
        Value::List(items) => encode_array(out, &format!("{pad}{key}"), &items.borrow(), indent),
        Value::Tuple(items) => encode_array(out, &format!("{pad}{key}"), items, indent),
        other => {
            let _ = writeln!(out, "{pad}{key}: {}", scalar(other)?);
            Ok(())
        }
    }
}

fn encode_array(out: &mut String, prefix: &str, items: &[Value], indent: usize) -> Result<(), Exception> {
    let n = items.len();

    if items.iter().all(is_scalar) {
        let mut rendered = Vec::with_capacity(n);
        for item in items {
            rendered.push(scalar(item)?);
        }
        let _ = writeln!(out, "{prefix}[{n}]: {}", rendered.join(","));
        return Ok(());
    }

    // Tabular form: every element is a flat dict with the same keys.
    if let Some(fields) = tabular_fields(items) {
        let _ = writeln!(out, "{prefix}[{n}]{{{}}}:", fields.join(","));
        let pad = " ".repeat(indent + 2);
        for item in items {
            let Value::Dict(dict) = item else { unreachable!("checked by tabular_fields") };
            let dict = dict.borrow();
            let mut cells = Vec::with_capacity(fields.len());
            for field in &fields {
                let cell = dict.get_str(field).unwrap_or(Value::None);
                cells.push(scalar(&cell)?);
            }
            let _ = writeln!(out, "{pad}{}", cells.join(","));
        }
        return Ok(());
    }

    // List form.
    let _ = writeln!(out, "{prefix}[{n}]:");
    let pad = " ".repeat(indent + 2);
    for item in items {
        match item {
            Value::Dict(dict) => {
                let _ = writeln!(out, "{pad}-");
                for (k, v) in dict.borrow().iter() {
                    encode_field(out, &scalar_key(k)?, v, indent + 4)?;
                }
            }
            Value::List(nested) => encode_array(out, &format!("{pad}-"), &nested.borrow(), indent + 2)?,
            Value::Tuple(nested) => encode_array(out, &format!("{pad}-"), nested, indent + 2)?,
            other => {
                let _ = writeln!(out, "{pad}- {}", scalar(other)?);
            }
        }
    }
    Ok(())
}

/// Keys shared by every dict element when all values are scalars.
fn tabular_fields(items: &[Value]) -> Option<Vec<String>> {
    let mut fields: Option<Vec<String>> = None;
    for item in items {
        let Value::Dict(dict) = item else { return None };
        let dict = dict.borrow();
        let mut keys = Vec::with_capacity(dict.len());
        for (key, value) in dict.iter() {
            if !is_scalar(value) {
                return None;
            }
            match key {
                Value::Str(s) => keys.push(s.to_string()),
                _ => return None,
            }
        }
        match &fields {
            None => fields = Some(keys),
            Some(existing) if *existing == keys => {}
            Some(_) => return None,
        }
    }
    fields.filter(|f| !f.is_empty())
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
    )
}

fn scalar(value: &Value) -> Result<String, Exception> {
    match value {
        Value::None => Ok("null".to_string()),
        Value::Bool(true) => Ok("true".to_string()),
        Value::Bool(false) => Ok("false".to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(format_float(*f)),
        Value::Str(s) => Ok(quote_if_needed(s)),
        other => Err(Exception::type_error(format!(
            "object of type '{}' is not TOON serializable",
            other.type_name()
        ))),
    }
}

fn scalar_key(key: &Value) -> Result<String, Exception> {
    match key {
        Value::Str(s) => Ok(quote_if_needed(s)),
        Value::Int(i) => Ok(i.to_string()),
        other => Err(Exception::type_error(format!(
            "TOON keys must be strings, not '{}'",
            other.type_name()
        ))),
    }
}

/// Strings are bare unless they would be ambiguous.
fn quote_if_needed(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s.contains([',', ':', '"', '{', '}', '[', ']', '\n', '\r'])
        || s.starts_with('-')
        || matches!(s, "true" | "false" | "null")
        || s.parse::<f64>().is_ok();
    if !needs_quotes {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::Dict;

    fn dict_of(pairs: &[(&str, Value)]) -> Value {
        let mut dict = Dict::new();
        for (key, value) in pairs {
            dict.insert_str(key, value.clone());
        }
        Value::dict(dict)
    }

    #[test]
    fn scalars_and_inline_arrays() {
        let value = dict_of(&[
            ("name", Value::str("demo")),
            ("count", Value::Int(3)),
            ("tags", Value::list(vec![Value::str("alpha"), Value::str("beta")])),
        ]);
        let toon = encode(&value).unwrap();
        assert_eq!(toon, "name: demo\ncount: 3\ntags[2]: alpha,beta\n");
    }

    #[test]
    fn tabular_arrays() {
        let rows = Value::list(vec![
            dict_of(&[("id", Value::Int(1)), ("name", Value::str("Alice"))]),
            dict_of(&[("id", Value::Int(2)), ("name", Value::str("Bob"))]),
        ]);
        let value = dict_of(&[("users", rows)]);
        let toon = encode(&value).unwrap();
        assert_eq!(toon, "users[2]{id,name}:\n  1,Alice\n  2,Bob\n");
    }

    #[test]
    fn nested_objects_indent() {
        let value = dict_of(&[("outer", dict_of(&[("inner", Value::Int(1))]))]);
        assert_eq!(encode(&value).unwrap(), "outer:\n  inner: 1\n");
    }

    #[test]
    fn mixed_arrays_fall_back_to_list_form() {
        let value = dict_of(&[(
            "items",
            Value::list(vec![Value::Int(1), Value::str("text")]),
        )]);
        assert_eq!(encode(&value).unwrap(), "items[2]: 1,text\n");

        let value = dict_of(&[(
            "items",
            Value::list(vec![Value::Int(1), Value::list(vec![Value::Int(2)])]),
        )]);
        assert_eq!(encode(&value).unwrap(), "items[2]:\n  - 1\n  -[1]: 2\n");
    }

    #[test]
    fn ambiguous_strings_are_quoted() {
        let value = dict_of(&[
            ("a", Value::str("has, comma")),
            ("b", Value::str("123")),
            ("c", Value::str("true")),
        ]);
        let toon = encode(&value).unwrap();
        assert_eq!(toon, "a: \"has, comma\"\nb: \"123\"\nc: \"true\"\n");
    }

    #[test]
    fn scalar_root() {
        assert_eq!(encode(&Value::Int(42)).unwrap(), "42\n");
    }
}
