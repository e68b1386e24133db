//! The `scriptling.mcp.tool` library: typed parameter accessors and the
//! `return_*` helpers that terminate a tool script.
//!
//! Parameters arrive in the reserved `__mcp_params` dict; responses leave
//! through `__mcp_response`. The `return_*` helpers write the response and
//! raise `SystemExit`, which no generic handler can swallow, so script code
//! after the first `return_*` call is unreachable.

use std::rc::Rc;

use crate::{
    convert::value_to_json,
    eval::call::CallArgs,
    exception::Exception,
    interp::Interp,
    toon,
    tool::{PARAMS_VAR, RESPONSE_VAR},
    value::{Builtin, Library, Value},
};

pub(crate) const LIBRARY_NAME: &str = "scriptling.mcp.tool";

pub(crate) fn build(_interp: &mut Interp) -> Result<Value, Exception> {
    let lib = Library::new(LIBRARY_NAME, "Tool-harness parameter accessors and response helpers.");

    let accessors: &[(&str, &str, fn(&mut Interp, CallArgs) -> Result<Value, Exception>)] = &[
        ("get_string", "String parameter, trimmed; default on missing or blank.", get_string),
        ("get_int", "Integer parameter with lenient coercion.", get_int),
        ("get_float", "Float parameter with lenient coercion.", get_float),
        ("get_bool", "Boolean parameter with lenient coercion.", get_bool),
        ("get_list", "List parameter; comma-splits string values.", get_list),
        ("get_string_list", "List of strings; non-coercible elements drop.", get_string_list),
        ("get_int_list", "List of ints; non-coercible elements drop.", get_int_list),
        ("get_float_list", "List of floats; non-coercible elements drop.", get_float_list),
        ("get_bool_list", "List of bools; non-coercible elements drop.", get_bool_list),
        ("return_string", "Respond with raw text and stop the script.", return_string),
        ("return_object", "Respond with a JSON-encoded value and stop.", return_object),
        ("return_toon", "Respond with a TOON-encoded value and stop.", return_toon),
        ("return_error", "Respond with an error and stop with exit code 1.", return_error),
    ];
    for (name, doc, func) in accessors {
        lib.set(*name, Value::Builtin(Rc::new(Builtin::new(*name, *doc, *func))));
    }
    Ok(Value::Library(Rc::new(lib)))
}

/// Reads one raw parameter from `__mcp_params`.
fn param(interp: &Interp, name: &str) -> Option<Value> {
    let Some(Value::Dict(params)) = interp.get_global(PARAMS_VAR) else {
        return None;
    };
    let value = params.borrow().get_str(name);
    value
}

// ----------------------------------------------------------------------
// Coercions
// ----------------------------------------------------------------------

/// int: Integer keeps, Float truncates, decimal String parses.
pub(crate) fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Float(f) => Some(*f as i64),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// float: Integer/Float promote, String parses.
pub(crate) fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Float(f) => Some(*f),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// bool: Boolean keeps; `"true"`/`"1"` and `"false"`/`"0"` parse
/// case-insensitively; Integer is truthy on nonzero.
pub(crate) fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// string: any value coerces via `str()` then trims; blank is a miss.
pub(crate) fn coerce_string(value: &Value) -> Option<String> {
    if matches!(value, Value::None) {
        return None;
    }
    let text = value.str_value().trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

/// list: List keeps; String splits on `","` with per-element trim.
pub(crate) fn coerce_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) => Some(items.borrow().clone()),
        Value::Str(s) => Some(s.split(',').map(|part| Value::str(part.trim())).collect()),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Accessors
// ----------------------------------------------------------------------

fn get_string(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let name = args.str_arg(0, "get_string")?;
    let default = args.pos_or_kw(1, "default").unwrap_or_else(|| Value::str(""));
    Ok(param(interp, &name)
        .as_ref()
        .and_then(coerce_string)
        .map_or(default, Value::str))
}

fn get_int(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let name = args.str_arg(0, "get_int")?;
    let default = args.pos_or_kw(1, "default").unwrap_or(Value::Int(0));
    Ok(param(interp, &name)
        .as_ref()
        .and_then(coerce_int)
        .map_or(default, Value::Int))
}

fn get_float(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let name = args.str_arg(0, "get_float")?;
    let default = args.pos_or_kw(1, "default").unwrap_or(Value::Float(0.0));
    Ok(param(interp, &name)
        .as_ref()
        .and_then(coerce_float)
        .map_or(default, Value::Float))
}

fn get_bool(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let name = args.str_arg(0, "get_bool")?;
    let default = args.pos_or_kw(1, "default").unwrap_or(Value::Bool(false));
    Ok(param(interp, &name)
        .as_ref()
        .and_then(coerce_bool)
        .map_or(default, Value::Bool))
}

fn get_list(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let name = args.str_arg(0, "get_list")?;
    let default = args
        .pos_or_kw(1, "default")
        .unwrap_or_else(|| Value::list(Vec::new()));
    Ok(param(interp, &name)
        .as_ref()
        .and_then(coerce_list)
        .map_or(default, Value::list))
}

fn typed_list<T, F, G>(
    interp: &Interp,
    args: &CallArgs,
    fn_name: &str,
    coerce: F,
    wrap: G,
) -> Result<Value, Exception>
where
    F: Fn(&Value) -> Option<T>,
    G: Fn(T) -> Value,
{
    let name = args.str_arg(0, fn_name)?;
    let default = args
        .pos_or_kw(1, "default")
        .unwrap_or_else(|| Value::list(Vec::new()));
    let Some(Value::List(items)) = param(interp, &name) else {
        return Ok(default);
    };
    // Elements that fail the typed coercion drop silently.
    let out: Vec<Value> = items.borrow().iter().filter_map(|v| coerce(v).map(&wrap)).collect();
    Ok(Value::list(out))
}

fn get_string_list(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    typed_list(interp, &args, "get_string_list", coerce_string, Value::str)
}

fn get_int_list(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    typed_list(interp, &args, "get_int_list", coerce_int, Value::Int)
}

fn get_float_list(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    typed_list(interp, &args, "get_float_list", coerce_float, Value::Float)
}

fn get_bool_list(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    typed_list(interp, &args, "get_bool_list", coerce_bool, Value::Bool)
}

// ----------------------------------------------------------------------
// Responses
// ----------------------------------------------------------------------

fn respond(interp: &mut Interp, text: String, code: i64) -> Result<Value, Exception> {
    interp.set_global(RESPONSE_VAR, Value::str(text));
    Err(Exception::system_exit(code))
}

fn return_string(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let text = args.require(0, "return_string")?.str_value();
    respond(interp, text, 0)
}

fn return_object(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = args.require(0, "return_object")?;
    let json = value_to_json(&value)?;
    let text = serde_json::to_string(&json)
        .map_err(|err| Exception::value_error(format!("failed to encode response: {err}")))?;
    respond(interp, text, 0)
}

fn return_toon(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = args.require(0, "return_toon")?;
    let text = toon::encode(&value)?;
    respond(interp, text, 0)
}

fn return_error(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let message = args.require(0, "return_error")?.str_value();
    let body = serde_json::json!({ "error": message });
    let text = serde_json::to_string(&body)
        .map_err(|err| Exception::value_error(format!("failed to encode response: {err}")))?;
    respond(interp, text, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_coercion_table() {
        assert_eq!(coerce_int(&Value::Int(42)), Some(42));
        assert_eq!(coerce_int(&Value::Float(3.9)), Some(3));
        assert_eq!(coerce_int(&Value::str("100")), Some(100));
        assert_eq!(coerce_int(&Value::str(" 7 ")), Some(7));
        assert_eq!(coerce_int(&Value::str("abc")), None);
        assert_eq!(coerce_int(&Value::None), None);
        assert_eq!(coerce_int(&Value::list(vec![])), None);
    }

    #[test]
    fn bool_coercion_table() {
        assert_eq!(coerce_bool(&Value::Bool(true)), Some(true));
        assert_eq!(coerce_bool(&Value::str("TRUE")), Some(true));
        assert_eq!(coerce_bool(&Value::str(" 1 ")), Some(true));
        assert_eq!(coerce_bool(&Value::str("False")), Some(false));
        assert_eq!(coerce_bool(&Value::str("0")), Some(false));
        assert_eq!(coerce_bool(&Value::str("yes")), None);
        assert_eq!(coerce_bool(&Value::Int(2)), Some(true));
        assert_eq!(coerce_bool(&Value::Int(0)), Some(false));
    }

    #[test]
    fn string_coercion_trims_and_rejects_blank() {
        assert_eq!(coerce_string(&Value::str("  x  ")), Some("x".to_string()));
        assert_eq!(coerce_string(&Value::str("   ")), None);
        assert_eq!(coerce_string(&Value::str("")), None);
        assert_eq!(coerce_string(&Value::Int(42)), Some("42".to_string()));
        assert_eq!(coerce_string(&Value::None), None);
    }

    #[test]
    fn list_coercion_splits_strings() {
        let items = coerce_list(&Value::str("a, b ,c")).unwrap();
        let rendered: Vec<String> = items.iter().map(Value::str_value).collect();
        assert_eq!(rendered, vec!["a", "b", "c"]);
        assert!(coerce_list(&Value::Int(1)).is_none());
    }
}
