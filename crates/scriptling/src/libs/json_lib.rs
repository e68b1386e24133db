//! Implementation of the `json` library.
//!
//! `loads` decodes into insertion-ordered dicts; `dumps(obj)` followed by
//! `loads` round-trips any JSON-representable value.

use std::rc::Rc;

use crate::{
    convert::{json_to_value, value_to_json},
    exception::{ExcType, Exception},
    interp::Interp,
    value::{Builtin, Library, Value},
};

pub(crate) fn build(_interp: &mut Interp) -> Result<Value, Exception> {
    let lib = Library::new("json", "JSON encoding and decoding.");

    lib.set(
        "dumps",
        Value::Builtin(Rc::new(Builtin::new(
            "dumps",
            "Encode a value as a JSON string; `indent` pretty-prints.",
            |_interp, args| {
                let value = args.require(0, "dumps")?;
                let json = value_to_json(&value)?;
                let indent = args.pos_or_kw(1, "indent");
                let text = match indent {
                    Some(Value::Int(n)) if n > 0 => serde_json::to_string_pretty(&json),
                    _ => serde_json::to_string(&json),
                }
                .map_err(|err| Exception::value_error(format!("failed to encode JSON: {err}")))?;
                Ok(Value::str(text))
            },
        ))),
    );

    lib.set(
        "loads",
        Value::Builtin(Rc::new(Builtin::new(
            "loads",
            "Decode a JSON string into a value.",
            |_interp, args| {
                let text = args.str_arg(0, "loads")?;
                let json: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
                    Exception::new(ExcType::ValueError, format!("invalid JSON: {err}"))
                })?;
                Ok(json_to_value(&json))
            },
        ))),
    );

    Ok(Value::Library(Rc::new(lib)))
}
