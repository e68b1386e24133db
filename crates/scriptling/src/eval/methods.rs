//! Built-in methods on strings, lists, dicts, sets, and tuples.
//!
//! Attribute access on a container produces a bound method dispatched here
//! by name; `has_method` answers whether such an attribute exists at all.

use std::cmp::Ordering;

use crate::{
    exception::{ExcType, Exception},
    interp::Interp,
    value::{Dict, Set, Value, values_equal},
};

use super::{
    call::{CallArgs, call_value},
    compare::order_values,
};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "rsplit", "splitlines", "join",
    "replace", "startswith", "endswith", "find", "rfind", "index", "count", "format",
    "capitalize", "title", "isdigit", "isalpha", "isalnum", "isspace", "zfill",
];

const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "clear", "index", "count", "sort", "reverse",
    "copy",
];

const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "clear", "update", "setdefault", "copy",
];

const SET_METHODS: &[&str] = &[
    "add", "remove", "discard", "clear", "union", "intersection", "difference", "copy",
];

const TUPLE_METHODS: &[&str] = &["index", "count"];

/// Whether `recv` exposes a built-in method called `name`.
pub(crate) fn has_method(recv: &Value, name: &str) -> bool {
    let table: &[&str] = match recv {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

pub(crate) fn call_method(
    interp: &mut Interp,
    recv: &Value,
    name: &str,
    args: CallArgs,
    line: u32,
) -> Result<Value, Exception> {
    let result = match recv {
        Value::Str(_) => str_method(recv, name, &args),
        Value::List(_) => list_method(interp, recv, name, args, line),
        Value::Dict(_) => dict_method(recv, name, &args),
        Value::Set(_) => set_method(recv, name, &args),
        Value::Tuple(_) => tuple_method(recv, name, &args),
        other => Err(Exception::attribute_error(&other.type_name(), name)),
    };
    result.map_err(|e| e.note_line(line))
}

// ----------------------------------------------------------------------
// str
// ----------------------------------------------------------------------

fn str_method(recv: &Value, name: &str, args: &CallArgs) -> Result<Value, Exception> {
    let Value::Str(s) = recv else { unreachable!("guarded by caller") };
    let s = s.as_ref();
    match name {
        "upper" => Ok(Value::str(s.to_uppercase())),
        "lower" => Ok(Value::str(s.to_lowercase())),
        "capitalize" => {
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            };
            Ok(Value::str(out))
        }
        "title" => {
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for c in s.chars() {
                if c.is_alphanumeric() {
                    if at_word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    at_word_start = false;
                } else {
                    out.push(c);
                    at_word_start = true;
                }
            }
            Ok(Value::str(out))
        }
        "strip" | "lstrip" | "rstrip" => {
            let trimmed = match args.opt(0) {
                None | Some(Value::None) => match name {
                    "strip" => s.trim(),
                    "lstrip" => s.trim_start(),
                    _ => s.trim_end(),
                }
                .to_string(),
                Some(Value::Str(chars)) => {
                    let set: Vec<char> = chars.chars().collect();
                    let pred = |c: char| set.contains(&c);
                    match name {
                        "strip" => s.trim_matches(pred),
                        "lstrip" => s.trim_start_matches(pred),
                        _ => s.trim_end_matches(pred),
                    }
                    .to_string()
                }
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "{name}() arg must be None or str, not '{}'",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::str(trimmed))
        }
        "split" => {
            let parts: Vec<Value> = match args.pos_or_kw(0, "sep") {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(Value::Str(sep)) => {
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    s.split(sep.as_ref()).map(Value::str).collect()
                }
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "split() sep must be None or str, not '{}'",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::list(parts))
        }
        "rsplit" => {
            let parts: Vec<Value> = match args.pos_or_kw(0, "sep") {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(Value::Str(sep)) => {
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    let mut parts: Vec<Value> = s.rsplit(sep.as_ref()).map(Value::str).collect();
                    parts.reverse();
                    parts
                }
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "rsplit() sep must be None or str, not '{}'",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::list(parts))
        }
        "splitlines" => Ok(Value::list(s.lines().map(Value::str).collect())),
        "join" => {
            let iterable = args.require(0, "join")?;
            let items: Vec<String> = match &iterable {
                Value::List(items) => items
                    .borrow()
                    .iter()
                    .map(require_str)
                    .collect::<Result<_, _>>()?,
                Value::Tuple(items) => items.iter().map(require_str).collect::<Result<_, _>>()?,
                other => {
                    return Err(Exception::type_error(format!(
                        "can only join an iterable of strings, not '{}'",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::str(items.join(s)))
        }
        "replace" => {
            let from = args.str_arg(0, "replace")?;
            let to = args.str_arg(1, "replace")?;
            Ok(Value::str(s.replace(&from, &to)))
        }
        "startswith" => {
            let prefix = args.str_arg(0, "startswith")?;
            Ok(Value::Bool(s.starts_with(&prefix)))
        }
        "endswith" => {
            let suffix = args.str_arg(0, "endswith")?;
            Ok(Value::Bool(s.ends_with(&suffix)))
        }
        "find" | "rfind" | "index" => {
            let needle = args.str_arg(0, name)?;
            let byte_pos = if name == "rfind" { s.rfind(&needle) } else { s.find(&needle) };
            match byte_pos {
                Some(pos) => Ok(Value::Int(s[..pos].chars().count() as i64)),
                None if name == "index" => Err(Exception::value_error("substring not found")),
                None => Ok(Value::Int(-1)),
            }
        }
        "count" => {
            let needle = args.str_arg(0, "count")?;
            if needle.is_empty() {
                return Ok(Value::Int(s.chars().count() as i64 + 1));
            }
            Ok(Value::Int(s.matches(&needle).count() as i64))
        }
        "zfill" => {
            let width = match args.require(0, "zfill")? {
                Value::Int(w) => w.max(0) as usize,
                other => {
                    return Err(Exception::type_error(format!(
                        "zfill() width must be an int, not '{}'",
                        other.type_name()
                    )));
                }
            };
            let len = s.chars().count();
            if len >= width {
                return Ok(Value::str(s));
            }
            let pad = "0".repeat(width - len);
            let out = match s.strip_prefix('-') {
                Some(rest) => format!("-{pad}{rest}"),
                None => format!("{pad}{s}"),
            };
            Ok(Value::str(out))
        }
        "isdigit" => Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))),
        "isalpha" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic))),
        "isalnum" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric))),
        "isspace" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace))),
        "format" => format_method(s, args),
        _ => Err(Exception::attribute_error("str", name)),
    }
}

fn require_str(value: &Value) -> Result<String, Exception> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(Exception::type_error(format!(
            "expected str instance, found '{}'",
            other.type_name()
        ))),
    }
}

/// `str.format` with `{}`, `{0}`, and `{name}` replacement fields.
fn format_method(template: &str, args: &CallArgs) -> Result<Value, Exception> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    field.push(c);
                }
                if !closed {
                    return Err(Exception::value_error("unmatched '{' in format string"));
                }
                let value = if field.is_empty() {
                    let value = args.opt(auto_index).ok_or_else(|| {
                        Exception::new(ExcType::IndexError, "replacement index out of range")
                    })?;
                    auto_index += 1;
                    value
                } else if let Ok(index) = field.parse::<usize>() {
                    args.opt(index).ok_or_else(|| {
                        Exception::new(ExcType::IndexError, "replacement index out of range")
                    })?
                } else {
                    args.kwarg(&field).ok_or_else(|| {
                        Exception::new(ExcType::KeyError, format!("'{field}'"))
                    })?
                };
                out.push_str(&value.str_value());
            }
            '}' => return Err(Exception::value_error("single '}' in format string")),
            c => out.push(c),
        }
    }
    Ok(Value::str(out))
}

// ----------------------------------------------------------------------
// list
// ----------------------------------------------------------------------

fn list_method(
    interp: &mut Interp,
    recv: &Value,
    name: &str,
    args: CallArgs,
    line: u32,
) -> Result<Value, Exception> {
    let Value::List(items) = recv else { unreachable!("guarded by caller") };
    match name {
        "append" => {
            items.borrow_mut().push(args.require(0, "append")?);
            Ok(Value::None)
        }
        "extend" => {
            let other = args.require(0, "extend")?;
            let values: Vec<Value> = super::iterate(interp, &other, line)?.collect();
            items.borrow_mut().extend(values);
            Ok(Value::None)
        }
        "insert" => {
            let index = match args.require(0, "insert")? {
                Value::Int(i) => i,
                other => {
                    return Err(Exception::type_error(format!(
                        "insert() index must be an int, not '{}'",
                        other.type_name()
                    )));
                }
            };
            let value = args.require(1, "insert")?;
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let clamped = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(clamped as usize, value);
            Ok(Value::None)
        }
        "pop" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::new(ExcType::IndexError, "pop from empty list"));
            }
            let len = items.len() as i64;
            let index = match args.opt(0) {
                None => len - 1,
                Some(Value::Int(i)) => {
                    if i < 0 { i + len } else { i }
                }
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "pop() index must be an int, not '{}'",
                        other.type_name()
                    )));
                }
            };
            if index < 0 || index >= len {
                return Err(Exception::new(ExcType::IndexError, "pop index out of range"));
            }
            Ok(items.remove(index as usize))
        }
        "remove" => {
            let needle = args.require(0, "remove")?;
            let mut items = items.borrow_mut();
            match items.iter().position(|item| values_equal(item, &needle)) {
                Some(pos) => {
                    items.remove(pos);
                    Ok(Value::None)
                }
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }
        "clear" => {
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "index" => {
            let needle = args.require(0, "index")?;
            let items = items.borrow();
            match items.iter().position(|item| values_equal(item, &needle)) {
                Some(pos) => Ok(Value::Int(pos as i64)),
                None => Err(Exception::value_error(format!("{} is not in list", needle.repr()))),
            }
        }
        "count" => {
            let needle = args.require(0, "count")?;
            let count = items.borrow().iter().filter(|item| values_equal(item, &needle)).count();
            Ok(Value::Int(count as i64))
        }
        "sort" => {
            let key_fn = args.kwarg("key");
            let reverse = args.kwarg("reverse").is_some_and(|v| v.truthy());
            let snapshot: Vec<Value> = items.borrow().clone();
            let sorted = sort_values(interp, snapshot, key_fn, reverse, line)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => Ok(Value::list(items.borrow().clone())),
        _ => Err(Exception::attribute_error("list", name)),
    }
}

/// Sorts values, optionally through a key function, with a single pass that
/// surfaces incomparable elements as `TypeError`.
pub(crate) fn sort_values(
    interp: &mut Interp,
    values: Vec<Value>,
    key_fn: Option<Value>,
    reverse: bool,
    line: u32,
) -> Result<Vec<Value>, Exception> {
    let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(values.len());
    for value in values {
        let key = match &key_fn {
            None | Some(Value::None) => value.clone(),
            Some(f) => call_value(interp, f.clone(), CallArgs::positional(vec![value.clone()]), line)?,
        };
        keyed.push((key, value));
    }

    let mut failure: Option<(String, String)> = None;
    keyed.sort_by(|(a, _), (b, _)| match order_values(a, b) {
        Some(ordering) => ordering,
        None => {
            if failure.is_none() {
                failure = Some((a.type_name(), b.type_name()));
            }
            Ordering::Equal
        }
    });
    if let Some((a, b)) = failure {
        return Err(
            Exception::type_error(format!("'<' not supported between instances of '{a}' and '{b}'"))
                .note_line(line),
        );
    }
    if reverse {
        keyed.reverse();
    }
    Ok(keyed.into_iter().map(|(_, v)| v).collect())
}

// ----------------------------------------------------------------------
// dict
// ----------------------------------------------------------------------

fn dict_method(recv: &Value, name: &str, args: &CallArgs) -> Result<Value, Exception> {
    let Value::Dict(dict) = recv else { unreachable!("guarded by caller") };
    match name {
        "get" => {
            let key = args.require(0, "get")?;
            match dict.borrow().get(&key)? {
                Some(value) => Ok(value),
                None => Ok(args.opt(1).unwrap_or(Value::None)),
            }
        }
        "keys" => Ok(Value::list(dict.borrow().keys())),
        "values" => Ok(Value::list(dict.borrow().values())),
        "items" => Ok(Value::list(
            dict.borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect(),
        )),
        "pop" => {
            let key = args.require(0, "pop")?;
            match dict.borrow_mut().remove(&key)? {
                Some(value) => Ok(value),
                None => match args.opt(1) {
                    Some(default) => Ok(default),
                    None => Err(Exception::new(ExcType::KeyError, key.repr())),
                },
            }
        }
        "clear" => {
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        "update" => {
            let other = args.require(0, "update")?;
            let Value::Dict(other) = other else {
                return Err(Exception::type_error(format!(
                    "update() argument must be a dict, not '{}'",
                    other.type_name()
                )));
            };
            let entries: Vec<(Value, Value)> = other
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut dict = dict.borrow_mut();
            for (key, value) in entries {
                dict.insert(key, value)?;
            }
            Ok(Value::None)
        }
        "setdefault" => {
            let key = args.require(0, "setdefault")?;
            let mut dict = dict.borrow_mut();
            if let Some(existing) = dict.get(&key)? {
                return Ok(existing);
            }
            let default = args.opt(1).unwrap_or(Value::None);
            dict.insert(key, default.clone())?;
            Ok(default)
        }
        "copy" => {
            let mut out = Dict::new();
            for (key, value) in dict.borrow().iter() {
                out.insert(key.clone(), value.clone())?;
            }
            Ok(Value::dict(out))
        }
        _ => Err(Exception::attribute_error("dict", name)),
    }
}

// ----------------------------------------------------------------------
// set
// ----------------------------------------------------------------------

fn set_method(recv: &Value, name: &str, args: &CallArgs) -> Result<Value, Exception> {
    let Value::Set(set) = recv else { unreachable!("guarded by caller") };
    match name {
        "add" => {
            set.borrow_mut().insert(args.require(0, "add")?)?;
            Ok(Value::None)
        }
        "remove" => {
            let value = args.require(0, "remove")?;
            if set.borrow_mut().remove(&value)? {
                Ok(Value::None)
            } else {
                Err(Exception::new(ExcType::KeyError, value.repr()))
            }
        }
        "discard" => {
            let value = args.require(0, "discard")?;
            set.borrow_mut().remove(&value)?;
            Ok(Value::None)
        }
        "clear" => {
            set.borrow_mut().clear();
            Ok(Value::None)
        }
        "union" | "intersection" | "difference" => {
            let other = args.require(0, name)?;
            let Value::Set(other) = other else {
                return Err(Exception::type_error(format!(
                    "{name}() argument must be a set, not '{}'",
                    other.type_name()
                )));
            };
            let (a, b) = (set.borrow(), other.borrow());
            let mut out = Set::new();
            match name {
                "union" => {
                    for item in a.iter().chain(b.iter()) {
                        out.insert(item.clone())?;
                    }
                }
                "intersection" => {
                    for item in a.iter() {
                        if b.contains_ok(item) {
                            out.insert(item.clone())?;
                        }
                    }
                }
                _ => {
                    for item in a.iter() {
                        if !b.contains_ok(item) {
                            out.insert(item.clone())?;
                        }
                    }
                }
            }
            Ok(Value::set(out))
        }
        "copy" => {
            let mut out = Set::new();
            for item in set.borrow().iter() {
                out.insert(item.clone())?;
            }
            Ok(Value::set(out))
        }
        _ => Err(Exception::attribute_error("set", name)),
    }
}

// ----------------------------------------------------------------------
// tuple
// ----------------------------------------------------------------------

fn tuple_method(recv: &Value, name: &str, args: &CallArgs) -> Result<Value, Exception> {
    let Value::Tuple(items) = recv else { unreachable!("guarded by caller") };
    match name {
        "index" => {
            let needle = args.require(0, "index")?;
            match items.iter().position(|item| values_equal(item, &needle)) {
                Some(pos) => Ok(Value::Int(pos as i64)),
                None => Err(Exception::value_error(format!("{} is not in tuple", needle.repr()))),
            }
        }
        "count" => {
            let needle = args.require(0, "count")?;
            let count = items.iter().filter(|item| values_equal(item, &needle)).count();
            Ok(Value::Int(count as i64))
        }
        _ => Err(Exception::attribute_error("tuple", name)),
    }
}
