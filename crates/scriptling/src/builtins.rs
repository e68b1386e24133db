//! Global builtin functions and the built-in exception classes.
//!
//! Builtins are not stored in environments: name resolution consults this
//! table after the frame chain misses, so script-library collection never
//! sees them as module bindings.

use std::{
    borrow::Cow,
    cmp::Ordering::{self, Greater, Less},
    rc::Rc,
};

use crate::{
    eval::{
        call::CallArgs,
        compare::order_values,
        expr::make_range,
        iterate,
        methods::sort_values,
    },
    exception::{ExcType, Exception},
    interp::Interp,
    io::PrintWriter as _,
    value::{Builtin, Dict, Set, Value, class_derives},
};

/// Resolves a global builtin or built-in exception class by name.
pub(crate) fn lookup_builtin(name: &str) -> Option<Value> {
    if let Some(exc_type) = ExcType::from_name(name) {
        return Some(Value::ExcClass(exc_type));
    }
    let builtin: Builtin = match name {
        "print" => Builtin::new("print", "Print values to the output writer.", bi_print),
        "len" => Builtin::new("len", "Number of items in a container.", bi_len),
        "range" => Builtin::new("range", "A lazy half-open integer sequence.", bi_range),
        "str" => Builtin::new("str", "Convert a value to its string form.", bi_str),
        "int" => Builtin::new("int", "Convert a value to an integer.", bi_int),
        "float" => Builtin::new("float", "Convert a value to a float.", bi_float),
        "bool" => Builtin::new("bool", "Truthiness of a value.", bi_bool),
        "list" => Builtin::new("list", "Build a list from an iterable.", bi_list),
        "tuple" => Builtin::new("tuple", "Build a tuple from an iterable.", bi_tuple),
        "dict" => Builtin::new("dict", "Build a dict.", bi_dict),
        "set" => Builtin::new("set", "Build a set from an iterable.", bi_set),
        "type" => Builtin::new("type", "Name of a value's type.", bi_type),
        "isinstance" => Builtin::new("isinstance", "Class membership test.", bi_isinstance),
        "repr" => Builtin::new("repr", "Canonical representation of a value.", bi_repr),
        "abs" => Builtin::new("abs", "Absolute value.", bi_abs),
        "min" => Builtin::new("min", "Smallest of the arguments or iterable.", bi_min),
        "max" => Builtin::new("max", "Largest of the arguments or iterable.", bi_max),
        "sum" => Builtin::new("sum", "Sum of an iterable.", bi_sum),
        "sorted" => Builtin::new("sorted", "Sorted copy of an iterable.", bi_sorted),
        "reversed" => Builtin::new("reversed", "Reversed copy of a sequence.", bi_reversed),
        "enumerate" => Builtin::new("enumerate", "Pairs of (index, item).", bi_enumerate),
        "zip" => Builtin::new("zip", "Tuples drawn from parallel iterables.", bi_zip),
        "round" => Builtin::new("round", "Round to a given precision.", bi_round),
        "exit" => Builtin::new("exit", "Terminate the script with an exit code.", bi_exit),
        _ => return None,
    };
    Some(Value::Builtin(Rc::new(builtin)))
}

fn bi_print(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let sep = match args.kwarg("sep") {
        Some(Value::Str(s)) => s.to_string(),
        _ => " ".to_string(),
    };
    let end = match args.kwarg("end") {
        Some(Value::Str(s)) => s.to_string(),
        _ => "\n".to_string(),
    };
    for (i, value) in args.args.iter().enumerate() {
        if i > 0 {
            for c in sep.chars() {
                interp.print.stdout_push(c)?;
            }
        }
        interp.print.stdout_write(Cow::Owned(value.str_value()))?;
    }
    for c in end.chars() {
        interp.print.stdout_push(c)?;
    }
    Ok(Value::None)
}

fn bi_len(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = args.require(0, "len")?;
    let len = match &value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(dict) => dict.borrow().len(),
        Value::Set(set) => set.borrow().len(),
        Value::Range(range) => range.len(),
        other => {
            return Err(Exception::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(len as i64))
}

fn bi_range(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let mut bounds = Vec::with_capacity(args.args.len());
    for value in &args.args {
        match value {
            Value::Int(i) => bounds.push(*i),
            Value::Bool(b) => bounds.push(i64::from(*b)),
            other => {
                return Err(Exception::type_error(format!(
                    "range() arguments must be integers, not '{}'",
                    other.type_name()
                )));
            }
        }
    }
    make_range(&bounds, 0)
}

fn bi_str(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    match args.opt(0) {
        Some(value) => Ok(Value::str(value.str_value())),
        None => Ok(Value::str("")),
    }
}

fn bi_int(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = match args.opt(0) {
        None => return Ok(Value::Int(0)),
        Some(value) => value,
    };
    match &value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Exception::value_error(format!("invalid literal for int(): '{s}'"))),
        other => Err(Exception::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn bi_float(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = match args.opt(0) {
        None => return Ok(Value::Float(0.0)),
        Some(value) => value,
    };
    match &value {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Exception::value_error(format!("could not convert string to float: '{s}'"))),
        other => Err(Exception::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn bi_bool(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    Ok(Value::Bool(args.opt(0).is_some_and(|v| v.truthy())))
}

fn bi_list(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    match args.opt(0) {
        None => Ok(Value::list(Vec::new())),
        Some(value) => Ok(Value::list(iterate(interp, &value, 0)?.collect())),
    }
}

fn bi_tuple(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    match args.opt(0) {
        None => Ok(Value::tuple(Vec::new())),
        Some(value) => Ok(Value::tuple(iterate(interp, &value, 0)?.collect())),
    }
}

fn bi_dict(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let mut dict = Dict::new();
    if let Some(value) = args.opt(0) {
        let Value::Dict(other) = value else {
            return Err(Exception::type_error(format!(
                "dict() argument must be a dict, not '{}'",
                value.type_name()
            )));
        };
        for (key, val) in other.borrow().iter() {
            dict.insert(key.clone(), val.clone())?;
        }
    }
    for (name, value) in &args.kwargs {
        dict.insert_str(name, value.clone());
    }
    Ok(Value::dict(dict))
}

fn bi_set(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let mut set = Set::new();
    if let Some(value) = args.opt(0) {
        for item in iterate(interp, &value, 0)? {
            set.insert(item)?;
        }
    }
    Ok(Value::set(set))
}

fn bi_type(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = args.require(0, "type")?;
    Ok(Value::str(value.type_name()))
}

fn bi_isinstance(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = args.require(0, "isinstance")?;
    let spec = args.require(1, "isinstance")?;
    Ok(Value::Bool(isinstance(&value, &spec)?))
}

fn isinstance(value: &Value, spec: &Value) -> Result<bool, Exception> {
    match spec {
        Value::Tuple(options) => {
            for option in options.iter() {
                if isinstance(value, option)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Class(class) => match value {
            Value::Instance(instance) => Ok(class_derives(&instance.class, class)),
            _ => Ok(false),
        },
        Value::ExcClass(exc_type) => match value {
            Value::ExcValue(exc) => Ok(exc_type.catches(exc.kind.root())),
            Value::Instance(instance) => Ok(instance
                .class
                .exc_root()
                .is_some_and(|root| exc_type.catches(root))),
            _ => Ok(false),
        },
        // The builtin constructors double as type objects for isinstance.
        Value::Builtin(builtin) => Ok(match builtin.name.as_str() {
            "str" => matches!(value, Value::Str(_)),
            "int" => matches!(value, Value::Int(_)),
            "float" => matches!(value, Value::Float(_)),
            "bool" => matches!(value, Value::Bool(_)),
            "list" => matches!(value, Value::List(_)),
            "tuple" => matches!(value, Value::Tuple(_)),
            "dict" => matches!(value, Value::Dict(_)),
            "set" => matches!(value, Value::Set(_)),
            "range" => matches!(value, Value::Range(_)),
            _ => false,
        }),
        other => Err(Exception::type_error(format!(
            "isinstance() arg 2 must be a type, not '{}'",
            other.type_name()
        ))),
    }
}

fn bi_repr(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    Ok(Value::str(args.require(0, "repr")?.repr()))
}

fn bi_abs(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    match args.require(0, "abs")? {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        other => Err(Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn bi_min(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    extremum(interp, args, "min", Less)
}

fn bi_max(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    extremum(interp, args, "max", Greater)
}

fn extremum(
    interp: &mut Interp,
    args: CallArgs,
    name: &str,
    wanted: Ordering,
) -> Result<Value, Exception> {
    let candidates: Vec<Value> = if args.args.len() == 1 {
        iterate(interp, &args.args[0], 0)?.collect()
    } else {
        args.args.clone()
    };
    let mut best = candidates
        .first()
        .cloned()
        .ok_or_else(|| Exception::value_error(format!("{name}() arg is an empty sequence")))?;
    for candidate in candidates.into_iter().skip(1) {
        let ordering = order_values(&candidate, &best).ok_or_else(|| {
            Exception::type_error(format!(
                "'{name}' not supported between instances of '{}' and '{}'",
                candidate.type_name(),
                best.type_name()
            ))
        })?;
        if ordering == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn bi_sum(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let iterable = args.require(0, "sum")?;
    let mut total = args.opt(1).unwrap_or(Value::Int(0));
    for item in iterate(interp, &iterable, 0)? {
        total = crate::eval::binary::binary_op(interp, crate::ast::BinOp::Add, total, item, 0)?;
    }
    Ok(total)
}

fn bi_sorted(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let iterable = args.require(0, "sorted")?;
    let values: Vec<Value> = iterate(interp, &iterable, 0)?.collect();
    let key_fn = args.kwarg("key");
    let reverse = args.kwarg("reverse").is_some_and(|v| v.truthy());
    Ok(Value::list(sort_values(interp, values, key_fn, reverse, 0)?))
}

fn bi_reversed(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let iterable = args.require(0, "reversed")?;
    let mut values: Vec<Value> = iterate(interp, &iterable, 0)?.collect();
    values.reverse();
    Ok(Value::list(values))
}

fn bi_enumerate(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let iterable = args.require(0, "enumerate")?;
    let start = match args.pos_or_kw(1, "start") {
        Some(Value::Int(i)) => i,
        _ => 0,
    };
    let values: Vec<Value> = iterate(interp, &iterable, 0)?
        .enumerate()
        .map(|(i, item)| Value::tuple(vec![Value::Int(start + i as i64), item]))
        .collect();
    Ok(Value::list(values))
}

fn bi_zip(interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let mut columns = Vec::with_capacity(args.args.len());
    for iterable in &args.args {
        columns.push(iterate(interp, iterable, 0)?.collect::<Vec<Value>>());
    }
    let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut rows = Vec::with_capacity(shortest);
    for i in 0..shortest {
        rows.push(Value::tuple(columns.iter().map(|col| col[i].clone()).collect()));
    }
    Ok(Value::list(rows))
}

fn bi_round(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let value = args.require(0, "round")?;
    let digits = match args.opt(1) {
        None | Some(Value::None) => None,
        Some(Value::Int(i)) => Some(i),
        Some(other) => {
            return Err(Exception::type_error(format!(
                "round() ndigits must be an int, not '{}'",
                other.type_name()
            )));
        }
    };
    match (&value, digits) {
        (Value::Int(_), _) => Ok(value),
        (Value::Float(f), None) => Ok(Value::Int(f.round_ties_even() as i64)),
        (Value::Float(f), Some(d)) => {
            let factor = 10f64.powi(d.clamp(-18, 18) as i32);
            Ok(Value::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(Exception::type_error(format!(
            "round() argument must be a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn bi_exit(_interp: &mut Interp, args: CallArgs) -> Result<Value, Exception> {
    let code = match args.opt(0) {
        None => 0,
        Some(Value::Int(code)) => code,
        Some(Value::Bool(b)) => i64::from(b),
        Some(other) => {
            return Err(Exception::type_error(format!(
                "exit() code must be an int, not '{}'",
                other.type_name()
            )));
        }
    };
    Err(Exception::system_exit(code))
}
