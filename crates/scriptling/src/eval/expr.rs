//! Expression evaluation: literals, lookups, attribute and subscript access,
//! comprehensions, and f-string formatting.

use std::rc::Rc;

use crate::{
    ast::{BoolOp, CompClause, Expr, ExprKind, FStringPart, Index, UnaryOp},
    builtins::lookup_builtin,
    env::{Env, FrameKind},
    exception::{ExcType, Exception},
    interp::Interp,
    value::{Bound, BoundTarget, Dict, Range, Set, Value, format_float},
};

use super::{
    assign_target,
    binary::{binary_op, unary_op},
    call::{call_value, eval_call_args},
    compare::compare_op,
    iterate,
    methods::has_method,
};

pub(crate) fn eval_expr(interp: &mut Interp, env: &Env, expr: &Expr) -> Result<Value, Exception> {
    match &expr.node {
        ExprKind::NoneLit => Ok(Value::None),
        ExprKind::True => Ok(Value::Bool(true)),
        ExprKind::False => Ok(Value::Bool(false)),
        ExprKind::Int(i) => Ok(Value::Int(*i)),
        ExprKind::Float(f) => Ok(Value::Float(*f)),
        ExprKind::Str(s) => Ok(Value::Str(s.clone())),
        ExprKind::Ident(name) => match env.lookup(name) {
            Ok(value) => Ok(value),
            Err(err) => lookup_builtin(name).ok_or_else(|| err.note_line(expr.line)),
        },
        ExprKind::Unary { op, operand } => {
            let value = eval_expr(interp, env, operand)?;
            if *op == UnaryOp::Not {
                return Ok(Value::Bool(!value.truthy()));
            }
            unary_op(*op, value, expr.line)
        }
        ExprKind::Binary { op, left, right } => {
            let lhs = eval_expr(interp, env, left)?;
            let rhs = eval_expr(interp, env, right)?;
            binary_op(interp, *op, lhs, rhs, expr.line)
        }
        ExprKind::Bool { op, left, right } => {
            let lhs = eval_expr(interp, env, left)?;
            // Short-circuit: the deciding operand is returned as-is.
            let decided = match op {
                BoolOp::And => !lhs.truthy(),
                BoolOp::Or => lhs.truthy(),
            };
            if decided {
                return Ok(lhs);
            }
            eval_expr(interp, env, right)
        }
        ExprKind::Compare { first, rest } => {
            let mut left = eval_expr(interp, env, first)?;
            for (op, right_expr) in rest {
                // Each middle operand is evaluated exactly once.
                let right = eval_expr(interp, env, right_expr)?;
                if !compare_op(*op, &left, &right, expr.line)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        ExprKind::Cond { test, body, orelse } => {
            if eval_expr(interp, env, test)?.truthy() {
                eval_expr(interp, env, body)
            } else {
                eval_expr(interp, env, orelse)
            }
        }
        ExprKind::Lambda(def) => {
            let function = super::make_function(interp, env, def)?;
            Ok(Value::Function(Rc::new(function)))
        }
        ExprKind::Call { func, args } => {
            let callee = eval_expr(interp, env, func)?;
            let call_args = eval_call_args(interp, env, args, expr.line)?;
            call_value(interp, callee, call_args, expr.line)
        }
        ExprKind::Attribute { value, attr } => {
            let obj = eval_expr(interp, env, value)?;
            attr_get(&obj, attr, expr.line)
        }
        ExprKind::Subscript { value, index } => {
            let obj = eval_expr(interp, env, value)?;
            match index.as_ref() {
                Index::Single(index_expr) => {
                    let key = eval_expr(interp, env, index_expr)?;
                    subscript_get(&obj, &key, expr.line)
                }
                Index::Slice { start, stop, step } => {
                    let start = eval_slice_bound(interp, env, start.as_ref())?;
                    let stop = eval_slice_bound(interp, env, stop.as_ref())?;
                    let step = eval_slice_bound(interp, env, step.as_ref())?;
                    slice_get(&obj, start, stop, step, expr.line)
                }
            }
        }
        ExprKind::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(interp, env, item)?);
            }
            Ok(Value::list(values))
        }
        ExprKind::Tuple(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(interp, env, item)?);
            }
            Ok(Value::tuple(values))
        }
        ExprKind::Set(items) => {
            let mut set = Set::new();
            for item in items {
                let value = eval_expr(interp, env, item)?;
                set.insert(value).map_err(|e| e.note_line(expr.line))?;
            }
            Ok(Value::set(set))
        }
        ExprKind::Dict(pairs) => {
            let mut dict = Dict::new();
            for (key_expr, value_expr) in pairs {
                let key = eval_expr(interp, env, key_expr)?;
                let value = eval_expr(interp, env, value_expr)?;
                dict.insert(key, value).map_err(|e| e.note_line(expr.line))?;
            }
            Ok(Value::dict(dict))
        }
        ExprKind::ListComp { elt, clauses } => {
            let scope = env.child(FrameKind::Comprehension);
            let mut out = Vec::new();
            run_comp(interp, &scope, clauses, 0, &mut |interp, scope| {
                out.push(eval_expr(interp, scope, elt)?);
                Ok(())
            })?;
            Ok(Value::list(out))
        }
        ExprKind::SetComp { elt, clauses } => {
            let scope = env.child(FrameKind::Comprehension);
            let mut out = Set::new();
            run_comp(interp, &scope, clauses, 0, &mut |interp, scope| {
                let value = eval_expr(interp, scope, elt)?;
                out.insert(value).map_err(|e| e.note_line(elt.line))
            })?;
            Ok(Value::set(out))
        }
        ExprKind::DictComp { key, value, clauses } => {
            let scope = env.child(FrameKind::Comprehension);
            let mut out = Dict::new();
            run_comp(interp, &scope, clauses, 0, &mut |interp, scope| {
                let k = eval_expr(interp, scope, key)?;
                let v = eval_expr(interp, scope, value)?;
                out.insert(k, v).map_err(|e| e.note_line(key.line))
            })?;
            Ok(Value::dict(out))
        }
        ExprKind::FString(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    FStringPart::Literal(text) => out.push_str(text),
                    FStringPart::Expr { expr: inner, conversion, format } => {
                        let value = eval_expr(interp, env, inner)?;
                        let rendered = match conversion {
                            Some('r') => value.repr(),
                            _ => value.str_value(),
                        };
                        match format {
                            Some(spec) => {
                                out.push_str(&apply_format(&value, &rendered, spec, inner.line)?);
                            }
                            None => out.push_str(&rendered),
                        }
                    }
                }
            }
            Ok(Value::str(out))
        }
    }
}

fn eval_slice_bound(
    interp: &mut Interp,
    env: &Env,
    bound: Option<&Expr>,
) -> Result<Option<i64>, Exception> {
    match bound {
        None => Ok(None),
        Some(expr) => match eval_expr(interp, env, expr)? {
            Value::Int(i) => Ok(Some(i)),
            Value::None => Ok(None),
            other => Err(Exception::type_error(format!(
                "slice indices must be integers, not '{}'",
                other.type_name()
            ))
            .note_line(expr.line)),
        },
    }
}

/// Recursively drives comprehension clauses, calling `emit` per element.
fn run_comp(
    interp: &mut Interp,
    scope: &Env,
    clauses: &[CompClause],
    depth: usize,
    emit: &mut dyn FnMut(&mut Interp, &Env) -> Result<(), Exception>,
) -> Result<(), Exception> {
    let Some(clause) = clauses.get(depth) else {
        return emit(interp, scope);
    };
    let iterable = eval_expr(interp, scope, &clause.iter)?;
    let mut values = iterate(interp, &iterable, clause.iter.line)?;
    'outer: while let Some(item) = values.next() {
        interp
            .limits
            .check_interrupt()
            .map_err(|e| e.note_line(clause.iter.line))?;
        assign_target(interp, scope, &clause.target, item)?;
        for cond in &clause.ifs {
            if !eval_expr(interp, scope, cond)?.truthy() {
                continue 'outer;
            }
        }
        run_comp(interp, scope, clauses, depth + 1, emit)?;
    }
    Ok(())
}

/// Attribute read with the spec's resolution order.
pub(crate) fn attr_get(obj: &Value, attr: &str, line: u32) -> Result<Value, Exception> {
    match obj {
        Value::Instance(instance) => {
            // Field map first, then the class chain.
            if let Some(value) = instance.fields.borrow().get(attr) {
                return Ok(value.clone());
            }
            match instance.class.lookup(attr) {
                Some(Value::Function(func)) => Ok(Value::Bound(Rc::new(Bound {
                    recv: obj.clone(),
                    target: BoundTarget::Function(func),
                }))),
                Some(value) => Ok(value),
                None => Err(Exception::attribute_error(&instance.class.name, attr).note_line(line)),
            }
        }
        Value::Class(class) => class
            .lookup(attr)
            .ok_or_else(|| Exception::attribute_error(&class.name, attr).note_line(line)),
        Value::Library(lib) => lib
            .get(attr)
            .ok_or_else(|| Exception::attribute_error(&format!("library '{}'", lib.name), attr).note_line(line)),
        Value::ExcValue(exc) => match attr {
            "message" => Ok(exc
                .message
                .as_deref()
                .map_or(Value::None, Value::str)),
            "code" => Ok(exc.exit_code.map_or(Value::None, Value::Int)),
            "cause" => Ok(exc
                .cause
                .as_ref()
                .map_or(Value::None, |cause| Value::ExcValue(Rc::new((**cause).clone())))),
            _ => Err(Exception::attribute_error(&exc.kind.name(), attr).note_line(line)),
        },
        _ if has_method(obj, attr) => Ok(Value::Bound(Rc::new(Bound {
            recv: obj.clone(),
            target: BoundTarget::Method(attr.to_string()),
        }))),
        other => Err(Exception::attribute_error(&other.type_name(), attr).note_line(line)),
    }
}

/// Attribute write: instance fields, class members, and library members are
/// the writable surfaces.
pub(crate) fn attr_set(obj: &Value, attr: &str, value: Value, line: u32) -> Result<(), Exception> {
    match obj {
        Value::Instance(instance) => {
            instance.fields.borrow_mut().insert(attr.to_string(), value);
            Ok(())
        }
        Value::Class(class) => {
            class.members.borrow_mut().insert(attr.to_string(), value);
            Ok(())
        }
        Value::Library(lib) => {
            lib.set(attr, value);
            Ok(())
        }
        other => Err(Exception::attribute_error(&other.type_name(), attr).note_line(line)),
    }
}

/// `obj[key]` for a single (non-slice) subscript.
pub(crate) fn subscript_get(obj: &Value, key: &Value, line: u32) -> Result<Value, Exception> {
    match obj {
        Value::List(items) => {
            let items = items.borrow();
            let index = resolve_index(key, items.len(), line)?;
            Ok(items[index].clone())
        }
        Value::Tuple(items) => {
            let index = resolve_index(key, items.len(), line)?;
            Ok(items[index].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let index = resolve_index(key, chars.len(), line)?;
            Ok(Value::str(chars[index].to_string()))
        }
        Value::Dict(dict) => match dict.borrow().get(key).map_err(|e| e.note_line(line))? {
            Some(value) => Ok(value),
            None => Err(Exception::new(ExcType::KeyError, key.repr()).note_line(line)),
        },
        Value::Range(range) => {
            let index = resolve_index(key, range.len(), line)?;
            Ok(Value::Int(range.start + range.step * index as i64))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))
        .note_line(line)),
    }
}

/// `obj[key] = value`.
pub(crate) fn subscript_set(obj: &Value, key: Value, value: Value, line: u32) -> Result<(), Exception> {
    match obj {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let len = items.len();
            let index = resolve_index(&key, len, line)?;
            items[index] = value;
            Ok(())
        }
        Value::Dict(dict) => dict
            .borrow_mut()
            .insert(key, value)
            .map_err(|e| e.note_line(line)),
        other => Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))
        .note_line(line)),
    }
}

/// Converts a subscript key into a bounds-checked index, handling negatives.
fn resolve_index(key: &Value, len: usize, line: u32) -> Result<usize, Exception> {
    let raw = match key {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        other => {
            return Err(Exception::type_error(format!(
                "indices must be integers, not '{}'",
                other.type_name()
            ))
            .note_line(line));
        }
    };
    let adjusted = if raw < 0 { raw + len as i64 } else { raw };
    if adjusted < 0 || adjusted as usize >= len {
        return Err(Exception::new(ExcType::IndexError, "index out of range").note_line(line));
    }
    Ok(adjusted as usize)
}

/// `obj[start:stop:step]` on sequences, with Python clamping.
pub(crate) fn slice_get(
    obj: &Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    line: u32,
) -> Result<Value, Exception> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Exception::value_error("slice step cannot be zero").note_line(line));
    }
    match obj {
        Value::List(items) => {
            let items = items.borrow();
            Ok(Value::list(slice_vec(&items, start, stop, step)))
        }
        Value::Tuple(items) => Ok(Value::tuple(slice_vec(items, start, stop, step))),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let indices = slice_indices(chars.len(), start, stop, step);
            let out: String = indices.into_iter().map(|i| chars[i]).collect();
            Ok(Value::str(out))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not sliceable",
            other.type_name()
        ))
        .note_line(line)),
    }
}

fn slice_vec(items: &[Value], start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<Value> {
    slice_indices(items.len(), start, stop, step)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Computes the element indices a slice selects, mirroring Python's clamp
/// rules for out-of-range and negative bounds.
fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let clamp = |v: i64, low: i64, high: i64| v.max(low).min(high);
    let adjust = |v: i64| if v < 0 { v + len } else { v };

    let (start, stop) = if step > 0 {
        (
            clamp(start.map_or(0, adjust), 0, len),
            clamp(stop.map_or(len, adjust), 0, len),
        )
    } else {
        (
            clamp(start.map_or(len - 1, adjust), -1, len - 1),
            clamp(stop.map_or(-1, adjust), -1, len - 1),
        )
    };

    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    out
}

/// Applies a format spec (`[[fill]align][sign][width][.precision][type]`) to
/// a value inside an f-string.
pub(crate) fn apply_format(value: &Value, rendered: &str, spec: &str, line: u32) -> Result<String, Exception> {
    let chars: Vec<char> = spec.chars().collect();
    let mut pos = 0;

    let mut fill = ' ';
    let mut align: Option<char> = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
        fill = chars[0];
        align = Some(chars[1]);
        pos = 2;
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^') {
        align = Some(chars[0]);
        pos = 1;
    }

    let mut sign: Option<char> = None;
    if pos < chars.len() && matches!(chars[pos], '+' | '-' | ' ') {
        sign = Some(chars[pos]);
        pos += 1;
    }

    let mut width = 0usize;
    while pos < chars.len() && chars[pos].is_ascii_digit() {
        width = width * 10 + chars[pos].to_digit(10).unwrap_or(0) as usize;
        pos += 1;
    }

    let mut precision: Option<usize> = None;
    if pos < chars.len() && chars[pos] == '.' {
        pos += 1;
        let mut p = 0usize;
        let mut digits = false;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            p = p * 10 + chars[pos].to_digit(10).unwrap_or(0) as usize;
            pos += 1;
            digits = true;
        }
        if !digits {
            return Err(Exception::value_error(format!("invalid format spec '{spec}'")).note_line(line));
        }
        precision = Some(p);
    }

    let presentation = if pos < chars.len() { Some(chars[pos]) } else { None };

    let numeric = matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_));
    let mut body = match presentation {
        Some('f') => match to_float(value) {
            Some(f) => format!("{f:.prec$}", prec = precision.unwrap_or(6)),
            None => {
                return Err(
                    Exception::value_error(format!("cannot format '{}' with 'f'", value.type_name())).note_line(line),
                );
            }
        },
        Some('e') => match to_float(value) {
            Some(f) => format!("{f:.prec$e}", prec = precision.unwrap_or(6)),
            None => {
                return Err(
                    Exception::value_error(format!("cannot format '{}' with 'e'", value.type_name())).note_line(line),
                );
            }
        },
        Some('d') => match value {
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => i64::from(*b).to_string(),
            _ => {
                return Err(
                    Exception::value_error(format!("cannot format '{}' with 'd'", value.type_name())).note_line(line),
                );
            }
        },
        Some('s') | None => {
            let mut text = match value {
                Value::Float(f) => format_float(*f),
                _ => rendered.to_string(),
            };
            if let Some(p) = precision
                && !numeric
            {
                text.truncate(text.chars().take(p).map(char::len_utf8).sum());
            }
            text
        }
        Some(other) => {
            return Err(Exception::value_error(format!("unknown format code '{other}'")).note_line(line));
        }
    };

    if let Some('+' | ' ') = sign
        && numeric
        && !body.starts_with('-')
    {
        let prefix = if sign == Some('+') { '+' } else { ' ' };
        body.insert(0, prefix);
    }

    let pad = width.saturating_sub(body.chars().count());
    if pad == 0 {
        return Ok(body);
    }
    let align = align.unwrap_or(if numeric { '>' } else { '<' });
    let filler: String = std::iter::repeat_n(fill, pad).collect();
    Ok(match align {
        '<' => format!("{body}{filler}"),
        '>' => format!("{filler}{body}"),
        _ => {
            let left = pad / 2;
            let right = pad - left;
            let left: String = std::iter::repeat_n(fill, left).collect();
            let right: String = std::iter::repeat_n(fill, right).collect();
            format!("{left}{body}{right}")
        }
    })
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Builds a `range()` value with Python argument semantics.
pub(crate) fn make_range(args: &[i64], line: u32) -> Result<Value, Exception> {
    let range = match args {
        [stop] => Range { start: 0, stop: *stop, step: 1 },
        [start, stop] => Range { start: *start, stop: *stop, step: 1 },
        [start, stop, step] => {
            if *step == 0 {
                return Err(Exception::value_error("range() arg 3 must not be zero").note_line(line));
            }
            Range { start: *start, stop: *stop, step: *step }
        }
        _ => {
            return Err(Exception::type_error(format!(
                "range expected 1 to 3 arguments, got {}",
                args.len()
            ))
            .note_line(line));
        }
    };
    Ok(Value::Range(range))
}
