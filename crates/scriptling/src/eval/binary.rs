//! Binary and unary operator semantics.
//!
//! Integer op integer stays integer; mixing promotes to float. `//` floors,
//! `%` matches the sign of the divisor, `**` with a negative exponent
//! produces a float. Sequences concatenate with `+` and repeat with `*`.
//! Instances fall back to their dunder methods (`__add__` and friends).

use crate::{
    ast::{BinOp, UnaryOp},
    exception::{ExcType, Exception},
    interp::Interp,
    value::{Set, Value},
};

use super::call::{CallArgs, call_value};

pub(crate) fn binary_op(
    interp: &mut Interp,
    op: BinOp,
    left: Value,
    right: Value,
    line: u32,
) -> Result<Value, Exception> {
    // Instance dunder fallback: dispatch on the left operand's class.
    if let Value::Instance(instance) = &left {
        if let Some(method) = instance.class.lookup(dunder_name(op)) {
            return call_value(
                interp,
                method,
                CallArgs::positional(vec![left.clone(), right]),
                line,
            );
        }
        return Err(unsupported(op, &left, &right).note_line(line));
    }

    match op {
        BinOp::Add => add(left, right, line),
        BinOp::Sub => sub(left, right, line),
        BinOp::Mul => mul(left, right, line),
        BinOp::Div => div(left, right, line),
        BinOp::FloorDiv => floordiv(left, right, line),
        BinOp::Mod => modulo(left, right, line),
        BinOp::Pow => pow(left, right, line),
        BinOp::Shl | BinOp::Shr | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            bitwise(op, left, right, line)
        }
    }
}

pub(crate) fn unary_op(op: UnaryOp, value: Value, line: u32) -> Result<Value, Exception> {
    match (op, &value) {
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(*b))),
        (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => Ok(value),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (UnaryOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Invert, Value::Bool(b)) => Ok(Value::Int(!i64::from(*b))),
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.truthy())),
        _ => Err(Exception::type_error(format!(
            "bad operand type for unary operator: '{}'",
            value.type_name()
        ))
        .note_line(line)),
    }
}

/// Integer view of a value, treating booleans as 0/1.
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(line: u32) -> Exception {
    Exception::value_error("integer overflow").note_line(line)
}

fn add(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    if is_numeric(&left) && is_numeric(&right) {
        if let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) {
            return a.checked_add(b).map(Value::Int).ok_or_else(|| overflow(line));
        }
        let (a, b) = (as_float(&left).unwrap_or(0.0), as_float(&right).unwrap_or(0.0));
        return Ok(Value::Float(a + b));
    }
    match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::str(out))
        }
        (Value::List(a), Value::List(b)) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::list(out))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            let mut out = a.as_ref().clone();
            out.extend(b.iter().cloned());
            Ok(Value::tuple(out))
        }
        _ => Err(unsupported(BinOp::Add, &left, &right).note_line(line)),
    }
}

fn sub(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    if is_numeric(&left) && is_numeric(&right) {
        if let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) {
            return a.checked_sub(b).map(Value::Int).ok_or_else(|| overflow(line));
        }
        let (a, b) = (as_float(&left).unwrap_or(0.0), as_float(&right).unwrap_or(0.0));
        return Ok(Value::Float(a - b));
    }
    if let (Value::Set(a), Value::Set(b)) = (&left, &right) {
        let (a, b) = (a.borrow(), b.borrow());
        let mut out = Set::new();
        for item in a.iter() {
            if !b.contains_ok(item) {
                out.insert(item.clone()).map_err(|e| e.note_line(line))?;
            }
        }
        return Ok(Value::set(out));
    }
    Err(unsupported(BinOp::Sub, &left, &right).note_line(line))
}

fn mul(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    if is_numeric(&left) && is_numeric(&right) {
        if let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) {
            return a.checked_mul(b).map(Value::Int).ok_or_else(|| overflow(line));
        }
        let (a, b) = (as_float(&left).unwrap_or(0.0), as_float(&right).unwrap_or(0.0));
        return Ok(Value::Float(a * b));
    }
    // Sequence repetition; zero or negative counts yield empty.
    let (seq, count) = match (&left, &right) {
        (seq, count) if as_int(count).is_some() => (seq, as_int(count).unwrap_or(0)),
        (count, seq) if as_int(count).is_some() => (seq, as_int(count).unwrap_or(0)),
        _ => return Err(unsupported(BinOp::Mul, &left, &right).note_line(line)),
    };
    let count = count.max(0) as usize;
    match seq {
        Value::Str(s) => Ok(Value::str(s.repeat(count))),
        Value::List(items) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::tuple(out))
        }
        _ => Err(unsupported(BinOp::Mul, &left, &right).note_line(line)),
    }
}

fn div(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    let (Some(a), Some(b)) = (as_float(&left), as_float(&right)) else {
        return Err(unsupported(BinOp::Div, &left, &right).note_line(line));
    };
    if b == 0.0 {
        return Err(Exception::new(ExcType::ZeroDivisionError, "division by zero").note_line(line));
    }
    Ok(Value::Float(a / b))
}

fn floordiv(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    if let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) {
        if b == 0 {
            return Err(
                Exception::new(ExcType::ZeroDivisionError, "integer division or modulo by zero").note_line(line),
            );
        }
        // Floor toward negative infinity, matching Python.
        let quotient = a / b;
        let remainder = a % b;
        let floored = if remainder != 0 && (remainder < 0) != (b < 0) {
            quotient - 1
        } else {
            quotient
        };
        return Ok(Value::Int(floored));
    }
    let (Some(a), Some(b)) = (as_float(&left), as_float(&right)) else {
        return Err(unsupported(BinOp::FloorDiv, &left, &right).note_line(line));
    };
    if b == 0.0 {
        return Err(Exception::new(ExcType::ZeroDivisionError, "float floor division by zero").note_line(line));
    }
    Ok(Value::Float((a / b).floor()))
}

fn modulo(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    if let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) {
        if b == 0 {
            return Err(
                Exception::new(ExcType::ZeroDivisionError, "integer division or modulo by zero").note_line(line),
            );
        }
        // Result takes the sign of the divisor.
        let remainder = a % b;
        let adjusted = if remainder != 0 && (remainder < 0) != (b < 0) {
            remainder + b
        } else {
            remainder
        };
        return Ok(Value::Int(adjusted));
    }
    let (Some(a), Some(b)) = (as_float(&left), as_float(&right)) else {
        return Err(unsupported(BinOp::Mod, &left, &right).note_line(line));
    };
    if b == 0.0 {
        return Err(Exception::new(ExcType::ZeroDivisionError, "float modulo").note_line(line));
    }
    Ok(Value::Float(a - b * (a / b).floor()))
}

fn pow(left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    if let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) {
        if b >= 0 {
            let exp = u32::try_from(b).map_err(|_| overflow(line))?;
            return a.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow(line));
        }
        // Negative exponent produces a float.
        return Ok(Value::Float((a as f64).powf(b as f64)));
    }
    let (Some(a), Some(b)) = (as_float(&left), as_float(&right)) else {
        return Err(unsupported(BinOp::Pow, &left, &right).note_line(line));
    };
    Ok(Value::Float(a.powf(b)))
}

fn bitwise(op: BinOp, left: Value, right: Value, line: u32) -> Result<Value, Exception> {
    // Set algebra shares the bitwise operators.
    if let (Value::Set(a), Value::Set(b)) = (&left, &right) {
        let (a, b) = (a.borrow(), b.borrow());
        let mut out = Set::new();
        let mut push = |v: &Value| out.insert(v.clone()).map_err(|e| e.note_line(line));
        match op {
            BinOp::BitAnd => {
                for item in a.iter() {
                    if b.contains_ok(item) {
                        push(item)?;
                    }
                }
            }
            BinOp::BitOr => {
                for item in a.iter().chain(b.iter()) {
                    push(item)?;
                }
            }
            BinOp::BitXor => {
                for item in a.iter() {
                    if !b.contains_ok(item) {
                        push(item)?;
                    }
                }
                for item in b.iter() {
                    if !a.contains_ok(item) {
                        push(item)?;
                    }
                }
            }
            _ => return Err(unsupported(op, &left, &right).note_line(line)),
        }
        drop(push);
        return Ok(Value::set(out));
    }

    let (Some(a), Some(b)) = (as_int(&left), as_int(&right)) else {
        return Err(unsupported(op, &left, &right).note_line(line));
    };
    let result = match op {
        BinOp::Shl => {
            if b < 0 {
                return Err(Exception::value_error("negative shift count").note_line(line));
            }
            a.checked_shl(u32::try_from(b).map_err(|_| overflow(line))?)
                .ok_or_else(|| overflow(line))?
        }
        BinOp::Shr => {
            if b < 0 {
                return Err(Exception::value_error("negative shift count").note_line(line));
            }
            a >> b.min(63)
        }
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        _ => unreachable!("bitwise is only called with bit operators"),
    };
    Ok(Value::Int(result))
}

fn dunder_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "__add__",
        BinOp::Sub => "__sub__",
        BinOp::Mul => "__mul__",
        BinOp::Div => "__truediv__",
        BinOp::FloorDiv => "__floordiv__",
        BinOp::Mod => "__mod__",
        BinOp::Pow => "__pow__",
        BinOp::Shl => "__lshift__",
        BinOp::Shr => "__rshift__",
        BinOp::BitAnd => "__and__",
        BinOp::BitOr => "__or__",
        BinOp::BitXor => "__xor__",
    }
}
