//! Comparison, membership, and identity operators.

use std::{cmp::Ordering, rc::Rc};

use crate::{
    ast::CmpOp,
    exception::Exception,
    value::{Value, values_equal},
};

/// Evaluates one comparison link, returning its boolean result.
pub(crate) fn compare_op(op: CmpOp, left: &Value, right: &Value, line: u32) -> Result<bool, Exception> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
            let ordering = order_values(left, right).ok_or_else(|| {
                Exception::type_error(format!(
                    "'{op}' not supported between instances of '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                ))
                .note_line(line)
            })?;
            Ok(match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::LtEq => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        CmpOp::In => contains(right, left, line),
        CmpOp::NotIn => contains(right, left, line).map(|found| !found),
        CmpOp::Is => Ok(is_identical(left, right)),
        CmpOp::IsNot => Ok(!is_identical(left, right)),
    }
}

/// Total-order comparison where one exists: numbers cross-type, strings,
/// and sequences lexicographically. `None` means unordered.
pub(crate) fn order_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (
            Value::Int(_) | Value::Float(_) | Value::Bool(_),
            Value::Int(_) | Value::Float(_) | Value::Bool(_),
        ) => {
            let a = to_f64(left)?;
            let b = to_f64(right)?;
            a.partial_cmp(&b)
        }
        (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Value::List(a), Value::List(b)) => order_slices(&a.borrow(), &b.borrow()),
        (Value::Tuple(a), Value::Tuple(b)) => order_slices(a, b),
        _ => None,
    }
}

fn order_slices(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        if values_equal(x, y) {
            continue;
        }
        return order_values(x, y);
    }
    Some(a.len().cmp(&b.len()))
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Membership: `needle in haystack`.
fn contains(haystack: &Value, needle: &Value, line: u32) -> Result<bool, Exception> {
    match haystack {
        Value::Str(s) => match needle {
            Value::Str(sub) => Ok(s.contains(sub.as_ref())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not '{}'",
                other.type_name()
            ))
            .note_line(line)),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|item| values_equal(item, needle))),
        Value::Tuple(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        Value::Dict(dict) => dict.borrow().contains(needle).map_err(|e| e.note_line(line)),
        Value::Set(set) => set.borrow().contains(needle).map_err(|e| e.note_line(line)),
        Value::Range(range) => match needle {
            Value::Int(i) => Ok(range.contains(*i)),
            Value::Bool(b) => Ok(range.contains(i64::from(*b))),
            _ => Ok(false),
        },
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))
        .note_line(line)),
    }
}

/// Identity: immediates compare by value, shared objects by pointer.
fn is_identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
        (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
        (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
        (Value::Range(a), Value::Range(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
        (Value::Bound(a), Value::Bound(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        (Value::ExcClass(a), Value::ExcClass(b)) => a == b,
        (Value::ExcValue(a), Value::ExcValue(b)) => Rc::ptr_eq(a, b),
        (Value::Library(a), Value::Library(b)) => Rc::ptr_eq(a, b),
        (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}
