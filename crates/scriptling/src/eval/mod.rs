//! The tree-walking evaluator.
//!
//! Statement execution returns a [`Flow`] token or unwinds with an
//! [`Exception`]. The cooperative cancellation and call-depth checks fire
//! before each statement and on each function-call entry; those are the only
//! suspension points.

pub(crate) mod binary;
pub(crate) mod call;
pub(crate) mod compare;
pub(crate) mod expr;
pub(crate) mod methods;

use std::rc::Rc;

use crate::{
    ast::{ExceptHandler, Expr, ExprKind, Index, Stmt, StmtKind},
    env::{Env, FrameKind},
    exception::{ExcKind, ExcType, Exception},
    interp::Interp,
    value::{Class, Function, Param, Value, class_derives},
};

use self::{
    binary::binary_op,
    call::{CallArgs, call_value},
    expr::{attr_get, attr_set, eval_expr, subscript_get, subscript_set},
};

/// Result of executing one statement.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Executes a suite of statements, stopping at the first control-flow token
/// or exception.
pub(crate) fn exec_block(interp: &mut Interp, env: &Env, stmts: &[Stmt]) -> Result<Flow, Exception> {
    for stmt in stmts {
        match exec_stmt(interp, env, stmt)? {
            Flow::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Flow::Normal)
}

pub(crate) fn exec_stmt(interp: &mut Interp, env: &Env, stmt: &Stmt) -> Result<Flow, Exception> {
    interp
        .limits
        .check_interrupt()
        .map_err(|e| e.note_line(stmt.line))?;

    match &stmt.node {
        StmtKind::Expr(expr) => {
            eval_expr(interp, env, expr)?;
            Ok(Flow::Normal)
        }
        StmtKind::Assign { targets, value } => {
            let value = eval_expr(interp, env, value)?;
            for target in targets {
                assign_target(interp, env, target, value.clone())?;
            }
            Ok(Flow::Normal)
        }
        StmtKind::AugAssign { target, op, value } => {
            exec_aug_assign(interp, env, target, *op, value)?;
            Ok(Flow::Normal)
        }
        StmtKind::If { branches, orelse } => {
            for (test, suite) in branches {
                if eval_expr(interp, env, test)?.truthy() {
                    return exec_block(interp, env, suite);
                }
            }
            exec_block(interp, env, orelse)
        }
        StmtKind::While { test, body, orelse } => {
            let mut broke = false;
            loop {
                interp
                    .limits
                    .check_interrupt()
                    .map_err(|e| e.note_line(stmt.line))?;
                if !eval_expr(interp, env, test)?.truthy() {
                    break;
                }
                match exec_block(interp, env, body)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => {
                        broke = true;
                        break;
                    }
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            }
            if !broke {
                return exec_block(interp, env, orelse);
            }
            Ok(Flow::Normal)
        }
        StmtKind::For { target, iter, body, orelse } => {
            let iterable = eval_expr(interp, env, iter)?;
            let mut values = iterate(interp, &iterable, stmt.line)?;
            let mut broke = false;
            while let Some(item) = values.next() {
                interp
                    .limits
                    .check_interrupt()
                    .map_err(|e| e.note_line(stmt.line))?;
                assign_target(interp, env, target, item)?;
                match exec_block(interp, env, body)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => {
                        broke = true;
                        break;
                    }
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            }
            if !broke {
                return exec_block(interp, env, orelse);
            }
            Ok(Flow::Normal)
        }
        StmtKind::FuncDef(def) => {
            let function = make_function(interp, env, def)?;
            let mut value = Value::Function(Rc::new(function));
            for decorator in def.decorators.iter().rev() {
                let dec = eval_expr(interp, env, decorator)?;
                value = call_value(interp, dec, CallArgs::positional(vec![value]), decorator.line)?;
            }
            env.assign(&def.name, value)
                .map_err(|e| e.note_line(stmt.line))?;
            Ok(Flow::Normal)
        }
        StmtKind::ClassDef { name, base, body, decorators } => {
            let mut value = make_class(interp, env, name, base.as_ref(), body, stmt.line)?;
            for decorator in decorators.iter().rev() {
                let dec = eval_expr(interp, env, decorator)?;
                value = call_value(interp, dec, CallArgs::positional(vec![value]), decorator.line)?;
            }
            env.assign(name, value).map_err(|e| e.note_line(stmt.line))?;
            Ok(Flow::Normal)
        }
        StmtKind::Return(value) => {
            let value = match value {
                Some(expr) => eval_expr(interp, env, expr)?,
                None => Value::None,
            };
            Ok(Flow::Return(value))
        }
        StmtKind::Break => Ok(Flow::Break),
        StmtKind::Continue => Ok(Flow::Continue),
        StmtKind::Pass => Ok(Flow::Normal),
        StmtKind::Import { module, alias } => {
            interp
                .bind_import(env, module, alias.as_deref())
                .map_err(|e| e.note_line(stmt.line))?;
            Ok(Flow::Normal)
        }
        StmtKind::FromImport { module, names } => {
            interp
                .bind_from_import(env, module, names)
                .map_err(|e| e.note_line(stmt.line))?;
            Ok(Flow::Normal)
        }
        StmtKind::Try { body, handlers, finally } => exec_try(interp, env, body, handlers, finally),
        StmtKind::Raise { exc, cause } => {
            let mut exception = match exc {
                None => interp.current_exception().ok_or_else(|| {
                    Exception::new(ExcType::RuntimeError, "No active exception to re-raise")
                        .note_line(stmt.line)
                })?,
                Some(expr) => {
                    let value = eval_expr(interp, env, expr)?;
                    make_exception(interp, value, stmt.line)?
                }
            };
            if let Some(cause_expr) = cause {
                let value = eval_expr(interp, env, cause_expr)?;
                exception.cause = Some(Box::new(make_exception(interp, value, stmt.line)?));
            }
            Err(exception.note_line(stmt.line))
        }
        StmtKind::Global(names) => {
            for name in names {
                env.declare_global(name);
            }
            Ok(Flow::Normal)
        }
        StmtKind::Nonlocal(names) => {
            for name in names {
                env.declare_nonlocal(name).map_err(|e| e.note_line(stmt.line))?;
            }
            Ok(Flow::Normal)
        }
        StmtKind::With { context, alias, body } => exec_with(interp, env, context, alias.as_deref(), body, stmt.line),
    }
}

fn exec_aug_assign(
    interp: &mut Interp,
    env: &Env,
    target: &Expr,
    op: crate::ast::BinOp,
    value: &Expr,
) -> Result<(), Exception> {
    match &target.node {
        ExprKind::Ident(name) => {
            let current = env.lookup(name).map_err(|e| e.note_line(target.line))?;
            let rhs = eval_expr(interp, env, value)?;
            let updated = binary_op(interp, op, current, rhs, target.line)?;
            env.assign(name, updated).map_err(|e| e.note_line(target.line))
        }
        ExprKind::Attribute { value: obj_expr, attr } => {
            let obj = eval_expr(interp, env, obj_expr)?;
            let current = attr_get(&obj, attr, target.line)?;
            let rhs = eval_expr(interp, env, value)?;
            let updated = binary_op(interp, op, current, rhs, target.line)?;
            attr_set(&obj, attr, updated, target.line)
        }
        ExprKind::Subscript { value: obj_expr, index } => {
            let Index::Single(index_expr) = index.as_ref() else {
                return Err(Exception::type_error("cannot augment-assign to a slice").note_line(target.line));
            };
            let obj = eval_expr(interp, env, obj_expr)?;
            let key = eval_expr(interp, env, index_expr)?;
            let current = subscript_get(&obj, &key, target.line)?;
            let rhs = eval_expr(interp, env, value)?;
            let updated = binary_op(interp, op, current, rhs, target.line)?;
            subscript_set(&obj, key, updated, target.line)
        }
        _ => Err(Exception::type_error("invalid augmented assignment target").note_line(target.line)),
    }
}

/// Binds `value` to an assignment target, recursing into tuple/list
/// destructuring patterns.
pub(crate) fn assign_target(
    interp: &mut Interp,
    env: &Env,
    target: &Expr,
    value: Value,
) -> Result<(), Exception> {
    match &target.node {
        ExprKind::Ident(name) => env.assign(name, value).map_err(|e| e.note_line(target.line)),
        ExprKind::Attribute { value: obj_expr, attr } => {
            let obj = eval_expr(interp, env, obj_expr)?;
            attr_set(&obj, attr, value, target.line)
        }
        ExprKind::Subscript { value: obj_expr, index } => {
            let Index::Single(index_expr) = index.as_ref() else {
                return Err(Exception::type_error("cannot assign to a slice").note_line(target.line));
            };
            let obj = eval_expr(interp, env, obj_expr)?;
            let key = eval_expr(interp, env, index_expr)?;
            subscript_set(&obj, key, value, target.line)
        }
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            let unpacked: Vec<Value> = iterate(interp, &value, target.line)?.collect();
            if unpacked.len() != items.len() {
                return Err(Exception::value_error(format!(
                    "cannot unpack {} values into {} targets",
                    unpacked.len(),
                    items.len()
                ))
                .note_line(target.line));
            }
            for (item, v) in items.iter().zip(unpacked) {
                assign_target(interp, env, item, v)?;
            }
            Ok(())
        }
        _ => Err(Exception::type_error("cannot assign to this expression").note_line(target.line)),
    }
}

fn exec_try(
    interp: &mut Interp,
    env: &Env,
    body: &[Stmt],
    handlers: &[ExceptHandler],
    finally: &[Stmt],
) -> Result<Flow, Exception> {
    let body_result = exec_block(interp, env, body);
    let mut outcome = match body_result {
        Err(exc) => handle_except(interp, env, handlers, exc),
        ok => ok,
    };
    if !finally.is_empty() {
        match exec_block(interp, env, finally) {
            // A quiet finally preserves the pending outcome; anything else
            // (return/break/continue or a new exception) supersedes it.
            Ok(Flow::Normal) => {}
            superseding => outcome = superseding,
        }
    }
    outcome
}

fn handle_except(
    interp: &mut Interp,
    env: &Env,
    handlers: &[ExceptHandler],
    exc: Exception,
) -> Result<Flow, Exception> {
    for handler in handlers {
        let matched = match &handler.exc {
            // Bare `except:` catches everything but SystemExit.
            None => !exc.is_system_exit(),
            Some(expr) => {
                let handler_value = eval_expr(interp, env, expr)?;
                exc_matches(&handler_value, &exc)?
            }
        };
        if !matched {
            continue;
        }
        if let Some(name) = &handler.name {
            env.assign(name, exception_value(&exc))
                .map_err(|e| e.note_line(handler.line))?;
        }
        interp.push_handling(exc);
        let result = exec_block(interp, env, &handler.body);
        interp.pop_handling();
        return result;
    }
    Err(exc)
}

/// Whether a handler expression value matches a raised exception.
fn exc_matches(handler_value: &Value, exc: &Exception) -> Result<bool, Exception> {
    match handler_value {
        Value::ExcClass(t) => Ok(t.catches(exc.kind.root())),
        Value::Class(class) => match &exc.kind {
            ExcKind::User(raised) => Ok(class_derives(raised, class)),
            ExcKind::Builtin(_) => Ok(false),
        },
        Value::Tuple(items) => {
            for item in items.iter() {
                if exc_matches(item, exc)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(Exception::type_error(format!(
            "catching '{}' is not allowed; expected an exception class",
            other.type_name()
        ))),
    }
}

/// The value bound by `except ... as name`.
pub(crate) fn exception_value(exc: &Exception) -> Value {
    match &exc.payload {
        Some(instance) => instance.clone(),
        None => Value::ExcValue(Rc::new(exc.clone())),
    }
}

/// Converts a raised value (`raise X` / `raise X(...)`) into an exception.
pub(crate) fn make_exception(interp: &mut Interp, value: Value, line: u32) -> Result<Exception, Exception> {
    match value {
        Value::ExcClass(t) => Ok(Exception::without_message(t)),
        Value::ExcValue(exc) => Ok((*exc).clone()),
        Value::Class(class) => {
            if class.exc_root().is_none() {
                return Err(Exception::type_error("exceptions must derive from Exception").note_line(line));
            }
            let instance = call_value(interp, Value::Class(class), CallArgs::empty(), line)?;
            make_exception(interp, instance, line)
        }
        Value::Instance(instance) => {
            let Some(_) = instance.class.exc_root() else {
                return Err(Exception::type_error("exceptions must derive from Exception").note_line(line));
            };
            let message = match instance.fields.borrow().get("message") {
                Some(Value::Str(s)) => Some(s.to_string()),
                _ => None,
            };
            Ok(Exception {
                kind: ExcKind::User(instance.class.clone()),
                message,
                exit_code: None,
                cause: None,
                line: None,
                payload: Some(Value::Instance(instance)),
            })
        }
        other => Err(Exception::type_error(format!(
            "exceptions must derive from Exception, not '{}'",
            other.type_name()
        ))
        .note_line(line)),
    }
}

fn exec_with(
    interp: &mut Interp,
    env: &Env,
    context: &Expr,
    alias: Option<&str>,
    body: &[Stmt],
    line: u32,
) -> Result<Flow, Exception> {
    let ctx = eval_expr(interp, env, context)?;
    let enter = attr_get(&ctx, "__enter__", line)?;
    let entered = call_value(interp, enter, CallArgs::empty(), line)?;
    if let Some(name) = alias {
        env.assign(name, entered).map_err(|e| e.note_line(line))?;
    }

    let outcome = exec_block(interp, env, body);

    let (exc_type, exc_value) = match &outcome {
        Err(exc) => {
            let class_value = match &exc.kind {
                ExcKind::Builtin(t) => Value::ExcClass(*t),
                ExcKind::User(class) => Value::Class(class.clone()),
            };
            (class_value, exception_value(exc))
        }
        Ok(_) => (Value::None, Value::None),
    };

    // __exit__ runs on every path out of the body.
    let exit = attr_get(&ctx, "__exit__", line)?;
    let exit_result = call_value(
        interp,
        exit,
        CallArgs::positional(vec![exc_type, exc_value, Value::None]),
        line,
    )?;

    match outcome {
        Err(exc) => {
            if exit_result.truthy() && !exc.is_system_exit() {
                Ok(Flow::Normal)
            } else {
                Err(exc)
            }
        }
        ok => ok,
    }
}

pub(crate) fn make_function(interp: &mut Interp, env: &Env, def: &crate::ast::FuncDef) -> Result<Function, Exception> {
    let mut params = Vec::with_capacity(def.params.len());
    for param in &def.params {
        let default = match &param.default {
            Some(expr) => Some(eval_expr(interp, env, expr)?),
            None => None,
        };
        params.push(Param {
            name: param.name.clone(),
            default,
        });
    }
    // The captured frame may end up in a closure cycle; register it for
    // teardown clearing.
    interp.track_frame(env);
    Ok(Function {
        name: def.name.clone(),
        params,
        vararg: def.vararg.clone(),
        kwarg: def.kwarg.clone(),
        body: Rc::new(def.body.clone()),
        env: env.clone(),
        line: def.line,
    })
}

fn make_class(
    interp: &mut Interp,
    env: &Env,
    name: &str,
    base: Option<&Expr>,
    body: &[Stmt],
    line: u32,
) -> Result<Value, Exception> {
    let (parent, base_exc) = match base {
        None => (None, None),
        Some(expr) => match eval_expr(interp, env, expr)? {
            Value::Class(class) => {
                let root = class.exc_root();
                (Some(class), root)
            }
            Value::ExcClass(t) => (None, Some(t)),
            other => {
                return Err(Exception::type_error(format!(
                    "cannot inherit from '{}'",
                    other.type_name()
                ))
                .note_line(line));
            }
        },
    };

    // The class body runs in a transient frame; its bindings become the
    // member table.
    let class_env = env.child(FrameKind::Class);
    interp.track_frame(&class_env);
    match exec_block(interp, &class_env, body)? {
        Flow::Normal => {}
        _ => {
            return Err(Exception::new(ExcType::SyntaxError, "invalid control flow in class body").note_line(line));
        }
    }

    let class = Class {
        name: name.to_string(),
        parent,
        base_exc,
        members: std::cell::RefCell::new(class_env.bindings().into_iter().collect()),
        line,
    };
    class_env.clear();
    Ok(Value::Class(Rc::new(class)))
}

/// A materialized iteration over a value.
pub(crate) enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range { current: i64, stop: i64, step: i64 },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Items(iter) => iter.next(),
            Self::Range { current, stop, step } => {
                let done = if *step > 0 { *current >= *stop } else { *current <= *stop };
                if done {
                    return None;
                }
                let value = *current;
                *current += *step;
                Some(Value::Int(value))
            }
        }
    }
}

/// Produces an iterator over `value`, or `TypeError` if it is not iterable.
///
/// Containers are snapshotted so mutation during iteration cannot invalidate
/// the walk. Instances are consulted via `__iter__`, whose result must be a
/// built-in iterable.
pub(crate) fn iterate(interp: &mut Interp, value: &Value, line: u32) -> Result<ValueIter, Exception> {
    match value {
        Value::List(items) => Ok(ValueIter::Items(items.borrow().clone().into_iter())),
        Value::Tuple(items) => Ok(ValueIter::Items(items.as_ref().clone().into_iter())),
        Value::Str(s) => Ok(ValueIter::Items(
            s.chars().map(|c| Value::str(c.to_string())).collect::<Vec<_>>().into_iter(),
        )),
        Value::Dict(dict) => Ok(ValueIter::Items(dict.borrow().keys().into_iter())),
        Value::Set(set) => Ok(ValueIter::Items(
            set.borrow().iter().cloned().collect::<Vec<_>>().into_iter(),
        )),
        Value::Range(range) => Ok(ValueIter::Range {
            current: range.start,
            stop: range.stop,
            step: range.step,
        }),
        Value::Instance(instance) => {
            let Some(method) = instance.class.lookup("__iter__") else {
                return Err(
                    Exception::type_error(format!("'{}' object is not iterable", value.type_name()))
                        .note_line(line),
                );
            };
            let iterable = call_value(
                interp,
                method,
                CallArgs::positional(vec![value.clone()]),
                line,
            )?;
            if matches!(iterable, Value::Instance(_)) {
                return Err(Exception::type_error("__iter__ must return a built-in iterable").note_line(line));
            }
            iterate(interp, &iterable, line)
        }
        other => Err(
            Exception::type_error(format!("'{}' object is not iterable", other.type_name())).note_line(line),
        ),
    }
}
