//! Call semantics: argument binding, function/method/class invocation.

use std::rc::Rc;

use crate::{
    ast::CallArg,
    env::{Env, FrameKind},
    exception::{ExcKind, ExcType, Exception},
    interp::Interp,
    value::{BoundTarget, Dict, Function, Instance, Value},
};

use super::{Flow, exec_block, expr::eval_expr, iterate, methods};

/// Evaluated call arguments: positionals plus keyword pairs, in call order.
#[derive(Debug, Default)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    #[must_use]
    pub fn new(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Self {
        Self { args, kwargs }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: Vec::new(),
        }
    }

    /// Returns the `i`-th positional argument, or a `TypeError` naming the
    /// callable when it is missing.
    pub fn require(&self, i: usize, fn_name: &str) -> Result<Value, Exception> {
        self.args.get(i).cloned().ok_or_else(|| {
            Exception::type_error(format!(
                "{fn_name}() missing required argument (expected at least {})",
                i + 1
            ))
        })
    }

    #[must_use]
    pub fn opt(&self, i: usize) -> Option<Value> {
        self.args.get(i).cloned()
    }

    #[must_use]
    pub fn kwarg(&self, name: &str) -> Option<Value> {
        self.kwargs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    /// Positional-or-keyword lookup, positional winning.
    #[must_use]
    pub fn pos_or_kw(&self, i: usize, name: &str) -> Option<Value> {
        self.opt(i).or_else(|| self.kwarg(name))
    }

    /// Rejects calls with more than `max` positional arguments.
    pub fn check_max(&self, max: usize, fn_name: &str) -> Result<(), Exception> {
        if self.args.len() > max {
            return Err(Exception::type_error(format!(
                "{fn_name}() takes at most {max} arguments ({} given)",
                self.args.len()
            )));
        }
        Ok(())
    }

    /// The `i`-th argument coerced to a string, required.
    pub fn str_arg(&self, i: usize, fn_name: &str) -> Result<String, Exception> {
        match self.require(i, fn_name)? {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(Exception::type_error(format!(
                "{fn_name}() argument {} must be a string, not '{}'",
                i + 1,
                other.type_name()
            ))),
        }
    }
}

/// Evaluates call-site arguments, spreading `*args` and `**kwargs`.
pub(crate) fn eval_call_args(
    interp: &mut Interp,
    env: &Env,
    args: &[CallArg],
    line: u32,
) -> Result<CallArgs, Exception> {
    let mut out = CallArgs::empty();
    for arg in args {
        match arg {
            CallArg::Pos(expr) => out.args.push(eval_expr(interp, env, expr)?),
            CallArg::Keyword(name, expr) => {
                let value = eval_expr(interp, env, expr)?;
                out.kwargs.push((name.clone(), value));
            }
            CallArg::Star(expr) => {
                let value = eval_expr(interp, env, expr)?;
                out.args.extend(iterate(interp, &value, line)?);
            }
            CallArg::DoubleStar(expr) => {
                let value = eval_expr(interp, env, expr)?;
                let Value::Dict(dict) = value else {
                    return Err(Exception::type_error(format!(
                        "argument after ** must be a dict, not '{}'",
                        value.type_name()
                    ))
                    .note_line(line));
                };
                for (key, value) in dict.borrow().iter() {
                    let Value::Str(name) = key else {
                        return Err(Exception::type_error("keywords must be strings").note_line(line));
                    };
                    out.kwargs.push((name.to_string(), value.clone()));
                }
            }
        }
    }
    Ok(out)
}

/// Invokes any callable value.
pub(crate) fn call_value(
    interp: &mut Interp,
    callee: Value,
    args: CallArgs,
    line: u32,
) -> Result<Value, Exception> {
    interp
        .limits
        .check_interrupt()
        .map_err(|e| e.note_line(line))?;

    match callee {
        Value::Function(func) => call_function(interp, &func, args, line),
        Value::Builtin(builtin) => {
            let f = builtin.func.clone();
            f(interp, args).map_err(|e| e.note_line(line))
        }
        Value::Bound(bound) => match &bound.target {
            BoundTarget::Function(func) => {
                let mut all = Vec::with_capacity(args.args.len() + 1);
                all.push(bound.recv.clone());
                all.extend(args.args);
                call_function(interp, func, CallArgs::new(all, args.kwargs), line)
            }
            BoundTarget::Method(name) => methods::call_method(interp, &bound.recv, name, args, line),
        },
        Value::Class(class) => instantiate(interp, class, args, line),
        Value::ExcClass(exc_type) => construct_exception(exc_type, &args, line),
        other => Err(Exception::type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))
        .note_line(line)),
    }
}

/// Calls a user-defined function: bind arguments into a fresh frame enclosed
/// by the function's captured environment, then execute its body.
pub(crate) fn call_function(
    interp: &mut Interp,
    func: &Rc<Function>,
    args: CallArgs,
    line: u32,
) -> Result<Value, Exception> {
    interp
        .limits
        .check_depth(interp.depth)
        .map_err(|e| e.note_line(line))?;

    let frame = func.env.child(FrameKind::Function);
    bind_params(func, &frame, args, line)?;

    interp.depth += 1;
    let result = exec_block(interp, &frame, &func.body);
    interp.depth -= 1;

    match result? {
        Flow::Return(value) => Ok(value),
        _ => Ok(Value::None),
    }
}

fn bind_params(
    func: &Rc<Function>,
    frame: &Env,
    args: CallArgs,
    line: u32,
) -> Result<(), Exception> {
    let param_count = func.params.len();
    let mut filled: Vec<Option<Value>> = vec![None; param_count];

    // Positional arguments fill parameters left to right; the overflow goes
    // to *args if declared.
    let mut extra_positional = Vec::new();
    for (i, value) in args.args.into_iter().enumerate() {
        if i < param_count {
            filled[i] = Some(value);
        } else {
            extra_positional.push(value);
        }
    }
    if !extra_positional.is_empty() && func.vararg.is_none() {
        return Err(Exception::type_error(format!(
            "{}() takes {param_count} positional arguments but {} were given",
            func.name,
            param_count + extra_positional.len()
        ))
        .note_line(line));
    }

    // Keyword arguments match parameter names; the rest go to **kwargs.
    let mut extra_keywords = Dict::new();
    for (name, value) in args.kwargs {
        match func.params.iter().position(|p| p.name == name) {
            Some(i) => {
                if filled[i].is_some() {
                    return Err(Exception::type_error(format!(
                        "{}() got multiple values for argument '{name}'",
                        func.name
                    ))
                    .note_line(line));
                }
                filled[i] = Some(value);
            }
            None => {
                if func.kwarg.is_none() {
                    return Err(Exception::type_error(format!(
                        "{}() got an unexpected keyword argument '{name}'",
                        func.name
                    ))
                    .note_line(line));
                }
                extra_keywords.insert_str(&name, value);
            }
        }
    }

    for (i, param) in func.params.iter().enumerate() {
        let value = match filled[i].take() {
            Some(value) => value,
            None => match &param.default {
                Some(default) => default.clone(),
                None => {
                    return Err(Exception::type_error(format!(
                        "{}() missing required positional argument: '{}'",
                        func.name, param.name
                    ))
                    .note_line(line));
                }
            },
        };
        frame.set_here(&param.name, value);
    }
    if let Some(vararg) = &func.vararg {
        frame.set_here(vararg, Value::tuple(extra_positional));
    }
    if let Some(kwarg) = &func.kwarg {
        frame.set_here(kwarg, Value::dict(extra_keywords));
    }
    Ok(())
}

/// Allocates an instance and runs `__init__` when present.
fn instantiate(
    interp: &mut Interp,
    class: Rc<crate::value::Class>,
    args: CallArgs,
    line: u32,
) -> Result<Value, Exception> {
    let instance = Value::Instance(Rc::new(Instance::new(class.clone())));

    if let Some(init) = class.lookup("__init__") {
        let Value::Function(init) = init else {
            return Err(Exception::type_error(format!("{}.__init__ must be a function", class.name)).note_line(line));
        };
        let mut all = Vec::with_capacity(args.args.len() + 1);
        all.push(instance.clone());
        all.extend(args.args);
        call_function(interp, &init, CallArgs::new(all, args.kwargs), line)?;
    } else if class.exc_root().is_some() {
        // Exception classes without __init__ store their first argument as
        // the message.
        if let Some(arg) = args.opt(0) {
            if let Value::Instance(obj) = &instance {
                obj.fields
                    .borrow_mut()
                    .insert("message".to_string(), Value::str(arg.str_value()));
            }
        }
    } else if !args.args.is_empty() || !args.kwargs.is_empty() {
        return Err(Exception::type_error(format!("{}() takes no arguments", class.name)).note_line(line));
    }

    Ok(instance)
}

/// Calling a built-in exception class yields an exception value; `raise`
/// unwraps it, and `except SystemExit` style handlers see the same shape.
fn construct_exception(exc_type: ExcType, args: &CallArgs, line: u32) -> Result<Value, Exception> {
    args.check_max(1, &exc_type.to_string()).map_err(|e| e.note_line(line))?;
    let mut exception = Exception {
        kind: ExcKind::Builtin(exc_type),
        message: None,
        exit_code: None,
        cause: None,
        line: None,
        payload: None,
    };
    match args.opt(0) {
        Some(Value::Int(code)) if exc_type == ExcType::SystemExit => {
            exception.exit_code = Some(code);
        }
        Some(value) => exception.message = Some(value.str_value()),
        None => {}
    }
    if exc_type == ExcType::SystemExit && exception.exit_code.is_none() {
        exception.exit_code = Some(0);
    }
    Ok(Value::ExcValue(Rc::new(exception)))
}
