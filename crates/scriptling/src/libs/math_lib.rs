//! Implementation of the `math` library.

use std::rc::Rc;

use crate::{
    eval::call::CallArgs,
    exception::Exception,
    interp::Interp,
    value::{Builtin, Library, Value},
};

pub(crate) fn build(_interp: &mut Interp) -> Result<Value, Exception> {
    let lib = Library::new("math", "Mathematical functions and constants.");

    lib.set("pi", Value::Float(std::f64::consts::PI));
    lib.set("e", Value::Float(std::f64::consts::E));
    lib.set("tau", Value::Float(std::f64::consts::TAU));
    lib.set("inf", Value::Float(f64::INFINITY));
    lib.set("nan", Value::Float(f64::NAN));

    let unary: &[(&str, &str, fn(f64) -> f64)] = &[
        ("sqrt", "Square root.", f64::sqrt),
        ("fabs", "Absolute value as a float.", f64::abs),
        ("exp", "e raised to the argument.", f64::exp),
        ("sin", "Sine of an angle in radians.", f64::sin),
        ("cos", "Cosine of an angle in radians.", f64::cos),
        ("tan", "Tangent of an angle in radians.", f64::tan),
        ("log2", "Base-2 logarithm.", f64::log2),
        ("log10", "Base-10 logarithm.", f64::log10),
    ];
    for (name, doc, f) in unary {
        let f = *f;
        let fn_name = (*name).to_string();
        lib.set(
            *name,
            Value::Builtin(Rc::new(Builtin::new(*name, *doc, move |_interp, args| {
                let x = float_arg(&args, 0, &fn_name)?;
                Ok(Value::Float(f(x)))
            }))),
        );
    }

    lib.set(
        "floor",
        Value::Builtin(Rc::new(Builtin::new(
            "floor",
            "Largest integer not greater than the argument.",
            |_interp, args| {
                let x = float_arg(&args, 0, "floor")?;
                Ok(Value::Int(x.floor() as i64))
            },
        ))),
    );
    lib.set(
        "ceil",
        Value::Builtin(Rc::new(Builtin::new(
            "ceil",
            "Smallest integer not less than the argument.",
            |_interp, args| {
                let x = float_arg(&args, 0, "ceil")?;
                Ok(Value::Int(x.ceil() as i64))
            },
        ))),
    );
    lib.set(
        "pow",
        Value::Builtin(Rc::new(Builtin::new(
            "pow",
            "x raised to the power y, as a float.",
            |_interp, args| {
                let x = float_arg(&args, 0, "pow")?;
                let y = float_arg(&args, 1, "pow")?;
                Ok(Value::Float(x.powf(y)))
            },
        ))),
    );
    lib.set(
        "log",
        Value::Builtin(Rc::new(Builtin::new(
            "log",
            "Natural logarithm, or logarithm in an optional base.",
            |_interp, args| {
                let x = float_arg(&args, 0, "log")?;
                if x <= 0.0 {
                    return Err(Exception::value_error("math domain error"));
                }
                match args.opt(1) {
                    None => Ok(Value::Float(x.ln())),
                    Some(base) => {
                        let base = as_float(&base).ok_or_else(|| {
                            Exception::type_error("log() base must be a number")
                        })?;
                        Ok(Value::Float(x.log(base)))
                    }
                }
            },
        ))),
    );

    Ok(Value::Library(Rc::new(lib)))
}

fn float_arg(args: &CallArgs, i: usize, fn_name: &str) -> Result<f64, Exception> {
    let value = args.require(i, fn_name)?;
    as_float(&value).ok_or_else(|| {
        Exception::type_error(format!(
            "{fn_name}() argument must be a number, not '{}'",
            value.type_name()
        ))
    })
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}
