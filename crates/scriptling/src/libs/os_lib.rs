//! Implementation of the `os` library.
//!
//! Every filesystem-touching builtin checks the interpreter's path policy
//! before the host performs the operation; `--allowed-paths` narrows the
//! reachable filesystem, `-` turns this library into environment access
//! only.

use std::{path::PathBuf, rc::Rc};

use crate::{
    exception::{ExcType, Exception},
    interp::Interp,
    value::{Builtin, Library, Value},
};

pub(crate) fn build(_interp: &mut Interp) -> Result<Value, Exception> {
    let lib = Library::new("os", "Environment and path-restricted filesystem access.");

    lib.set(
        "getenv",
        Value::Builtin(Rc::new(Builtin::new(
            "getenv",
            "Read an environment variable, with an optional default.",
            |_interp, args| {
                let name = args.str_arg(0, "getenv")?;
                match std::env::var(&name) {
                    Ok(value) => Ok(Value::str(value)),
                    Err(_) => Ok(args.pos_or_kw(1, "default").unwrap_or(Value::None)),
                }
            },
        ))),
    );

    lib.set(
        "read_file",
        Value::Builtin(Rc::new(Builtin::new(
            "read_file",
            "Read a UTF-8 text file.",
            |interp, args| {
                let path = checked_path(interp, &args.str_arg(0, "read_file")?)?;
                std::fs::read_to_string(&path).map(Value::str).map_err(io_error)
            },
        ))),
    );

    lib.set(
        "write_file",
        Value::Builtin(Rc::new(Builtin::new(
            "write_file",
            "Write text to a file, replacing its contents.",
            |interp, args| {
                let path = checked_path(interp, &args.str_arg(0, "write_file")?)?;
                let text = args.require(1, "write_file")?.str_value();
                std::fs::write(&path, text).map_err(io_error)?;
                Ok(Value::None)
            },
        ))),
    );

    lib.set(
        "list_dir",
        Value::Builtin(Rc::new(Builtin::new(
            "list_dir",
            "Names of the entries in a directory.",
            |interp, args| {
                let path = checked_path(interp, &args.str_arg(0, "list_dir")?)?;
                let mut names = Vec::new();
                for entry in std::fs::read_dir(&path).map_err(io_error)? {
                    let entry = entry.map_err(io_error)?;
                    names.push(Value::str(entry.file_name().to_string_lossy()));
                }
                names.sort_by_key(Value::str_value);
                Ok(Value::list(names))
            },
        ))),
    );

    lib.set(
        "exists",
        Value::Builtin(Rc::new(Builtin::new(
            "exists",
            "Whether a path exists.",
            |interp, args| {
                let path = checked_path(interp, &args.str_arg(0, "exists")?)?;
                Ok(Value::Bool(path.exists()))
            },
        ))),
    );

    lib.set(
        "remove",
        Value::Builtin(Rc::new(Builtin::new(
            "remove",
            "Delete a file.",
            |interp, args| {
                let path = checked_path(interp, &args.str_arg(0, "remove")?)?;
                std::fs::remove_file(&path).map_err(io_error)?;
                Ok(Value::None)
            },
        ))),
    );

    Ok(Value::Library(Rc::new(lib)))
}

fn checked_path(interp: &Interp, raw: &str) -> Result<PathBuf, Exception> {
    let path = PathBuf::from(raw);
    interp.path_policy.check(&path)?;
    Ok(path)
}

fn io_error(err: std::io::Error) -> Exception {
    Exception::new(ExcType::IOError, err.to_string())
}
