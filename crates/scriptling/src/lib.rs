#![doc = include_str!("../../../README.md")]

mod ast;
mod builtins;
mod convert;
mod env;
mod eval;
mod exception;
mod interp;
mod io;
mod lexer;
mod library;
mod libs;
mod limits;
mod lint;
mod parser;
mod policy;
mod token;
mod tool;
mod toon;
mod value;

pub use crate::{
    convert::{json_to_value, value_to_json},
    env::{Env, FrameKind},
    eval::call::CallArgs,
    exception::{ExcKind, ExcType, Exception},
    interp::{Interp, InterpBuilder},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    library::{DirLoader, LibraryBuilder, LibraryLoader, LibraryRegistry},
    limits::{CancelToken, DEFAULT_MAX_CALL_DEPTH, RunLimits},
    lint::{Diagnostic, LintReport, Severity, format_text, lint_files, lint_source},
    parser::{ParseError, parse},
    policy::PathPolicy,
    token::{Token, TokenKind},
    tool::{PARAMS_VAR, RESPONSE_VAR, ToolOutcome, run_tool_script},
    toon::encode as toon_encode,
    value::{
        Bound, BoundTarget, Builtin, Class, Dict, Function, Instance, Key, Library, NativeFn,
        Opaque, Param, Range, Set, Value, class_derives, format_float, values_equal,
    },
    lexer::tokenize,
};
