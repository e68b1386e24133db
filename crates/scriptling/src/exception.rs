//! Exception kinds and the runtime exception payload.
//!
//! Exceptions double as the evaluator's error type: every evaluation returns
//! `Result<_, Exception>` and unwinds with `?` until a matching `except`
//! clause binds it or the host harness observes it.

use std::{fmt, rc::Rc};

use crate::value::{Class, Value};

/// Built-in exception classes.
///
/// `SystemExit` is deliberately outside the `Exception` umbrella: generic
/// handlers (`except:`, `except Exception`) never catch it, so `return_*`
/// helpers and `exit()` reliably terminate a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ExcType {
    Exception,
    SyntaxError,
    NameError,
    AttributeError,
    TypeError,
    ValueError,
    KeyError,
    IndexError,
    ZeroDivisionError,
    RecursionError,
    ImportError,
    IOError,
    RuntimeError,
    SystemExit,
}

impl ExcType {
    /// Whether a handler for `self` catches a raised exception of `raised`.
    #[must_use]
    pub fn catches(self, raised: Self) -> bool {
        match self {
            Self::Exception => raised != Self::SystemExit,
            other => other == raised,
        }
    }

    /// Resolves an exception-class name, for `except NameError` style lookups
    /// in the root environment.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Exception" => Self::Exception,
            "SyntaxError" => Self::SyntaxError,
            "NameError" => Self::NameError,
            "AttributeError" => Self::AttributeError,
            "TypeError" => Self::TypeError,
            "ValueError" => Self::ValueError,
            "KeyError" => Self::KeyError,
            "IndexError" => Self::IndexError,
            "ZeroDivisionError" => Self::ZeroDivisionError,
            "RecursionError" => Self::RecursionError,
            "ImportError" => Self::ImportError,
            "IOError" => Self::IOError,
            "RuntimeError" => Self::RuntimeError,
            "SystemExit" => Self::SystemExit,
            _ => return None,
        })
    }
}

/// The class of a raised exception: a built-in kind or a user-defined class
/// whose chain roots in a built-in kind.
#[derive(Debug, Clone)]
pub enum ExcKind {
    Builtin(ExcType),
    User(Rc<Class>),
}

impl ExcKind {
    /// The built-in kind this exception ultimately derives from.
    #[must_use]
    pub fn root(&self) -> ExcType {
        match self {
            Self::Builtin(t) => *t,
            Self::User(class) => class.exc_root().unwrap_or(ExcType::Exception),
        }
    }

    /// The displayed class name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Builtin(t) => t.to_string(),
            Self::User(class) => class.name.clone(),
        }
    }
}

/// A raised exception.
#[derive(Debug, Clone)]
pub struct Exception {
    pub kind: ExcKind,
    pub message: Option<String>,
    /// Exit code carried by `SystemExit`.
    pub exit_code: Option<i64>,
    /// Chained cause set by `raise ... from e`.
    pub cause: Option<Box<Exception>>,
    /// Source line where the exception was raised, once known.
    pub line: Option<u32>,
    /// The user-defined exception instance, for `except ... as e` binding.
    pub payload: Option<Value>,
}

impl Exception {
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            kind: ExcKind::Builtin(exc_type),
            message: Some(message.into()),
            exit_code: None,
            cause: None,
            line: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn without_message(exc_type: ExcType) -> Self {
        Self {
            kind: ExcKind::Builtin(exc_type),
            message: None,
            exit_code: None,
            cause: None,
            line: None,
            payload: None,
        }
    }

    /// The sentinel raised by `exit()` and the `return_*` helpers.
    #[must_use]
    pub fn system_exit(code: i64) -> Self {
        Self {
            kind: ExcKind::Builtin(ExcType::SystemExit),
            message: None,
            exit_code: Some(code),
            cause: None,
            line: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::TypeError, message)
    }

    #[must_use]
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcType::ValueError, message)
    }

    #[must_use]
    pub fn name_error(name: &str) -> Self {
        Self::new(ExcType::NameError, format!("name '{name}' is not defined"))
    }

    #[must_use]
    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::new(
            ExcType::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    #[must_use]
    pub fn is_system_exit(&self) -> bool {
        matches!(self.kind, ExcKind::Builtin(ExcType::SystemExit))
    }

    /// Records the source line if none is attached yet, so the innermost
    /// location wins as the exception unwinds.
    pub(crate) fn note_line(mut self, line: u32) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.kind.name()),
            None => write!(f, "{}", self.kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_handlers_never_catch_system_exit() {
        assert!(!ExcType::Exception.catches(ExcType::SystemExit));
        assert!(ExcType::SystemExit.catches(ExcType::SystemExit));
        assert!(ExcType::Exception.catches(ExcType::ValueError));
        assert!(!ExcType::ValueError.catches(ExcType::TypeError));
    }

    #[test]
    fn display_includes_kind_and_message() {
        let exc = Exception::new(ExcType::ValueError, "bad input");
        assert_eq!(exc.to_string(), "ValueError: bad input");
        let exc = Exception::without_message(ExcType::KeyError);
        assert_eq!(exc.to_string(), "KeyError");
    }
}
