//! The tool harness: one script invocation in, one tool response out.
//!
//! The harness installs the parameter dict under `__mcp_params`, runs the
//! script, and reads the response the `return_*` helpers left under
//! `__mcp_response`. A `SystemExit` with code 0 is a successful early
//! return; any other termination with a nonzero code or an uncaught
//! exception is a tool-level error.

use serde_json::{Map, Value as JsonValue};

use crate::{
    convert::json_to_value,
    exception::Exception,
    interp::Interp,
    value::{Dict, Value},
};

/// Reserved name for the injected parameter dict.
pub const PARAMS_VAR: &str = "__mcp_params";

/// Reserved name the `return_*` helpers write the response into.
pub const RESPONSE_VAR: &str = "__mcp_response";

/// Outcome of one tool-script invocation.
#[derive(Debug)]
pub struct ToolOutcome {
    /// The response text written by a `return_*` helper, or empty.
    pub response: String,
    /// 0 on success, nonzero on error.
    pub exit_code: i64,
    /// The underlying exception for nonzero exits. Suppressed for clean
    /// `SystemExit(0)` terminations.
    pub error: Option<Exception>,
}

impl ToolOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one tool script on a fresh interpreter.
///
/// Deadlines and cancellation ride on the interpreter's `RunLimits`; hosts
/// configure them when building `interp`.
pub fn run_tool_script(
    interp: &mut Interp,
    source: &str,
    name: &str,
    params: &Map<String, JsonValue>,
) -> ToolOutcome {
    let mut dict = Dict::new();
    for (key, value) in params {
        dict.insert_str(key, json_to_value(value));
    }
    interp.set_global(PARAMS_VAR, Value::dict(dict));

    let result = interp.run(source, name);
    let response = match interp.get_global(RESPONSE_VAR) {
        Some(value) => value.str_value(),
        None => String::new(),
    };

    match result {
        // Normal fallthrough with no return_* call: success, empty response
        // unless a helper ran earlier in a caught branch.
        Ok(_) => ToolOutcome {
            response,
            exit_code: 0,
            error: None,
        },
        Err(exc) if exc.is_system_exit() => {
            let exit_code = exc.exit_code.unwrap_or(0);
            ToolOutcome {
                response,
                exit_code,
                error: if exit_code == 0 { None } else { Some(exc) },
            }
        }
        Err(exc) => ToolOutcome {
            response,
            exit_code: 1,
            error: Some(exc),
        },
    }
}
