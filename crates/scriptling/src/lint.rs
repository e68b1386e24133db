//! The linter front-end: a parse-only pass producing structured
//! diagnostics.

use std::path::Path;

use serde::Serialize;

use crate::parser;

/// Diagnostic severity. The parser currently only emits errors; the
/// variant space leaves room for warnings from future passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One lint finding, tied to the file it came from.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub severity: Severity,
}

/// Result of linting one or more files.
#[derive(Debug, Clone, Serialize, Default)]
pub struct LintReport {
    pub diagnostics: Vec<Diagnostic>,
    /// True when any diagnostic is an error.
    pub has_errors: bool,
}

/// Lints source text under the given file name.
#[must_use]
pub fn lint_source(file: &str, source: &str) -> Vec<Diagnostic> {
    let (_, errors) = parser::parse(source);
    errors
        .into_iter()
        .map(|err| Diagnostic {
            file: file.to_string(),
            line: err.line,
            column: err.column,
            message: err.message,
            severity: Severity::Error,
        })
        .collect()
}

/// Lints a set of files, reading each from disk. Unreadable files produce
/// a diagnostic rather than aborting the run.
#[must_use]
pub fn lint_files(paths: &[impl AsRef<Path>]) -> LintReport {
    let mut diagnostics = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let file = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(source) => diagnostics.extend(lint_source(&file, &source)),
            Err(err) => diagnostics.push(Diagnostic {
                file,
                line: 1,
                column: 1,
                message: format!("cannot read file: {err}"),
                severity: Severity::Error,
            }),
        }
    }
    diagnostics.sort_by(|a, b| (a.file.as_str(), a.line).cmp(&(b.file.as_str(), b.line)));
    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    LintReport {
        diagnostics,
        has_errors,
    }
}

/// Renders a report as human-readable text, one diagnostic per line.
#[must_use]
pub fn format_text(report: &LintReport) -> String {
    let mut out = String::new();
    for d in &report.diagnostics {
        out.push_str(&format!(
            "{}:{}:{}: {}: {}\n",
            d.file, d.line, d.column, d.severity, d.message
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_has_no_diagnostics() {
        assert!(lint_source("ok.py", "x = 1\n").is_empty());
    }

    #[test]
    fn errors_carry_file_and_position() {
        let diags = lint_source("bad.py", "a = 1\nb = = 2\n");
        assert!(!diags.is_empty());
        assert_eq!(diags[0].file, "bad.py");
        assert_eq!(diags[0].line, 2);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn multiple_errors_in_one_file() {
        let diags = lint_source("bad.py", "a = = 1\nb = = 2\n");
        assert!(diags.len() >= 2);
    }

    #[test]
    fn json_shape() {
        let diags = lint_source("bad.py", "x = = 1\n");
        let json = serde_json::to_value(&diags[0]).unwrap();
        assert_eq!(json["file"], "bad.py");
        assert_eq!(json["severity"], "error");
        assert!(json["line"].is_number());
        assert!(json["column"].is_number());
    }
}
