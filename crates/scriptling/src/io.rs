//! Output handling for the `print()` builtin.

use std::{
    borrow::Cow,
    io::{self, Write as _},
};

use crate::exception::{ExcType, Exception};

/// Trait for handling output from the `print()` builtin function.
///
/// Implement this trait to capture or redirect print output from script
/// code. The default implementation `StdPrint` writes to stdout.
pub trait PrintWriter {
    /// Called once for each formatted argument passed to `print()`.
    ///
    /// This method writes only the given argument's text; separators and the
    /// final terminator are emitted via [`Self::stdout_push`].
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception>;

    /// Adds a single character to stdout — separators and newlines.
    fn stdout_push(&mut self, end: char) -> Result<(), Exception>;
}

/// Default `PrintWriter` that writes to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        write_stdout(output.as_bytes())
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        let mut buffer = [0u8; 4];
        write_stdout(end.encode_utf8(&mut buffer).as_bytes())
    }
}

fn write_stdout(bytes: &[u8]) -> Result<(), Exception> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|err| Exception::new(ExcType::IOError, err.to_string()))
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing and for capturing print output of hosted scripts.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected output so far.
    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        self.0.push_str(&output);
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        self.0.push(end);
        Ok(())
    }
}

/// `PrintWriter` that ignores all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> Result<(), Exception> {
        Ok(())
    }

    fn stdout_push(&mut self, _end: char) -> Result<(), Exception> {
        Ok(())
    }
}
