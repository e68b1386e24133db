//! A line-oriented REPL on a persistent interpreter.
//!
//! Suite headers (lines ending in `:`) open a block that keeps reading
//! until a blank line; everything else evaluates immediately. Expression
//! results print their repr, `None` stays silent, and `exit()` ends the
//! session with its code.

use std::{
    io::{self, BufRead, Write},
    process::ExitCode,
};

use scriptling::{Interp, RunLimits, Value};

pub fn run(mut interp: Interp) -> ExitCode {
    interp.set_limits(RunLimits::new());
    println!("scriptling {} — interactive shell (ctrl-d to exit)", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut counter = 0u32;

    loop {
        let Some(block) = read_block(&mut reader) else {
            println!();
            return ExitCode::SUCCESS;
        };
        if block.trim().is_empty() {
            continue;
        }
        counter += 1;
        match interp.run(&block, &format!("<repl:{counter}>")) {
            Ok(Value::None) => {}
            Ok(value) => println!("{}", value.repr()),
            Err(exc) if exc.is_system_exit() => {
                let code = exc.exit_code.unwrap_or(0).clamp(0, 255);
                return ExitCode::from(code as u8);
            }
            Err(exc) => eprintln!("{exc}"),
        }
    }
}

/// Reads one input block: a single line, or a suite continued until the
/// next blank line. `None` means end of input.
fn read_block(reader: &mut impl BufRead) -> Option<String> {
    print!(">>> ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    if reader.read_line(&mut line).ok()? == 0 {
        return None;
    }
    let mut block = line.clone();
    if !opens_suite(&line) {
        return Some(block);
    }

    loop {
        print!("... ");
        let _ = io::stdout().flush();
        let mut continuation = String::new();
        if reader.read_line(&mut continuation).ok()? == 0 {
            return Some(block);
        }
        if continuation.trim().is_empty() {
            return Some(block);
        }
        block.push_str(&continuation);
    }
}

/// Whether a line starts a block that needs continuation lines.
fn opens_suite(line: &str) -> bool {
    let stripped = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    stripped.trim_end().ends_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_detection() {
        assert!(opens_suite("def f():\n"));
        assert!(opens_suite("if x:  # comment\n"));
        assert!(!opens_suite("x = 1\n"));
        assert!(!opens_suite("d = {'a': 1}\n"));
    }

    #[test]
    fn read_block_collects_until_blank_line() {
        let input = "def f():\n    return 1\n\nf()\n";
        let mut reader = io::BufReader::new(input.as_bytes());
        let block = read_block(&mut reader).unwrap();
        assert_eq!(block, "def f():\n    return 1\n");
        let next = read_block(&mut reader).unwrap();
        assert_eq!(next, "f()\n");
    }
}
