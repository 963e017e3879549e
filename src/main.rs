use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;

use catlang::interpreter::Interpreter;
use catlang::types::Value;

/// Feeds the interpreter one line at a time. Non-nil results print to
/// stdout; an error is reported against its line and the run continues
/// with the next one.
fn interpret_lines<R: BufRead>(interpreter: &Interpreter, reader: R) -> io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        match interpreter.interpret_line(&line) {
            Ok(result) => {
                if !matches!(result.kind, Value::Nil) {
                    println!("{}", result);
                }
            }
            Err(error) => error.pretty_print(&line),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let interpreter = Interpreter::new();

    let result = match env::args().nth(1) {
        Some(path) => match File::open(&path) {
            Ok(file) => interpret_lines(&interpreter, BufReader::new(file)),
            Err(error) => {
                eprintln!("Failed to open file {}: {}", path, error);
                return ExitCode::FAILURE;
            }
        },
        // No file argument: read standard input until end of input
        None => interpret_lines(&interpreter, io::stdin().lock()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("I/O error: {}", error);
            ExitCode::FAILURE
        }
    }
}
