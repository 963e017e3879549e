use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

use catlang::environment::Environment;
use catlang::interpreter::Interpreter;
use catlang::lexer::{TokenKind, tokenize};
use catlang::types::Value;

const HISTORY_FILE: &str = "catlang_history.txt";

/// Completes the symbol under the cursor from the global bindings plus the
/// statement keywords.
struct CatlangCompleter {
    env: Rc<RefCell<Environment>>,
    keywords: HashSet<String>,
}

impl rustyline::completion::Completer for CatlangCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok((
            pos,
            match tokenize(&line[..pos]) {
                Ok(tokens) => {
                    if let Some(TokenKind::Symbol(prefix)) = tokens.last().map(|t| t.kind.clone()) {
                        self.env
                            .borrow()
                            .identifiers()
                            .union(&self.keywords)
                            .filter_map(|id| id.strip_prefix(&prefix))
                            .map(|rest| rest.to_string())
                            .collect()
                    } else {
                        vec![]
                    }
                }
                Err(_) => vec![],
            },
        ))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct ReplHelper {
    #[rustyline(Validator)]
    validator: CatlangValidator,
    #[rustyline(Highlighter)]
    highlighter: CatlangHighlighter,
    #[rustyline(Completer)]
    completer: CatlangCompleter,
}

/// Keeps the prompt open while parens are unbalanced or a string literal
/// is still open. Catlang strings have no escape sequences and the only
/// brackets are parens, which keeps the scan simple.
struct CatlangValidator;

impl Validator for CatlangValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut depth: usize = 0;
        let mut in_string = false;
        let mut in_comment = false;

        for (i, c) in input.chars().enumerate() {
            if in_string {
                if c == '"' {
                    in_string = false;
                }
                continue;
            }
            if in_comment {
                if c == '\n' {
                    in_comment = false;
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                ';' => in_comment = true,
                '(' => depth += 1,
                ')' => match depth.checked_sub(1) {
                    Some(new_depth) => depth = new_depth,
                    None => {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                },
                _ => {}
            }
        }

        if in_string || depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct CatlangHighlighter;

impl Highlighter for CatlangHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::with_capacity(line.len());
        let mut in_string = false;

        for (i, c) in line.chars().enumerate() {
            if in_string {
                if c == '"' {
                    in_string = false;
                }
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                continue;
            }

            match c {
                '"' => {
                    in_string = true;
                    highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c));
                }
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => match stack.pop() {
                    Some(opening_pos) => {
                        if i + 1 == pos {
                            // Bold the pair under the cursor
                            highlighted.push_str("\x1b[1;34m)\x1b[0m");
                            highlighted
                                .replace_range(opening_pos..=opening_pos, "\x1b[1;34m(\x1b[0m");
                        } else {
                            highlighted.push(c);
                        }
                    }
                    None => {
                        highlighted.push_str("\x1b[31m)\x1b[0m"); // Red for unmatched
                    }
                },
                _ => highlighted.push(c),
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    println!("catlang repl v0.1.0");
    println!("Type 'exit' or press Ctrl-D to quit.");

    let interpreter = Interpreter::new();
    let helper = ReplHelper {
        validator: CatlangValidator,
        highlighter: CatlangHighlighter,
        completer: CatlangCompleter {
            env: interpreter.global_env().clone(),
            keywords: interpreter.statements().identifiers(),
        },
    };

    let mut rl: Editor<ReplHelper, DefaultHistory> =
        Editor::with_config(rustyline::config::Config::builder().build())?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('j'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("catlang> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }

                match interpreter.interpret_line(input) {
                    Ok(result) => {
                        if !matches!(result.kind, Value::Nil) {
                            println!("{}", result);
                        }
                    }
                    Err(error) => error.pretty_print(input),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
