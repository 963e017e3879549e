use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::environment::Environment;
use crate::evaluator::{EvalError, evaluate};
use crate::parser::{ParseError, parse_line};
use crate::statements::StatementTable;
use crate::types::Node;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpretError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Eval(#[from] EvalError),
}

/// Owns the fixed statement table and the global environment. One
/// interpreter services many input lines; bindings persist between them.
pub struct Interpreter {
    statements: StatementTable,
    global_env: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            statements: StatementTable::new(),
            global_env: Environment::new_global_populated(),
        }
    }

    /// Parses one line of source and evaluates it in the global
    /// environment. An error aborts only this line; the interpreter stays
    /// usable for the next one.
    pub fn interpret_line(&self, line: &str) -> Result<Node, InterpretError> {
        let node = parse_line(line, &self.statements)?;
        Ok(evaluate(node, self.global_env.clone(), &self.statements)?)
    }

    pub fn global_env(&self) -> &Rc<RefCell<Environment>> {
        &self.global_env
    }

    pub fn statements(&self) -> &StatementTable {
        &self.statements
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn kind(interpreter: &Interpreter, line: &str) -> Value {
        interpreter
            .interpret_line(line)
            .unwrap_or_else(|e| panic!("Line '{}' failed: {}", line, e))
            .kind
    }

    #[test]
    fn test_arithmetic_session() {
        let interpreter = Interpreter::new();
        assert_eq!(kind(&interpreter, "(+ 1 2)"), Value::Int(3));
        assert_eq!(kind(&interpreter, "(+ 1 2.5)"), Value::Float(3.5));
        assert_eq!(kind(&interpreter, "(- (* 3 4) (/ 10 5))"), Value::Int(10));
    }

    #[test]
    fn test_state_persists_across_lines() {
        let interpreter = Interpreter::new();
        assert_eq!(kind(&interpreter, "(def x 5)"), Value::Nil);
        assert_eq!(kind(&interpreter, "x"), Value::Int(5));
        assert_eq!(kind(&interpreter, "(def x 6)"), Value::Nil);
        assert_eq!(kind(&interpreter, "x"), Value::Int(6));
    }

    #[test]
    fn test_closure_snapshot_across_lines() {
        let interpreter = Interpreter::new();
        kind(&interpreter, "(def y 10)");
        kind(&interpreter, "(def f (lambda (a) (+ a y)))");
        assert_eq!(kind(&interpreter, "(f 5)"), Value::Int(15));
        kind(&interpreter, "(def y 100)");
        assert_eq!(kind(&interpreter, "(f 5)"), Value::Int(15));
        assert_eq!(kind(&interpreter, "y"), Value::Int(100));
    }

    #[test]
    fn test_while_loop_session() {
        let interpreter = Interpreter::new();
        kind(&interpreter, "(def x 10)");
        assert_eq!(
            kind(&interpreter, "(while (> x 0) (def x (- x 1)))"),
            Value::Nil
        );
        assert_eq!(kind(&interpreter, "x"), Value::Int(0));
    }

    #[test]
    fn test_def_sugar_session() {
        let interpreter = Interpreter::new();
        kind(&interpreter, "(def (square n) (* n n))");
        kind(&interpreter, "(def (sum-to n) ((lambda (m) (/ (* m (+ m 1)) 2)) n))");
        assert_eq!(kind(&interpreter, "(square 9)"), Value::Int(81));
        assert_eq!(kind(&interpreter, "(sum-to 10)"), Value::Int(55));
    }

    #[test]
    fn test_errors_do_not_poison_the_interpreter() {
        let interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.interpret_line("(+ 1"),
            Err(InterpretError::Parse(_))
        ));
        assert!(matches!(
            interpreter.interpret_line("(+ \"a\" 1)"),
            Err(InterpretError::Eval(_))
        ));
        assert!(matches!(
            interpreter.interpret_line("missing"),
            Err(InterpretError::Eval(_))
        ));
        // Still fully functional afterwards
        assert_eq!(kind(&interpreter, "(+ 1 2)"), Value::Int(3));
    }

    #[test]
    fn test_empty_and_comment_lines_are_nil() {
        let interpreter = Interpreter::new();
        assert_eq!(kind(&interpreter, ""), Value::Nil);
        assert_eq!(kind(&interpreter, "   "), Value::Nil);
        assert_eq!(kind(&interpreter, "; just a comment"), Value::Nil);
    }

    #[test]
    fn test_quoted_list_round_trip() {
        let interpreter = Interpreter::new();
        let result = interpreter
            .interpret_line("'(1 2 3)")
            .expect("should evaluate");
        assert_eq!(result.to_string(), "(1 2 3)");
    }
}
