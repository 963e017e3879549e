use std::cell::RefCell;
use std::rc::Rc;

use crate::environment::Environment;
use crate::evaluator::{EvalError, EvalResult, arity_error, evaluate};
use crate::source::Span;
use crate::statements::StatementTable;
use crate::types::{Node, Value};

// Every operator takes exactly two operands, evaluated left-to-right in
// the caller's environment.
fn binary_operands(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
    name: &str,
) -> EvalResult<(Node, Node)> {
    let [lhs, rhs] = operands else {
        return arity_error(name, "exactly 2", operands.len(), span);
    };
    let lhs = evaluate(lhs.clone(), env.clone(), statements)?;
    let rhs = evaluate(rhs.clone(), env, statements)?;
    Ok((lhs, rhs))
}

fn operand_type_error(name: &str, lhs: &Node, rhs: &Node, span: Span) -> EvalError {
    EvalError::Type(
        format!(
            "Can't {} types {} and {}",
            name,
            lhs.kind.type_name(),
            rhs.kind.type_name()
        ),
        span,
    )
}

/// Dispatch on the pair of runtime tags: int/int stays int, any float in
/// the pair promotes both sides to float, anything else is a type error.
/// The int path uses checked ops, so division by zero (and the overflow
/// corners) reports instead of aborting the process.
fn arithmetic(
    name: &str,
    lhs: &Node,
    rhs: &Node,
    span: Span,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    match (&lhs.kind, &rhs.kind) {
        (Value::Int(a), Value::Int(b)) => match int_op(*a, *b) {
            Some(result) => Ok(Node::new_int(result, span)),
            None => Err(EvalError::Type(
                format!("Can't {} {} and {}", name, a, b),
                span,
            )),
        },
        (Value::Int(a), Value::Float(b)) => Ok(Node::new_float(float_op(*a as f64, *b), span)),
        (Value::Float(a), Value::Int(b)) => Ok(Node::new_float(float_op(*a, *b as f64), span)),
        (Value::Float(a), Value::Float(b)) => Ok(Node::new_float(float_op(*a, *b), span)),
        _ => Err(operand_type_error(name, lhs, rhs, span)),
    }
}

fn comparison(
    name: &str,
    lhs: &Node,
    rhs: &Node,
    span: Span,
    int_cmp: fn(i64, i64) -> bool,
    float_cmp: fn(f64, f64) -> bool,
) -> EvalResult {
    let result = match (&lhs.kind, &rhs.kind) {
        (Value::Int(a), Value::Int(b)) => int_cmp(*a, *b),
        (Value::Int(a), Value::Float(b)) => float_cmp(*a as f64, *b),
        (Value::Float(a), Value::Int(b)) => float_cmp(*a, *b as f64),
        (Value::Float(a), Value::Float(b)) => float_cmp(*a, *b),
        _ => return Err(operand_type_error(name, lhs, rhs, span)),
    };
    Ok(Node::new_bool(result, span))
}

pub fn native_add(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, "+")?;
    arithmetic("+", &lhs, &rhs, span, i64::checked_add, |a, b| a + b)
}

pub fn native_sub(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, "-")?;
    arithmetic("-", &lhs, &rhs, span, i64::checked_sub, |a, b| a - b)
}

pub fn native_mul(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, "*")?;
    arithmetic("*", &lhs, &rhs, span, i64::checked_mul, |a, b| a * b)
}

pub fn native_div(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, "/")?;
    // checked_div also covers i64::MIN / -1; float division by zero keeps
    // its IEEE result.
    arithmetic("/", &lhs, &rhs, span, i64::checked_div, |a, b| a / b)
}

pub fn native_less_than(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, "<")?;
    comparison("<", &lhs, &rhs, span, |a, b| a < b, |a, b| a < b)
}

pub fn native_greater_than(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, ">")?;
    comparison(">", &lhs, &rhs, span, |a, b| a > b, |a, b| a > b)
}

pub fn native_less_than_or_equal(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, "<=")?;
    comparison("<=", &lhs, &rhs, span, |a, b| a <= b, |a, b| a <= b)
}

pub fn native_greater_than_or_equal(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let (lhs, rhs) = binary_operands(operands, env, statements, span, ">=")?;
    comparison(">=", &lhs, &rhs, span, |a, b| a >= b, |a, b| a >= b)
}
