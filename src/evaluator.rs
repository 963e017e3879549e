use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::environment::{EnvError, Environment};
use crate::source::Span;
use crate::statements::StatementTable;
use crate::types::{Lambda, Node, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{0}")]
    Env(#[from] EnvError), // Errors from environment lookup
    /// Statement-table miss at dispatch time. Classification happens at
    /// parse time against the same table, so this is a consistency check.
    #[error("Unknown statement '{0}'")]
    UnknownStatement(String, Span),
    #[error("{0}")]
    ArgumentCount(String, Span),
    #[error("{0}")]
    Type(String, Span),
    #[error("Can't convert a string to a boolean")]
    BooleanConversion(Span),
}

// Result type alias for convenience
pub type EvalResult<T = Node> = Result<T, EvalError>;

pub(crate) fn arity_error<T>(name: &str, expected: &str, found: usize, span: Span) -> EvalResult<T> {
    Err(EvalError::ArgumentCount(
        format!("'{}' expects {} arguments, got {}", name, expected, found),
        span,
    ))
}

/// Reduces one value in the given environment. The statement table is the
/// interpreter's fixed special-form dispatch, passed by reference all the
/// way down.
pub fn evaluate(node: Node, env: Rc<RefCell<Environment>>, statements: &StatementTable) -> EvalResult {
    let span = node.span;
    let list = match node.kind {
        // A bare variable resolves against the environment.
        Value::Variable(name) => return Ok(env.borrow().get(&name, span)?),
        Value::List(list) => list,
        // Everything else is already fully reduced.
        _ => return Ok(node),
    };

    // A quoted list is literal data; its contents are never entered.
    if list.quoted {
        return Ok(Node::new(Value::List(list), span));
    }

    let [head, operands @ ..] = &list.elements[..] else {
        return Ok(Node::new_nil(span));
    };

    match &head.kind {
        // A variable in head position resolves first, then the call is
        // retried with the resolved value as the new head.
        Value::Variable(name) => {
            let resolved = env.borrow().get(name, head.span)?;
            let mut elements = Vec::with_capacity(list.elements.len());
            elements.push(resolved);
            elements.extend(operands.iter().cloned());
            evaluate(Node::new_list(elements, span), env, statements)
        }
        // Statement handlers receive their operands raw and decide their
        // own evaluation order and laziness.
        Value::Statement(name) => match statements.get(name) {
            Some(handler) => handler(operands, env, statements, span),
            None => Err(EvalError::UnknownStatement(name.clone(), head.span)),
        },
        Value::Lambda(lambda) => apply_lambda(lambda.clone(), operands, env, statements, span),
        // A native may hand back a further-reducible expression, so its
        // result goes through evaluation once more.
        Value::Native(native) => {
            let returned = (native.func)(operands, env.clone(), statements, span)?;
            evaluate(returned, env, statements)
        }
        Value::List(_) => match &list.elements[..] {
            // A one-element list reduces straight to its element's value.
            [single] => evaluate(single.clone(), env, statements),
            // A sequence of sub-forms: reduce each left-to-right, then
            // evaluate the combined result once more. The final pass is
            // what gives a computed head (a form returning a lambda) its
            // application.
            elements => {
                let mut reduced = Vec::with_capacity(elements.len());
                for element in elements {
                    reduced.push(evaluate(element.clone(), env.clone(), statements)?);
                }
                evaluate(Node::new_list(reduced, span), env, statements)
            }
        },
        Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
            if let [single] = &list.elements[..] {
                evaluate(single.clone(), env, statements)
            } else {
                Err(EvalError::Type(
                    format!("Can't call a {} ('{}')", head.kind.type_name(), head),
                    head.span,
                ))
            }
        }
    }
}

/// Arguments evaluate in the caller's environment; the body then runs in a
/// fresh environment holding only the lambda's captured cells plus the
/// parameter bindings. Duplicate parameter names are not rejected; the
/// rightmost binding wins.
fn apply_lambda(
    lambda: Rc<Lambda>,
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    if operands.len() != lambda.parameters.len() {
        return arity_error(
            "lambda",
            &format!("exactly {}", lambda.parameters.len()),
            operands.len(),
            span,
        );
    }

    let call_env = Environment::from_captured(lambda.captured.clone());
    for (parameter, operand) in lambda.parameters.iter().zip(operands) {
        let value = evaluate(operand.clone(), env.clone(), statements)?;
        call_env.borrow_mut().define(parameter.clone(), value);
    }

    evaluate(lambda.body.clone(), call_env, statements)
}

/// Nil is false, numbers are compared against zero, quoted lists are true,
/// unquoted lists are evaluated first. A string has no truth value at all.
pub fn is_truthy(
    node: &Node,
    env: &Rc<RefCell<Environment>>,
    statements: &StatementTable,
) -> EvalResult<bool> {
    match &node.kind {
        Value::List(list) if list.quoted => Ok(true),
        Value::List(_) => {
            let reduced = evaluate(node.clone(), env.clone(), statements)?;
            is_truthy(&reduced, env, statements)
        }
        Value::Nil => Ok(false),
        Value::Bool(value) => Ok(*value),
        Value::Int(value) => Ok(*value != 0),
        Value::Float(value) => Ok(*value != 0.0),
        Value::Str(_) => Err(EvalError::BooleanConversion(node.span)),
        Value::Statement(_) | Value::Variable(_) | Value::Lambda(_) | Value::Native(_) => {
            Err(EvalError::Type(
                format!("Can't use a {} as a condition", node.kind.type_name()),
                node.span,
            ))
        }
    }
}
