use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::{Binding, Environment};
use crate::evaluator::EvalResult;
use crate::source::Span;
use crate::statements::StatementTable;

/// A runtime value together with the source span it came from. The span is
/// carried for diagnostics only; it never influences evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Value,
    pub span: Span,
}

impl Node {
    pub fn new(kind: Value, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_nil(span: Span) -> Self {
        Node::new(Value::Nil, span)
    }

    pub fn new_bool(value: bool, span: Span) -> Self {
        Node::new(Value::Bool(value), span)
    }

    pub fn new_int(value: i64, span: Span) -> Self {
        Node::new(Value::Int(value), span)
    }

    pub fn new_float(value: f64, span: Span) -> Self {
        Node::new(Value::Float(value), span)
    }

    pub fn new_string(value: impl Into<String>, span: Span) -> Self {
        Node::new(Value::Str(value.into()), span)
    }

    pub fn new_statement(name: impl Into<String>, span: Span) -> Self {
        Node::new(Value::Statement(name.into()), span)
    }

    pub fn new_variable(name: impl Into<String>, span: Span) -> Self {
        Node::new(Value::Variable(name.into()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(
            Value::List(ListValue {
                elements,
                quoted: false,
            }),
            span,
        )
    }

    pub fn new_quoted_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(
            Value::List(ListValue {
                elements,
                quoted: true,
            }),
            span,
        )
    }

    pub fn new_native(name: &'static str, func: NativeFn, span: Span) -> Self {
        Node::new(Value::Native(Native { name, func }), span)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The core tagged union. Code and data share this one representation:
/// parsed source, lambda bodies, and evaluation results are all `Value`s.
/// The recursive constructors (`List`, `Lambda`) hold their contents behind
/// owning indirection; the scalar variants live inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A symbol recognized against the statement table at parse time. The
    /// classification is permanent; user code cannot add special forms.
    Statement(String),
    /// Any other symbol. Resolved against the environment at evaluation.
    Variable(String),
    Lambda(Rc<Lambda>),
    Native(Native),
    List(ListValue),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Statement(_) => "statement",
            Value::Variable(_) => "variable",
            Value::Lambda(_) => "lambda",
            Value::Native(_) => "native function",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "(nil)"),
            Value::Bool(value) => write!(f, "{}", if *value { "true" } else { "false" }),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::Statement(name) => write!(f, "{}", name),
            Value::Variable(name) => write!(f, "{}", name),
            Value::Lambda(lambda) => write!(f, "#<lambda ({})>", lambda.parameters.join(" ")),
            Value::Native(native) => write!(f, "#<native:{}>", native.name),
            Value::List(list) => {
                write!(f, "(")?;
                for (index, element) in list.elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// An ordered, immutable snapshot of values. `quoted` is set only by the
/// `'(` syntax at parse time and suppresses evaluation of the contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ListValue {
    pub elements: Vec<Node>,
    pub quoted: bool,
}

/// A user function. Built once by `lambda` (or the `def` sugar) and
/// immutable afterward: the captured bindings are never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub parameters: Vec<String>,
    pub body: Node, // always a Value::List, unevaluated
    pub captured: HashMap<String, Binding>,
}

pub type NativeFn = fn(&[Node], Rc<RefCell<Environment>>, &StatementTable, Span) -> EvalResult;

/// A host function exposed as an ordinary rebindable value. It receives its
/// operands unevaluated, like a statement handler does.
#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}

// Function pointers don't compare reliably, so native functions are
// compared by name.
impl PartialEq for Native {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Nil.to_string(), "(nil)");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Str("hi".to_string()).to_string(), "hi");
    }

    #[test]
    fn test_display_list() {
        let span = Span::default();
        let list = Node::new_list(
            vec![
                Node::new_int(1, span),
                Node::new_string("two", span),
                Node::new_list(vec![Node::new_int(3, span)], span),
            ],
            span,
        );
        assert_eq!(list.to_string(), "(1 two (3))");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        assert_eq!(Value::Statement("def".to_string()).type_name(), "statement");
        assert_eq!(Value::Variable("x".to_string()).type_name(), "variable");
    }
}
