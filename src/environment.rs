use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use thiserror::Error;

use crate::source::Span;
use crate::types::{NativeFn, Node, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String, Span), // Symbol name, span where lookup happened
}

/// One binding cell. A closure that captured a cell keeps its own `Rc` to
/// it, so a later rebind of the same name elsewhere is invisible to it.
pub type Binding = Rc<Node>;

/// A flat name-to-cell map. There is no outer-environment chain: a lambda
/// body sees exactly its captured cells plus its parameters, nothing else.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    bindings: HashMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// The global environment: the numeric operators as ordinary
    /// (rebindable) variables, plus `true`, `false` and `nil`.
    pub fn new_global_populated() -> Rc<RefCell<Environment>> {
        let env_ptr = Environment::new();
        {
            // Borrow mutably only inside this scope
            let mut env = env_ptr.borrow_mut();
            env.add_native("+", crate::primitives::native_add);
            env.add_native("-", crate::primitives::native_sub);
            env.add_native("*", crate::primitives::native_mul);
            env.add_native("/", crate::primitives::native_div);
            env.add_native("<", crate::primitives::native_less_than);
            env.add_native(">", crate::primitives::native_greater_than);
            env.add_native("<=", crate::primitives::native_less_than_or_equal);
            env.add_native(">=", crate::primitives::native_greater_than_or_equal);

            env.define("true".to_string(), Node::new_bool(true, Span::default()));
            env.define("false".to_string(), Node::new_bool(false, Span::default()));
            env.define("nil".to_string(), Node::new_nil(Span::default()));
        }
        env_ptr
    }

    /// Builds a lambda's calling environment from its captured cells.
    pub fn from_captured(captured: HashMap<String, Binding>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment { bindings: captured }))
    }

    /// Binds `name` to a fresh cell. Redefining a name replaces the cell in
    /// the map rather than writing through the old one, so any capture of
    /// the old cell keeps observing the old value.
    pub fn define(&mut self, name: String, value: Node) {
        self.bindings.insert(name, Rc::new(value));
    }

    /// Looks a variable up in this environment (and only this one).
    /// `lookup_span` is where the reference occurred, for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Node, EnvError> {
        match self.bindings.get(name) {
            Some(binding) => Ok(binding.as_ref().clone()),
            None => Err(EnvError::UndefinedVariable(name.to_string(), lookup_span)),
        }
    }

    /// Collects the cells a lambda body needs: every variable reference in
    /// `body` that is not a parameter and is bound here gets its cell
    /// copied into the result.
    pub fn capture(&self, parameters: &[String], body: &Node) -> HashMap<String, Binding> {
        let mut captured = HashMap::new();
        self.capture_into(parameters, body, &mut captured);
        captured
    }

    // Purely syntactic walk. A `def` earlier in the body or a nested
    // lambda's own parameter list does not stop a name from being captured.
    fn capture_into(
        &self,
        parameters: &[String],
        node: &Node,
        captured: &mut HashMap<String, Binding>,
    ) {
        match &node.kind {
            Value::List(list) => {
                for element in &list.elements {
                    self.capture_into(parameters, element, captured);
                }
            }
            Value::Variable(name) => {
                if parameters.iter().any(|parameter| parameter == name) {
                    return;
                }
                if let Some(binding) = self.bindings.get(name) {
                    captured.insert(name.clone(), binding.clone());
                }
            }
            _ => {}
        }
    }

    fn add_native(&mut self, name: &'static str, func: NativeFn) {
        self.define(name.to_string(), Node::new_native(name, func, Span::default()));
    }

    /// All names bound in this environment (REPL completion, `vars`).
    pub fn identifiers(&self) -> HashSet<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_node(n: i64) -> Node {
        Node::new_int(n, Span::default())
    }

    fn var_node(name: &str) -> Node {
        Node::new_variable(name, Span::default())
    }

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.borrow_mut().define("x".to_string(), int_node(10));

        let result = env.borrow().get("x", Span::default());
        assert_eq!(result, Ok(int_node(10)));
    }

    #[test]
    fn test_get_unbound() {
        let env = Environment::new();
        let span = Span::new(3, 4);
        let result = env.borrow().get("y", span);
        assert_eq!(result, Err(EnvError::UndefinedVariable("y".to_string(), span)));
    }

    #[test]
    fn test_rebind_replaces_cell() {
        let env = Environment::new();
        env.borrow_mut().define("x".to_string(), int_node(1));

        // Capture the original cell, as a closure would
        let captured = env.borrow().capture(&[], &var_node("x"));

        env.borrow_mut().define("x".to_string(), int_node(2));

        // The map sees the new value, the captured cell still holds the old
        assert_eq!(env.borrow().get("x", Span::default()), Ok(int_node(2)));
        assert_eq!(captured["x"].kind, Value::Int(1));
    }

    #[test]
    fn test_capture_skips_parameters() {
        let env = Environment::new();
        env.borrow_mut().define("a".to_string(), int_node(1));
        env.borrow_mut().define("b".to_string(), int_node(2));

        let body = Node::new_list(
            vec![var_node("a"), var_node("b")],
            Span::default(),
        );
        let captured = env.borrow().capture(&["a".to_string()], &body);

        assert!(!captured.contains_key("a"));
        assert_eq!(captured["b"].kind, Value::Int(2));
    }

    #[test]
    fn test_capture_descends_into_nested_lists() {
        let env = Environment::new();
        env.borrow_mut().define("deep".to_string(), int_node(9));

        let body = Node::new_list(
            vec![Node::new_list(
                vec![Node::new_list(vec![var_node("deep")], Span::default())],
                Span::default(),
            )],
            Span::default(),
        );
        let captured = env.borrow().capture(&[], &body);
        assert_eq!(captured["deep"].kind, Value::Int(9));
    }

    #[test]
    fn test_capture_ignores_unbound_names() {
        let env = Environment::new();
        let body = Node::new_list(vec![var_node("ghost")], Span::default());
        let captured = env.borrow().capture(&[], &body);
        assert!(captured.is_empty());
    }

    #[test]
    fn test_capture_ignores_statements_and_literals() {
        let env = Environment::new();
        env.borrow_mut().define("def".to_string(), int_node(1));

        let body = Node::new_list(
            vec![
                Node::new_statement("def", Span::default()),
                Node::new_int(1, Span::default()),
                Node::new_string("s", Span::default()),
            ],
            Span::default(),
        );
        let captured = env.borrow().capture(&[], &body);
        assert!(captured.is_empty());
    }

    #[test]
    fn test_global_populated_has_operators_and_constants() {
        let env = Environment::new_global_populated();
        let env = env.borrow();
        for name in ["+", "-", "*", "/", "<", ">", "<=", ">="] {
            assert!(
                matches!(env.get(name, Span::default()), Ok(node) if matches!(node.kind, Value::Native(_))),
                "missing operator {}",
                name
            );
        }
        assert_eq!(
            env.get("true", Span::default()).map(|node| node.kind),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            env.get("nil", Span::default()).map(|node| node.kind),
            Ok(Value::Nil)
        );
    }
}
