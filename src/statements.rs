use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::environment::Environment;
use crate::evaluator::{EvalError, EvalResult, arity_error, evaluate, is_truthy};
use crate::source::Span;
use crate::types::{Lambda, ListValue, Node, Value};

/// Handlers receive their operands unevaluated plus the environment, and
/// decide their own evaluation order.
pub type StatementFn = fn(&[Node], Rc<RefCell<Environment>>, &StatementTable, Span) -> EvalResult;

/// The fixed special-form table. Built once at interpreter construction
/// and immutable afterward; parse-time symbol classification and run-time
/// dispatch both consult the same table.
#[derive(Debug, Clone)]
pub struct StatementTable {
    handlers: HashMap<&'static str, StatementFn>,
}

impl StatementTable {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, StatementFn> = HashMap::new();
        handlers.insert("lambda", stmt_lambda);
        handlers.insert("def", stmt_def);
        handlers.insert("set", stmt_def); // alias
        handlers.insert("cond", stmt_cond);
        handlers.insert("while", stmt_while);
        handlers.insert("if", stmt_if);
        handlers.insert("print", stmt_print);
        handlers.insert("vars", stmt_vars);
        StatementTable { handlers }
    }

    pub fn get(&self, name: &str) -> Option<StatementFn> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// The statement keywords (REPL completion).
    pub fn identifiers(&self) -> HashSet<String> {
        self.handlers.keys().map(|name| name.to_string()).collect()
    }
}

impl Default for StatementTable {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_list<'a>(node: &'a Node, what: &str, name: &str) -> EvalResult<&'a ListValue> {
    match &node.kind {
        Value::List(list) => Ok(list),
        other => Err(EvalError::Type(
            format!(
                "'{}' expects {} to be a list, got {}",
                name,
                what,
                other.type_name()
            ),
            node.span,
        )),
    }
}

fn expect_name(node: &Node, name: &str) -> EvalResult<String> {
    match &node.kind {
        Value::Variable(var) => Ok(var.clone()),
        other => Err(EvalError::Type(
            format!("'{}' expects a name, got {}", name, other.type_name()),
            node.span,
        )),
    }
}

fn parameter_names(parameters: &[Node]) -> EvalResult<Vec<String>> {
    parameters
        .iter()
        .map(|node| expect_name(node, "lambda"))
        .collect()
}

/// Shared by `lambda` and the `def` sugar form. The captured environment is
/// computed here, once, and never again.
fn build_lambda(
    parameters: &[Node],
    body: &Node,
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let names = parameter_names(parameters)?;
    expect_list(body, "its body", "lambda")?;
    let captured = env.borrow().capture(&names, body);
    Ok(Node::new(
        Value::Lambda(Rc::new(Lambda {
            parameters: names,
            body: body.clone(),
            captured,
        })),
        span,
    ))
}

fn stmt_lambda(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    _statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let [parameters, body] = operands else {
        return arity_error("lambda", "exactly 2", operands.len(), span);
    };
    let parameters = expect_list(parameters, "its parameter list", "lambda")?;
    build_lambda(&parameters.elements, body, &env, span)
}

fn stmt_def(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let [target, value_expr] = operands else {
        return arity_error("def", "exactly 2", operands.len(), span);
    };

    match &target.kind {
        // (def (name p1 p2 ...) body) is sugar for binding a lambda.
        Value::List(signature) => {
            let [name_node, parameters @ ..] = &signature.elements[..] else {
                return Err(EvalError::Type(
                    "'def' expects a non-empty signature list".to_string(),
                    target.span,
                ));
            };
            let name = expect_name(name_node, "def")?;
            let lambda = build_lambda(parameters, value_expr, &env, span)?;
            env.borrow_mut().define(name, lambda);
        }
        Value::Variable(name) => {
            let value = evaluate(value_expr.clone(), env.clone(), statements)?;
            env.borrow_mut().define(name.clone(), value);
        }
        other => {
            return Err(EvalError::Type(
                format!(
                    "'def' expects a name or signature, got {}",
                    other.type_name()
                ),
                target.span,
            ));
        }
    }

    Ok(Node::new_nil(span))
}

fn stmt_cond(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    for clause in operands {
        let clause_list = expect_list(clause, "each clause", "cond")?;
        let [test, result] = &clause_list.elements[..] else {
            return arity_error(
                "cond clause",
                "exactly 2",
                clause_list.elements.len(),
                clause.span,
            );
        };
        // Tests run lazily: nothing past the first truthy clause evaluates.
        let test_value = evaluate(test.clone(), env.clone(), statements)?;
        if is_truthy(&test_value, &env, statements)? {
            return evaluate(result.clone(), env, statements);
        }
    }
    Ok(Node::new_nil(span))
}

fn stmt_while(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let [test, body @ ..] = operands else {
        return arity_error("while", "at least 1", operands.len(), span);
    };

    // No iteration limit: a test that never turns falsy loops forever.
    loop {
        let test_value = evaluate(test.clone(), env.clone(), statements)?;
        if !is_truthy(&test_value, &env, statements)? {
            break;
        }
        // The body runs as an ordinary form sequence, purely for effect.
        evaluate(Node::new_list(body.to_vec(), span), env.clone(), statements)?;
    }

    Ok(Node::new_nil(span))
}

fn stmt_if(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let [test, consequent, alternate] = operands else {
        return arity_error("if", "exactly 3", operands.len(), span);
    };
    let test_value = evaluate(test.clone(), env.clone(), statements)?;
    if is_truthy(&test_value, &env, statements)? {
        evaluate(consequent.clone(), env, statements)
    } else {
        evaluate(alternate.clone(), env, statements)
    }
}

fn stmt_print(
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let [expr] = operands else {
        return arity_error("print", "exactly 1", operands.len(), span);
    };
    let value = evaluate(expr.clone(), env, statements)?;
    println!("{}", value);
    Ok(Node::new_nil(span))
}

fn stmt_vars(
    _operands: &[Node],
    env: Rc<RefCell<Environment>>,
    _statements: &StatementTable,
    span: Span,
) -> EvalResult {
    let env = env.borrow();
    let mut bindings: Vec<_> = env.iter().collect();
    bindings.sort_by(|(a, _), (b, _)| a.cmp(b)); // stable dump order
    for (name, value) in bindings {
        println!("{} -> {}", name, value);
    }
    Ok(Node::new_nil(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn eval_str(input: &str, env: &Rc<RefCell<Environment>>) -> EvalResult {
        let statements = StatementTable::new();
        let node = parse_line(input, &statements)
            .unwrap_or_else(|e| panic!("Parsing failed for input '{}': {}", input, e));
        evaluate(node, env.clone(), &statements)
    }

    fn eval_kind(input: &str, env: &Rc<RefCell<Environment>>) -> Value {
        eval_str(input, env)
            .unwrap_or_else(|e| panic!("Evaluation failed for input '{}': {}", input, e))
            .kind
    }

    fn global() -> Rc<RefCell<Environment>> {
        Environment::new_global_populated()
    }

    #[test]
    fn test_table_contains_all_forms() {
        let table = StatementTable::new();
        for keyword in ["lambda", "def", "set", "cond", "while", "if", "print", "vars"] {
            assert!(table.contains(keyword), "missing {}", keyword);
            assert!(table.get(keyword).is_some(), "no handler for {}", keyword);
        }
        assert!(!table.contains("define"));
        assert_eq!(table.identifiers().len(), 8);
    }

    #[test]
    fn test_def_binds_and_returns_nil() {
        let env = global();
        assert_eq!(eval_kind("(def x 5)", &env), Value::Nil);
        assert_eq!(eval_kind("x", &env), Value::Int(5));

        // Redefinition rebinds
        eval_str("(def x 6)", &env).expect("should rebind");
        assert_eq!(eval_kind("x", &env), Value::Int(6));
    }

    #[test]
    fn test_def_evaluates_its_value() {
        let env = global();
        eval_str("(def x (+ 2 3))", &env).expect("should bind");
        assert_eq!(eval_kind("x", &env), Value::Int(5));
    }

    #[test]
    fn test_set_is_an_alias_for_def() {
        let env = global();
        eval_str("(set x 1)", &env).expect("should bind");
        assert_eq!(eval_kind("x", &env), Value::Int(1));
        eval_str("(set x 2)", &env).expect("should rebind");
        assert_eq!(eval_kind("x", &env), Value::Int(2));
    }

    #[test]
    fn test_def_sugar_builds_named_lambda() {
        let env = global();
        assert_eq!(eval_kind("(def (add2 a b) (+ a b))", &env), Value::Nil);
        let bound = eval_kind("add2", &env);
        let Value::Lambda(lambda) = bound else {
            panic!("Expected a lambda, got {:?}", bound);
        };
        assert_eq!(lambda.parameters, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(eval_kind("(add2 3 4)", &env), Value::Int(7));
    }

    #[test]
    fn test_def_errors() {
        let env = global();
        assert!(matches!(
            eval_str("(def x)", &env),
            Err(EvalError::ArgumentCount(..))
        ));
        assert!(matches!(
            eval_str("(def 1 2)", &env),
            Err(EvalError::Type(..))
        ));
        assert!(matches!(
            eval_str("(def () 2)", &env),
            Err(EvalError::Type(..))
        ));
    }

    #[test]
    fn test_lambda_builds_value() {
        let env = global();
        let value = eval_kind("(lambda (n) (* n n))", &env);
        let Value::Lambda(lambda) = value else {
            panic!("Expected lambda");
        };
        assert_eq!(lambda.parameters, vec!["n".to_string()]);
        // '*' is captured from the global environment at creation time
        assert!(lambda.captured.contains_key("*"));
        assert!(!lambda.captured.contains_key("n"));
    }

    #[test]
    fn test_lambda_errors() {
        let env = global();
        assert!(matches!(
            eval_str("(lambda (a))", &env),
            Err(EvalError::ArgumentCount(..))
        ));
        // Parameter list must be a list of names
        assert!(matches!(
            eval_str("(lambda x (+ x 1))", &env),
            Err(EvalError::Type(..))
        ));
        assert!(matches!(
            eval_str("(lambda (1) (+ 1 1))", &env),
            Err(EvalError::Type(..))
        ));
        // Body must be a list
        assert!(matches!(
            eval_str("(lambda (a) 5)", &env),
            Err(EvalError::Type(..))
        ));
    }

    #[test]
    fn test_cond_first_truthy_wins() {
        let env = global();
        assert_eq!(
            eval_kind("(cond ((< 1 0) \"a\") ((> 1 0) \"b\"))", &env),
            Value::Str("b".to_string())
        );
        // No truthy clause -> nil
        assert_eq!(eval_kind("(cond ((< 1 0) \"a\"))", &env), Value::Nil);
        assert_eq!(eval_kind("(cond)", &env), Value::Nil);
    }

    #[test]
    fn test_cond_is_lazy() {
        let env = global();
        // The losing result and later tests never evaluate, so an
        // undefined name there is no error.
        assert_eq!(
            eval_kind("(cond ((> 1 0) 1) (unbound unbound))", &env),
            Value::Int(1)
        );
    }

    #[test]
    fn test_cond_clause_shape_errors() {
        let env = global();
        assert!(matches!(
            eval_str("(cond 1)", &env),
            Err(EvalError::Type(..))
        ));
        assert!(matches!(
            eval_str("(cond ((> 1 0)))", &env),
            Err(EvalError::ArgumentCount(..))
        ));
    }

    #[test]
    fn test_while_counts_down() {
        let env = global();
        eval_str("(def x 5)", &env).expect("should bind");
        assert_eq!(
            eval_kind("(while (> x 0) (def x (- x 1)))", &env),
            Value::Nil
        );
        assert_eq!(eval_kind("x", &env), Value::Int(0));
    }

    #[test]
    fn test_while_false_test_skips_body() {
        let env = global();
        // Body would fail if it ever ran
        assert_eq!(
            eval_kind("(while (< 1 0) (explode))", &env),
            Value::Nil
        );
    }

    #[test]
    fn test_while_requires_a_test() {
        let env = global();
        assert!(matches!(
            eval_str("(while)", &env),
            Err(EvalError::ArgumentCount(..))
        ));
    }

    #[test]
    fn test_if_branches() {
        let env = global();
        assert_eq!(
            eval_kind("(if (> 3 2) \"yes\" \"no\")", &env),
            Value::Str("yes".to_string())
        );
        assert_eq!(
            eval_kind("(if (< 3 2) \"yes\" \"no\")", &env),
            Value::Str("no".to_string())
        );
    }

    #[test]
    fn test_if_is_lazy() {
        let env = global();
        // The untaken branch never evaluates
        assert_eq!(eval_kind("(if (> 1 0) 1 unbound)", &env), Value::Int(1));
        assert_eq!(eval_kind("(if (< 1 0) unbound 2)", &env), Value::Int(2));
    }

    #[test]
    fn test_if_requires_exactly_three_operands() {
        let env = global();
        assert!(matches!(
            eval_str("(if (> 1 0) \"a\")", &env),
            Err(EvalError::ArgumentCount(..))
        ));
        assert!(matches!(
            eval_str("(if)", &env),
            Err(EvalError::ArgumentCount(..))
        ));
        assert!(matches!(
            eval_str("(if 1 2 3 4)", &env),
            Err(EvalError::ArgumentCount(..))
        ));
    }

    #[test]
    fn test_if_string_condition_fails() {
        let env = global();
        assert!(matches!(
            eval_str("(if \"true\" 1 2)", &env),
            Err(EvalError::BooleanConversion(..))
        ));
    }

    #[test]
    fn test_print_evaluates_and_returns_nil() {
        let env = global();
        eval_str("(def x 5)", &env).expect("should bind");
        assert_eq!(eval_kind("(print x)", &env), Value::Nil);
        assert!(matches!(
            eval_str("(print)", &env),
            Err(EvalError::ArgumentCount(..))
        ));
        assert!(matches!(
            eval_str("(print missing)", &env),
            Err(EvalError::Env(..))
        ));
    }

    #[test]
    fn test_vars_returns_nil() {
        let env = global();
        eval_str("(def x 5)", &env).expect("should bind");
        assert_eq!(eval_kind("(vars)", &env), Value::Nil);
    }

    #[test]
    fn test_keyword_named_def_target_is_type_error() {
        // 'if' in target position was classified as a statement at parse
        // time; def refuses it.
        let env = global();
        assert!(matches!(
            eval_str("(def if 5)", &env),
            Err(EvalError::Type(..))
        ));
    }
}
